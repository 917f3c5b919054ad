use super::input::{str_delete_back, str_delete_forward, str_insert_char};
use super::layout;
use super::state::{App, AppEvent, Panel, StatusMessage};
use super::theme::{BLUE, BRIGHT_WHITE, DESC_DIM, DIM, PINK, SEL_BG};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

/// 搜索面板按键处理
pub fn handle_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if app.search.typing {
        handle_typing_key(key, app, tx);
        return;
    }

    match key.code {
        KeyCode::Char('/') => {
            app.search.typing = true;
        }
        KeyCode::Up => {
            app.search.selected = app.search.selected.saturating_sub(1);
        }
        KeyCode::Down => {
            let max = app.search.results.len().saturating_sub(1);
            if app.search.selected < max {
                app.search.selected += 1;
            }
        }
        KeyCode::Char(' ') => {
            // 多选切换，选中后自动下移
            if !app.search.results.is_empty() {
                let idx = app.search.selected;
                if !app.search.marked.remove(&idx) {
                    app.search.marked.insert(idx);
                }
                let max = app.search.results.len().saturating_sub(1);
                if app.search.selected < max {
                    app.search.selected += 1;
                }
            }
        }
        KeyCode::Char('i') => {
            spawn_install(app, tx);
        }
        _ => {}
    }
}

fn handle_typing_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    match key.code {
        KeyCode::Enter => {
            app.search.typing = false;
            spawn_search(app, tx);
        }
        KeyCode::Esc => {
            app.search.typing = false;
        }
        KeyCode::Backspace => {
            str_delete_back(&mut app.search.input, &mut app.search.cursor);
        }
        KeyCode::Delete => {
            str_delete_forward(&mut app.search.input, &mut app.search.cursor);
        }
        KeyCode::Left => {
            app.search.cursor = app.search.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let max = app.search.input.chars().count();
            if app.search.cursor < max {
                app.search.cursor += 1;
            }
        }
        KeyCode::Home => {
            app.search.cursor = 0;
        }
        KeyCode::End => {
            app.search.cursor = app.search.input.chars().count();
        }
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return;
            }
            str_insert_char(&mut app.search.input, &mut app.search.cursor, c);
        }
        _ => {}
    }
}

/// 启动远程搜索任务
fn spawn_search(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let query = app.search.input.trim().to_string();
    if query.is_empty() {
        return;
    }

    app.search.seq += 1;
    app.search.searching = true;
    let seq = app.search.seq;
    let brew = app.engine.brew().clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let results = tokio::task::spawn_blocking(move || brew.search(&query))
            .await
            .unwrap_or_default();
        let _ = tx.send(AppEvent::SearchResults { results, seq }).await;
    });
}

/// 安装标记/高亮的包
fn spawn_install(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let names = app.search.selected_names();
    if names.is_empty() {
        app.set_status(Panel::Search, StatusMessage::err("没有选中任何包"));
        return;
    }

    // 已有操作在途时静默忽略
    let Some(guard) = app.engine.lock.try_acquire() else {
        return;
    };

    app.set_status(
        Panel::Search,
        StatusMessage::ok(format!("正在安装 {} ...", names.join(", "))),
    );

    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            let result = engine
                .install_packages(&names)
                .unwrap_or_else(|e| crate::brew::OperationResult::fail(e.to_string()));
            drop(guard);
            result
        })
        .await
        .unwrap_or_else(|_| crate::brew::OperationResult::fail("安装任务执行失败"));
        let _ = tx
            .send(AppEvent::OperationDone {
                panel: Panel::Search,
                result,
                refresh: true,
            })
            .await;
    });
}

// ===== 渲染 =====

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = layout::panel_block("搜索 [1]", app.focus == Panel::Search);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    if padded.height < 2 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(padded);

    // 输入行
    let cursor_mark = if app.search.typing { "_" } else { "" };
    let prompt = format!("> {}{}", app.search.input, cursor_mark);
    let prompt_style = if app.search.typing {
        Style::default().fg(BRIGHT_WHITE)
    } else {
        Style::default().fg(DIM)
    };
    f.render_widget(Paragraph::new(prompt).style(prompt_style), chunks[0]);

    // 结果列表
    if app.search.searching {
        let hint = Paragraph::new("正在搜索...").style(Style::default().fg(Color::Yellow));
        f.render_widget(hint, chunks[1]);
    } else if app.search.results.is_empty() {
        let hint = Paragraph::new("按 / 输入关键词，Enter 搜索").style(Style::default().fg(DIM));
        f.render_widget(hint, chunks[1]);
    } else {
        render_results(f, app, chunks[1]);
    }

    layout::render_status(f, &app.search.status, inner);
}

fn render_results(f: &mut Frame, app: &App, area: Rect) {
    let visible_height = area.height as usize;
    let scroll = layout::scroll_offset(app.search.selected, visible_height);

    let max_name_width = app
        .search
        .results
        .iter()
        .skip(scroll)
        .take(visible_height)
        .map(|r| UnicodeWidthStr::width(r.name.as_str()))
        .max()
        .unwrap_or(20);

    let lines: Vec<Line> = app
        .search
        .results
        .iter()
        .enumerate()
        .skip(scroll)
        .take(visible_height)
        .map(|(idx, result)| {
            let is_selected = idx == app.search.selected;
            let is_marked = app.search.marked.contains(&idx);
            let marker = if is_marked { "[✓] " } else { "    " };
            let cursor = if is_selected { ">" } else { " " };
            let padding =
                max_name_width.saturating_sub(UnicodeWidthStr::width(result.name.as_str())) + 2;

            if is_selected {
                let bg = Style::default().bg(SEL_BG);
                Line::from(vec![
                    Span::styled(
                        format!("{}{}", cursor, marker),
                        bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        result.name.clone(),
                        bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("{}{}", " ".repeat(padding), result.description),
                        bg.fg(DESC_DIM),
                    ),
                ])
            } else if is_marked {
                Line::from(vec![
                    Span::styled(format!("{}{}", cursor, marker), Style::default().fg(PINK)),
                    Span::styled(result.name.clone(), Style::default().fg(PINK)),
                    Span::styled(
                        format!("{}{}", " ".repeat(padding), result.description),
                        Style::default().fg(DIM),
                    ),
                ])
            } else {
                Line::from(vec![
                    Span::styled(
                        format!("{}{}", cursor, marker),
                        Style::default().fg(Color::White),
                    ),
                    Span::styled(result.name.clone(), Style::default().fg(BLUE)),
                    Span::styled(
                        format!("{}{}", " ".repeat(padding), result.description),
                        Style::default().fg(DIM),
                    ),
                ])
            }
        })
        .collect();

    f.render_widget(Paragraph::new(lines), area);
    layout::render_scrollbar(f, app.search.results.len(), scroll, area);
}

/// 命令栏提示
pub fn hint(app: &App) -> &'static str {
    if app.search.typing {
        "Enter 搜索 | Esc 退出输入"
    } else if app.search.marked.is_empty() {
        "/ 输入 | ↑↓ 选择 | Space 多选 | i 安装 | 1/2/3 切换面板 | q 退出"
    } else {
        "/ 输入 | ↑↓ 选择 | Space 多选/取消 | i 安装标记项 | q 退出"
    }
}
