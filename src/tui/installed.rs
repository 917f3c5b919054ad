use super::input::{str_delete_back, str_delete_forward, str_insert_char};
use super::layout;
use super::state::{App, AppEvent, Panel, StatusMessage};
use super::theme::{BLUE, BRIGHT_WHITE, DESC_DIM, DIM, OUTDATED, PINK, SEL_BG};
use crate::brew::OperationResult;
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

/// 已安装面板按键处理
pub fn handle_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if app.installed.typing {
        handle_typing_key(key, app);
        return;
    }

    match key.code {
        KeyCode::Char('/') => {
            app.installed.typing = true;
        }
        KeyCode::Up => {
            app.installed.selected = app.installed.selected.saturating_sub(1);
        }
        KeyCode::Down => {
            let max = app.installed.row_count().saturating_sub(1);
            if app.installed.selected < max {
                app.installed.selected += 1;
            }
        }
        KeyCode::Char(' ') => {
            if app.installed.on_select_all_row() {
                app.installed.toggle_select_all();
            } else if let Some(&real_idx) = app
                .installed
                .selected
                .checked_sub(1)
                .and_then(|i| app.installed.filtered.get(i))
            {
                if !app.installed.marked.remove(&real_idx) {
                    app.installed.marked.insert(real_idx);
                }
                app.installed.select_all = false;
                // 选中后自动下移
                let max = app.installed.row_count().saturating_sub(1);
                if app.installed.selected < max {
                    app.installed.selected += 1;
                }
            }
        }
        KeyCode::Char('u') => {
            spawn_upgrade(app, tx);
        }
        KeyCode::Char('d') => {
            spawn_uninstall(app, tx);
        }
        KeyCode::Char('r') => {
            app.installed.loading = true;
            super::spawn_refresh(app, tx);
        }
        _ => {}
    }
}

fn handle_typing_key(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => {
            app.installed.typing = false;
        }
        KeyCode::Backspace => {
            str_delete_back(&mut app.installed.input, &mut app.installed.cursor);
            app.installed.apply_filter();
        }
        KeyCode::Delete => {
            str_delete_forward(&mut app.installed.input, &mut app.installed.cursor);
            app.installed.apply_filter();
        }
        KeyCode::Left => {
            app.installed.cursor = app.installed.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let max = app.installed.input.chars().count();
            if app.installed.cursor < max {
                app.installed.cursor += 1;
            }
        }
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return;
            }
            str_insert_char(&mut app.installed.input, &mut app.installed.cursor, c);
            app.installed.apply_filter();
        }
        _ => {}
    }
}

/// 更新标记的包；全选时退化为整体 upgrade
fn spawn_upgrade(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let select_all = app.installed.select_all;
    let names = app.installed.selected_names();
    if !select_all && names.is_empty() {
        app.set_status(Panel::Installed, StatusMessage::err("没有选中任何包"));
        return;
    }

    let Some(guard) = app.engine.lock.try_acquire() else {
        return;
    };

    let label = if select_all {
        "正在更新所有包 ...".to_string()
    } else {
        format!("正在更新 {} ...", names.join(", "))
    };
    app.set_status(Panel::Installed, StatusMessage::ok(label));

    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            let result = engine
                .upgrade_packages(&names, select_all)
                .unwrap_or_else(|e| OperationResult::fail(e.to_string()));
            drop(guard);
            result
        })
        .await
        .unwrap_or_else(|_| OperationResult::fail("更新任务执行失败"));
        let _ = tx
            .send(AppEvent::OperationDone {
                panel: Panel::Installed,
                result,
                refresh: true,
            })
            .await;
    });
}

/// 卸载标记的包；全选直接拒绝，不进入子流程
fn spawn_uninstall(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if app.installed.select_all {
        app.set_status(
            Panel::Installed,
            StatusMessage::err("卸载是破坏性操作，不支持全选，请逐个选择"),
        );
        return;
    }
    let names = app.installed.selected_names();
    if names.is_empty() {
        app.set_status(Panel::Installed, StatusMessage::err("没有选中任何包"));
        return;
    }

    let Some(guard) = app.engine.lock.try_acquire() else {
        return;
    };

    app.set_status(
        Panel::Installed,
        StatusMessage::ok(format!("正在卸载 {} ...", names.join(", "))),
    );

    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            let result = engine
                .uninstall_packages(&names, false)
                .unwrap_or_else(|e| OperationResult::fail(e.to_string()));
            drop(guard);
            result
        })
        .await
        .unwrap_or_else(|_| OperationResult::fail("卸载任务执行失败"));
        let _ = tx
            .send(AppEvent::OperationDone {
                panel: Panel::Installed,
                result,
                refresh: true,
            })
            .await;
    });
}

// ===== 渲染 =====

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = layout::panel_block("已安装 [2]", app.focus == Panel::Installed);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    if padded.height < 3 {
        return;
    }

    if app.installed.loading {
        let loading =
            Paragraph::new("正在加载已安装包列表...").style(Style::default().fg(Color::Yellow));
        f.render_widget(loading, padded);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // 筛选框
            Constraint::Length(1), // 统计
            Constraint::Min(0),    // 列表
        ])
        .split(padded);

    // 筛选框
    let cursor_mark = if app.installed.typing { "_" } else { "" };
    let filter_text = format!("> 筛选: {}{}", app.installed.input, cursor_mark);
    let filter_style = if app.installed.typing {
        Style::default().fg(BRIGHT_WHITE)
    } else {
        Style::default().fg(DIM)
    };
    f.render_widget(Paragraph::new(filter_text).style(filter_style), chunks[0]);

    // 统计行
    let stat_text = format!(
        "共 {} 个匹配 / 已安装 {} 个 / 可更新 {} 个",
        app.installed.filtered.len(),
        app.installed.packages.len(),
        app.installed.outdated_count()
    );
    f.render_widget(
        Paragraph::new(stat_text).style(Style::default().fg(Color::DarkGray)),
        chunks[1],
    );

    render_package_list(f, app, chunks[2]);
    layout::render_status(f, &app.installed.status, inner);
}

fn render_package_list(f: &mut Frame, app: &App, area: Rect) {
    if app.installed.filtered.is_empty() {
        if !app.installed.input.is_empty() {
            let hint =
                Paragraph::new("  未找到匹配的包").style(Style::default().fg(Color::DarkGray));
            f.render_widget(hint, area);
        }
        return;
    }

    let visible_height = area.height as usize;
    let total = app.installed.row_count();
    let scroll = layout::scroll_offset(app.installed.selected, visible_height);

    let max_name_width = app
        .installed
        .filtered
        .iter()
        .filter_map(|&idx| app.installed.packages.get(idx))
        .map(|pkg| UnicodeWidthStr::width(pkg.name.as_str()))
        .max()
        .unwrap_or(20);

    let mut lines: Vec<Line> = Vec::with_capacity(visible_height);
    for row in scroll..(scroll + visible_height).min(total) {
        let is_selected = row == app.installed.selected;
        if row == 0 {
            // "全选"行
            let marker = if app.installed.select_all {
                "[✓] "
            } else {
                "[ ] "
            };
            let cursor = if is_selected { ">" } else { " " };
            let style = if is_selected {
                Style::default()
                    .bg(SEL_BG)
                    .fg(BRIGHT_WHITE)
                    .add_modifier(Modifier::BOLD)
            } else if app.installed.select_all {
                Style::default().fg(PINK)
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::from(Span::styled(
                format!("{}{}全选", cursor, marker),
                style,
            )));
            continue;
        }

        let Some(&real_idx) = app.installed.filtered.get(row - 1) else {
            continue;
        };
        let pkg = &app.installed.packages[real_idx];
        let is_marked = app.installed.marked.contains(&real_idx);
        let marker = if is_marked { "[✓] " } else { "    " };
        let cursor = if is_selected { ">" } else { " " };
        let padding = max_name_width.saturating_sub(UnicodeWidthStr::width(pkg.name.as_str())) + 2;

        let version = if pkg.outdated {
            format!("{} → {}", pkg.installed_version, pkg.available_version)
        } else {
            pkg.installed_version.clone()
        };

        let line = if is_selected {
            let bg = Style::default().bg(SEL_BG);
            Line::from(vec![
                Span::styled(
                    format!("{}{}", cursor, marker),
                    bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    pkg.name.clone(),
                    bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("{}{}", " ".repeat(padding), version),
                    if pkg.outdated {
                        bg.fg(OUTDATED)
                    } else {
                        bg.fg(DESC_DIM)
                    },
                ),
            ])
        } else if is_marked {
            Line::from(vec![
                Span::styled(format!("{}{}", cursor, marker), Style::default().fg(PINK)),
                Span::styled(pkg.name.clone(), Style::default().fg(PINK)),
                Span::styled(
                    format!("{}{}", " ".repeat(padding), version),
                    Style::default().fg(if pkg.outdated { OUTDATED } else { DIM }),
                ),
            ])
        } else {
            Line::from(vec![
                Span::styled(
                    format!("{}{}", cursor, marker),
                    Style::default().fg(Color::White),
                ),
                Span::styled(pkg.name.clone(), Style::default().fg(BLUE)),
                Span::styled(
                    format!("{}{}", " ".repeat(padding), version),
                    Style::default().fg(if pkg.outdated { OUTDATED } else { DIM }),
                ),
            ])
        };
        lines.push(line);
    }

    f.render_widget(Paragraph::new(lines), area);
    layout::render_scrollbar(f, total, scroll, area);
}

/// 命令栏提示
pub fn hint(app: &App) -> &'static str {
    if app.installed.typing {
        "输入关键词筛选 | Enter/Esc 退出输入"
    } else if app.installed.select_all {
        "u 更新全部 | Space 取消全选 | r 刷新 | q 退出"
    } else {
        "/ 筛选 | ↑↓ 选择 | Space 多选 | u 更新 | d 卸载 | r 刷新 | q 退出"
    }
}
