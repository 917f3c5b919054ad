use super::layout;
use super::state::{App, AppEvent, Panel, StatusMessage};
use super::theme::{BLUE, BRIGHT_WHITE, DIM, OUTDATED, PINK};
use crate::brew::OperationResult;
use crate::engine::SyncState;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Margin, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// brewfile 面板按键处理
pub fn handle_key(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    match key.code {
        KeyCode::Char('c') => {
            spawn_create(app, tx);
        }
        KeyCode::Char('u') => {
            spawn_update(app, tx);
        }
        KeyCode::Char('i') => match app.sync.state.clone() {
            SyncState::Idle => spawn_check(app, tx),
            SyncState::AwaitingConfirmation(diff) => spawn_apply(app, tx, diff),
            SyncState::Applying => {}
        },
        _ => {}
    }
}

/// 用当前安装集合新建 brewfile
fn spawn_create(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    let Some(guard) = app.engine.lock.try_acquire() else {
        return;
    };

    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            let installed = engine.brew().installed_packages();
            let result = engine.create_brewfile(&installed);
            drop(guard);
            result
        })
        .await
        .unwrap_or_else(|_| OperationResult::fail("创建任务执行失败"));
        let _ = tx
            .send(AppEvent::OperationDone {
                panel: Panel::Sync,
                result,
                refresh: true,
            })
            .await;
    });
}

/// 把 brewfile 同步为当前安装集合；目标是符号链接时先警告再继续
fn spawn_update(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    if !app.sync.exists {
        app.set_status(
            Panel::Sync,
            StatusMessage::err("未找到 brewfile，请先按 c 创建"),
        );
        return;
    }

    let Some(guard) = app.engine.lock.try_acquire() else {
        return;
    };

    let symlinked = app.sync.symlink_target.clone();
    if let Some(target) = &symlinked {
        app.set_status(
            Panel::Sync,
            StatusMessage::err(format!(
                "brewfile 是符号链接 → {}，即将覆盖其内容",
                target.display()
            )),
        );
    }

    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        // 警告停留片刻后继续，不阻断操作
        if symlinked.is_some() {
            tokio::time::sleep(Duration::from_millis(1500)).await;
        }
        let result = tokio::task::spawn_blocking(move || {
            let installed = engine.brew().installed_packages();
            let result = engine.update_brewfile(&installed);
            drop(guard);
            result
        })
        .await
        .unwrap_or_else(|_| OperationResult::fail("更新任务执行失败"));
        let _ = tx
            .send(AppEvent::OperationDone {
                panel: Panel::Sync,
                result,
                refresh: true,
            })
            .await;
    });
}

/// 第一次按 i：计算差异，进入待确认
fn spawn_check(app: &mut App, tx: &mpsc::Sender<AppEvent>) {
    app.set_status(Panel::Sync, StatusMessage::ok("正在检查差异..."));
    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let checked = tokio::task::spawn_blocking(move || {
            engine.check_apply().map_err(|e| e.to_string())
        })
        .await
        .unwrap_or_else(|_| Err("检查任务执行失败".to_string()));
        let _ = tx.send(AppEvent::SyncChecked(checked)).await;
    });
}

/// 第二次按 i：确认并执行差异
fn spawn_apply(app: &mut App, tx: &mpsc::Sender<AppEvent>, diff: crate::brew::SyncDiff) {
    let Some(guard) = app.engine.lock.try_acquire() else {
        return;
    };

    app.sync.state = SyncState::Applying;
    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            let result = engine.apply_diff(&diff);
            drop(guard);
            result
        })
        .await
        .unwrap_or_else(|_| OperationResult::fail("同步任务执行失败"));
        let _ = tx
            .send(AppEvent::OperationDone {
                panel: Panel::Sync,
                result,
                refresh: true,
            })
            .await;
    });
}

// ===== 渲染 =====

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = layout::panel_block("Brewfile [3]", app.focus == Panel::Sync);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    if padded.height < 2 {
        return;
    }

    let mut lines: Vec<Line> = Vec::new();

    // 路径行
    let mut path_spans = vec![
        Span::styled("路径: ", Style::default().fg(DIM)),
        Span::styled(
            app.engine.brewfile().path().display().to_string(),
            Style::default().fg(Color::White),
        ),
    ];
    if let Some(target) = &app.sync.symlink_target {
        path_spans.push(Span::styled(
            format!(" → {}", target.display()),
            Style::default().fg(OUTDATED),
        ));
    }
    lines.push(Line::from(path_spans));

    // 状态行
    let state_line = if !app.sync.exists {
        Line::from(Span::styled(
            "状态: 不存在（按 c 用当前安装集合创建）",
            Style::default().fg(DIM),
        ))
    } else if app.sync.up_to_date {
        Line::from(vec![
            Span::styled("状态: ", Style::default().fg(DIM)),
            Span::styled("已同步", Style::default().fg(BLUE)),
        ])
    } else {
        Line::from(vec![
            Span::styled("状态: ", Style::default().fg(DIM)),
            Span::styled("与安装集合有差异", Style::default().fg(OUTDATED)),
        ])
    };
    lines.push(state_line);

    // 同步流程行
    match &app.sync.state {
        SyncState::Idle => {}
        SyncState::AwaitingConfirmation(diff) => {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("将安装 {} 个: ", diff.to_install.len()),
                    Style::default().fg(BLUE),
                ),
                Span::styled(diff.to_install.join(", "), Style::default().fg(Color::White)),
            ]));
            lines.push(Line::from(vec![
                Span::styled(
                    format!("将卸载 {} 个: ", diff.to_remove.len()),
                    Style::default().fg(PINK),
                ),
                Span::styled(diff.to_remove.join(", "), Style::default().fg(Color::White)),
            ]));
            lines.push(Line::from(Span::styled(
                "再次按 i 确认同步，按其他键取消",
                Style::default().fg(BRIGHT_WHITE),
            )));
        }
        SyncState::Applying => {
            lines.push(Line::from(Span::styled(
                "正在同步...",
                Style::default().fg(Color::Yellow),
            )));
        }
    }

    f.render_widget(Paragraph::new(lines), padded);
    layout::render_status(f, &app.sync.status, inner);
}

/// 命令栏提示
pub fn hint(app: &App) -> &'static str {
    match &app.sync.state {
        SyncState::AwaitingConfirmation(_) => "i 确认同步 | 其他键取消",
        SyncState::Applying => "同步进行中...",
        SyncState::Idle => {
            if app.sync.exists {
                "i 应用 brewfile | u 用安装集合覆盖 | c 重建 | q 退出"
            } else {
                "c 创建 brewfile | q 退出"
            }
        }
    }
}
