pub mod input;
mod installed;
mod layout;
mod search;
pub mod state;
mod sync;
mod theme;

use crate::config::Config;
use crate::engine::{Engine, SyncState};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use state::{App, AppEvent, Panel, StatusMessage};
use std::io;
use tokio::sync::mpsc;

/// 操作在途时的命令栏提示；此时除 Ctrl+C 外的按键都被吞掉
const BUSY_HINT: &str = "操作进行中，请稍候... | Ctrl+C 强制退出";

pub async fn run(config: Config, engine: Engine) -> Result<()> {
    // 终端初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, engine);

    let (tx, mut rx) = mpsc::channel(32);

    // 启动时加载已安装列表 + brewfile 状态
    spawn_refresh(&app, &tx);

    // 后台刷新 Homebrew 数据库
    if app.config.update_on_start {
        app.set_status(
            Panel::Installed,
            StatusMessage::ok("正在后台更新 Homebrew 数据库..."),
        );
        let brew = app.engine.brew().clone();
        let tx_clone = tx.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || brew.update_database())
                .await
                .unwrap_or_else(|_| crate::brew::OperationResult::fail("更新任务执行失败"));
            let _ = tx_clone.send(AppEvent::DatabaseUpdated(result)).await;
        });
    }

    // 主循环
    loop {
        app.expire_statuses();

        terminal.draw(|f| ui(f, &app))?;

        // 处理按键
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if app.typing() {
                    // 输入态：所有按键交给当前面板的输入框
                    match app.focus {
                        Panel::Search => search::handle_key(key, &mut app, &tx),
                        Panel::Installed => installed::handle_key(key, &mut app, &tx),
                        Panel::Sync => {}
                    }
                } else if app.engine.lock.is_held() {
                    // 操作在途：除 Ctrl+C 外吞掉所有按键，包括面板切换和 q
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        app.should_quit = true;
                    }
                } else {
                    // 待确认的同步差异被任何非 i 按键取消
                    if key.code != KeyCode::Char('i') {
                        app.sync.cancel_pending();
                    }

                    match key.code {
                        KeyCode::Char('q') => {
                            app.should_quit = true;
                        }
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            app.should_quit = true;
                        }
                        KeyCode::Char('1') => app.focus = Panel::Search,
                        KeyCode::Char('2') => app.focus = Panel::Installed,
                        KeyCode::Char('3') => app.focus = Panel::Sync,
                        KeyCode::Tab => app.focus = app.focus.next(),
                        _ => match app.focus {
                            Panel::Search => search::handle_key(key, &mut app, &tx),
                            Panel::Installed => installed::handle_key(key, &mut app, &tx),
                            Panel::Sync => sync::handle_key(key, &mut app, &tx),
                        },
                    }
                }
            }
        }

        // 处理异步事件
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Refreshed {
                    packages,
                    brewfile_exists,
                    symlink_target,
                    up_to_date,
                } => {
                    app.installed.reload(packages);

                    app.sync.exists = brewfile_exists;
                    app.sync.symlink_target = symlink_target;
                    app.sync.up_to_date = up_to_date;
                }
                AppEvent::SearchResults { results, seq } => {
                    // 丢弃过期搜索的结果
                    if seq == app.search.seq {
                        app.search.results = results;
                        app.search.selected = 0;
                        app.search.marked.clear();
                        app.search.searching = false;
                    }
                }
                AppEvent::OperationDone {
                    panel,
                    result,
                    refresh,
                } => {
                    let msg = if result.success {
                        StatusMessage::ok(result.message)
                    } else {
                        StatusMessage::err(result.message)
                    };
                    app.set_status(panel, msg);
                    if panel == Panel::Sync {
                        app.sync.state = SyncState::Idle;
                    }
                    if refresh {
                        spawn_refresh(&app, &tx);
                    }
                }
                AppEvent::SyncChecked(checked) => match checked {
                    Ok(diff) => {
                        if diff.is_empty() {
                            app.sync.state = SyncState::Idle;
                            app.set_status(
                                Panel::Sync,
                                StatusMessage::ok("brewfile 与安装集合一致，无需变更"),
                            );
                        } else {
                            app.sync.state = SyncState::AwaitingConfirmation(diff);
                        }
                    }
                    Err(msg) => {
                        app.sync.state = SyncState::Idle;
                        app.set_status(Panel::Sync, StatusMessage::err(msg));
                    }
                },
                AppEvent::DatabaseUpdated(result) => {
                    let msg = if result.success {
                        StatusMessage::ok(result.message)
                    } else {
                        StatusMessage::err(result.message)
                    };
                    app.set_status(Panel::Installed, msg);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

/// 后台重新加载已安装列表和 brewfile 状态
pub(crate) fn spawn_refresh(app: &App, tx: &mpsc::Sender<AppEvent>) {
    let engine = app.engine.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let refreshed = tokio::task::spawn_blocking(move || {
            let packages = engine.brew().installed_packages();
            let brewfile = engine.brewfile();
            AppEvent::Refreshed {
                brewfile_exists: brewfile.exists(),
                symlink_target: brewfile.symlink_target(),
                up_to_date: brewfile.is_up_to_date(&packages),
                packages,
            }
        })
        .await;
        if let Ok(event) = refreshed {
            let _ = tx.send(event).await;
        }
    });
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = layout::panel_layout(f.area());
    search::render(f, app, chunks[0]);
    installed::render(f, app, chunks[1]);
    sync::render(f, app, chunks[2]);

    let hint = if app.engine.lock.is_held() {
        BUSY_HINT
    } else {
        match app.focus {
            Panel::Search => search::hint(app),
            Panel::Installed => installed::hint(app),
            Panel::Sync => sync::hint(app),
        }
    };
    layout::render_command_bar(f, hint, chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_hint_only_advertises_live_keys() {
        // 锁持有期间 q 被吞掉，提示里不能出现它
        assert!(!BUSY_HINT.contains('q'));
        assert!(BUSY_HINT.contains("Ctrl+C"));
    }
}
