//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx 与键盘事件，将输入行与快捷键转为 Command 发送给编排器，
//! 每帧用 draw 渲染 UiState、启动表单草稿与输入缓冲。

use std::io::{self, Stdout};

use crossterm::event::KeyCode;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::api::ScrapeConfig;
use crate::core::{Command, UiState};
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::input::{parse_line, CommandKind, InputAction, HELP};
use crate::ui::render::{draw, ViewState};

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    initial_form: ScrapeConfig,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let event_handler = EventHandler::new(cmd_tx);
    let mut view = ViewState {
        form: initial_form,
        input: String::new(),
        notice: Some(HELP.to_string()),
        log_scroll: usize::MAX,
    };
    let mut last_log_len = 0usize;

    loop {
        let state = state_rx.borrow().clone();

        // 新日志到达时跟随到底部
        if state.task.log.len() != last_log_len {
            last_log_len = state.task.log.len();
            view.log_scroll = usize::MAX;
        }

        if let Ok(Some(ev)) = event_handler.poll() {
            match ev {
                AppEvent::Command(Command::Quit) => break,
                AppEvent::Command(_) => {}
                AppEvent::Key(key) => match key.code {
                    KeyCode::Enter => {
                        let line = std::mem::take(&mut view.input);
                        let action = parse_line(
                            &line,
                            &mut view.form,
                            state.chat.open,
                            state.task.controls.form_locked,
                        );
                        match action {
                            InputAction::Send(kind) => {
                                // 等待回复期间对话输入禁用
                                let blocked = matches!(kind, CommandKind::Chat(_))
                                    && !state.chat.input_enabled;
                                if blocked {
                                    view.input = line;
                                    view.notice = Some("Waiting for reply...".to_string());
                                } else {
                                    event_handler.send(kind.into());
                                    view.notice = None;
                                }
                            }
                            InputAction::Notice(text) => view.notice = Some(text),
                            InputAction::Quit => break,
                            InputAction::Nothing => {}
                        }
                    }
                    KeyCode::Backspace => {
                        view.input.pop();
                    }
                    KeyCode::Char(c) => view.input.push(c),
                    KeyCode::Up => view.log_scroll = view.log_scroll.saturating_sub(1),
                    KeyCode::Down => view.log_scroll = view.log_scroll.saturating_add(1),
                    KeyCode::PageUp => view.log_scroll = view.log_scroll.saturating_sub(10),
                    KeyCode::PageDown => view.log_scroll = view.log_scroll.saturating_add(10),
                    KeyCode::Home => view.log_scroll = 0,
                    KeyCode::End => view.log_scroll = usize::MAX,
                    _ => {}
                },
            }
        }

        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| draw(f, &state, &view, &mut scroll_info))?;
        let (total_lines, viewport_height) = scroll_info;
        view.log_scroll = view.log_scroll.min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }

    restore_terminal(&mut terminal)?;
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
