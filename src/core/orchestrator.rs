//! 控制台编排器：主控循环
//!
//! 负责：选择网关（HTTP / Mock）、健康检查、创建任务与对话两个控制器，
//! 并在后台任务中同时消费用户命令与两路异步结果（select!），每次变化后通过 watch 发布新的 UiState。
//! 两个控制器只被这一个任务修改。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::api::{ApiGateway, HttpGateway, MockGateway, ScrapeConfig};
use crate::config::AppConfig;
use crate::core::chat::ChatSession;
use crate::core::task::TaskSession;
use crate::core::{SessionSupervisor, UiState};

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交启动表单
    StartTask(ScrapeConfig),
    /// 请求取消当前任务
    CancelTask,
    /// 显式重置任务会话（停止轮询并清空日志）
    ResetTask,
    OpenChat,
    CloseChat,
    ToggleChat,
    SelectPersona(String),
    SendChat(String),
    /// 下载当前结果集中的文件
    DownloadResult(String),
    /// 退出应用
    Quit,
}

/// 按配置选择网关：api.mock = true 时使用离线 Mock
pub fn build_gateway(cfg: &AppConfig) -> Arc<dyn ApiGateway> {
    if cfg.api.mock {
        tracing::warn!("api.mock enabled, using Mock gateway");
        Arc::new(MockGateway::new())
    } else {
        tracing::info!("Using backend at {}", cfg.api.base_url);
        Arc::new(HttpGateway::from_config(&cfg.api))
    }
}

/// 创建控制台运行时：选择网关、做一次健康检查，然后启动主控循环
pub async fn create_console(
    cfg: &AppConfig,
) -> (
    mpsc::UnboundedSender<Command>,
    watch::Receiver<UiState>,
    JoinHandle<()>,
) {
    let gateway = build_gateway(cfg);
    // 后端不可达不阻止启动，只记录告警
    match gateway.health().await {
        Ok(h) => tracing::info!("Backend health: {}", h.status),
        Err(e) => tracing::warn!("Backend health check failed: {}", e),
    }
    spawn_console(cfg, gateway)
}

/// 启动主控循环；返回命令发送端、状态接收端与后台任务句柄
pub fn spawn_console(
    cfg: &AppConfig,
    gateway: Arc<dyn ApiGateway>,
) -> (
    mpsc::UnboundedSender<Command>,
    watch::Receiver<UiState>,
    JoinHandle<()>,
) {
    let supervisor = SessionSupervisor::new();
    let (mut task, mut task_rx) = TaskSession::new(
        gateway.clone(),
        cfg.polling.interval(),
        supervisor.child_token(),
    );
    let (mut chat, mut chat_rx) =
        ChatSession::new(gateway, &cfg.chat.default_persona, supervisor.child_token());
    let download_dir: PathBuf = cfg.app.download_dir.clone();

    // 两通道：UI -> Core 命令；Core -> UI 状态快照
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState {
        task: task.view(),
        chat: chat.view(),
    });

    let span = tracing::info_span!("console", session = %supervisor.session_id());
    let handle = tokio::spawn(
        async move {
            tracing::info!("Console session started");
            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(Command::Quit) | None => break,
                            Some(cmd) => apply(cmd, &mut task, &mut chat, &download_dir),
                        }
                    }
                    Some(event) = task_rx.recv() => task.handle(event),
                    Some(event) = chat_rx.recv() => chat.handle(event),
                }
                let _ = state_tx.send(UiState {
                    task: task.view(),
                    chat: chat.view(),
                });
            }
            supervisor.shutdown();
            task.teardown();
            tracing::info!("Console session ended");
        }
        .instrument(span),
    );

    (cmd_tx, state_rx, handle)
}

fn apply(cmd: Command, task: &mut TaskSession, chat: &mut ChatSession, download_dir: &Path) {
    // 失败已在控制器内部记录为日志行，这里只留调试信息
    let outcome = match cmd {
        Command::StartTask(config) => task.submit(config),
        Command::CancelTask => task.cancel(),
        Command::ResetTask => {
            task.teardown();
            Ok(())
        }
        Command::DownloadResult(name) => task.download(&name, download_dir),
        Command::OpenChat => {
            chat.open();
            Ok(())
        }
        Command::CloseChat => {
            chat.close();
            Ok(())
        }
        Command::ToggleChat => {
            chat.toggle();
            Ok(())
        }
        Command::SelectPersona(id) => {
            chat.select_persona(&id);
            Ok(())
        }
        Command::SendChat(text) => {
            if !chat.send(&text) {
                tracing::debug!("Chat send ignored (blank or pending)");
            }
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(e) = outcome {
        tracing::debug!("Command rejected: {}", e);
    }
}
