//! 控制台端到端流程：编排器 + Mock 网关，通过命令通道驱动，通过 watch 观察状态

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use ayzen::api::{ApiError, MockGateway, ScrapeConfig, TaskStatusReport};
use ayzen::config::AppConfig;
use ayzen::core::{spawn_console, ChatRole, Command, Severity, TaskStatus, UiState};

struct Harness {
    mock: Arc<MockGateway>,
    cmd: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<UiState>,
    handle: JoinHandle<()>,
}

impl Harness {
    fn new(mock: MockGateway) -> Self {
        let mut cfg = AppConfig::default();
        cfg.polling.interval_ms = 100;
        let mock = Arc::new(mock);
        let (cmd, state, handle) = spawn_console(&cfg, mock.clone());
        Self {
            mock,
            cmd,
            state,
            handle,
        }
    }

    fn send(&self, cmd: Command) {
        self.cmd.send(cmd).unwrap();
    }

    async fn wait_until(&mut self, f: impl FnMut(&UiState) -> bool) -> UiState {
        let state = tokio::time::timeout(Duration::from_secs(5), self.state.wait_for(f))
            .await
            .expect("timed out waiting for console state")
            .expect("console stopped");
        state.clone()
    }

    async fn quit(self) {
        self.send(Command::Quit);
        tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("console did not stop")
            .unwrap();
    }
}

fn warnings(state: &UiState) -> usize {
    state
        .task
        .log
        .iter()
        .filter(|e| e.severity == Severity::Warning)
        .count()
}

#[tokio::test]
async fn scenario_start_poll_complete() {
    let mock = MockGateway::new();
    mock.push_started("T1");
    mock.push_status(Ok(
        TaskStatusReport::new("running", 40.0).with_log(["[12:00:01] Crawling..."])
    ));
    mock.push_status(Ok(TaskStatusReport::new("completed", 100.0)
        .with_log(["[12:00:01] Crawling...", "[12:00:30] Finished OK"])
        .with_files(["leads.csv"])));
    let mut h = Harness::new(mock);

    h.send(Command::StartTask(ScrapeConfig::default()));
    let state = h.wait_until(|s| s.task.status == TaskStatus::Completed).await;

    assert_eq!(state.task.progress, 100);
    assert!(state.task.task_id.is_none());
    assert!(state.task.controls.start_enabled);
    assert!(!state.task.controls.cancel_enabled);
    assert!(!state.task.controls.form_locked);
    assert_eq!(state.task.result_files.len(), 1);
    assert_eq!(state.task.result_files[0].name, "leads.csv");
    let crawling = state
        .task
        .log
        .iter()
        .filter(|e| e.text == "Crawling...")
        .count();
    assert_eq!(crawling, 1);

    // 终态后不再轮询
    let calls = h.mock.status_calls();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.mock.status_calls(), calls);
    h.quit().await;
}

#[tokio::test]
async fn scenario_cancel_while_running() {
    let mock = MockGateway::new();
    mock.push_started("T2");
    mock.push_status(Ok(TaskStatusReport::new("running", 10.0)));
    let mut h = Harness::new(mock);

    h.send(Command::StartTask(ScrapeConfig::default()));
    h.wait_until(|s| s.task.status == TaskStatus::Running).await;

    h.send(Command::CancelTask);
    let state = h
        .wait_until(|s| {
            s.task
                .log
                .iter()
                .any(|e| e.text == "Cancellation signal sent.")
        })
        .await;
    assert_eq!(state.task.status, TaskStatus::Running);
    assert!(!state.task.controls.cancel_enabled);

    h.mock.push_status(Ok(TaskStatusReport::new("cancelled", 10.0)
        .with_log(["[12:01:00] Cancellation requested by user..."])));
    let state = h.wait_until(|s| s.task.status == TaskStatus::Cancelled).await;
    assert!(state.task.controls.start_enabled);
    assert!(state.task.result_files.is_empty());

    let calls = h.mock.status_calls();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.mock.status_calls(), calls);
    h.quit().await;
}

#[tokio::test]
async fn scenario_transient_failures_then_recovery() {
    let mock = MockGateway::new();
    mock.push_started("T3");
    mock.push_status(Err(ApiError::transport()));
    mock.push_status(Err(ApiError::transport()));
    mock.push_status(Ok(TaskStatusReport::new("running", 55.0)));
    let mut h = Harness::new(mock);

    h.send(Command::StartTask(ScrapeConfig::default()));
    let state = h.wait_until(|s| s.task.progress == 55).await;

    assert_eq!(state.task.status, TaskStatus::Running);
    assert_eq!(warnings(&state), 2);
    assert!(state.task.controls.cancel_enabled);

    h.send(Command::ResetTask);
    let state = h.wait_until(|s| s.task.status == TaskStatus::Idle).await;
    assert!(state.task.log.is_empty());
    h.quit().await;
}

#[tokio::test]
async fn scenario_not_found_resets_to_idle() {
    let mock = MockGateway::new();
    mock.push_started("T4");
    mock.push_status(Err(ApiError::NotFound("Task with ID T4 not found.".into())));
    let mut h = Harness::new(mock);

    h.send(Command::StartTask(ScrapeConfig::default()));
    let state = h
        .wait_until(|s| {
            s.task.status == TaskStatus::Idle
                && s.task.log.iter().any(|e| e.severity == Severity::Error)
        })
        .await;

    assert!(state.task.task_id.is_none());
    assert!(state.task.controls.start_enabled);
    let errors = state
        .task
        .log
        .iter()
        .filter(|e| e.severity == Severity::Error)
        .count();
    assert_eq!(errors, 1);
    h.quit().await;
}

#[tokio::test]
async fn scenario_chat_single_flight() {
    let mock = MockGateway::new();
    let gate = mock.gate_chat();
    let mut h = Harness::new(mock);

    h.send(Command::OpenChat);
    h.send(Command::SendChat("hi".into()));
    h.send(Command::SendChat("hi".into()));
    h.send(Command::SelectPersona("1".into()));
    let state = h.wait_until(|s| s.chat.persona_id == "1").await;

    assert!(state.chat.pending);
    assert!(!state.chat.input_enabled);
    // 问候 + 一条用户消息
    assert_eq!(state.chat.history.len(), 2);

    gate.notify_one();
    let state = h.wait_until(|s| !s.chat.pending).await;
    assert_eq!(state.chat.history.len(), 3);
    assert_eq!(state.chat.history[2].role, ChatRole::Assistant);
    assert_eq!(h.mock.chat_calls().len(), 1);
    h.quit().await;
}

#[tokio::test]
async fn scenario_reply_keeps_persona_at_send_time() {
    let mock = MockGateway::new();
    let gate = mock.gate_chat();
    mock.push_chat(Ok("Numbers look solid.".into()));
    let mut h = Harness::new(mock);

    h.send(Command::SelectPersona("2".into()));
    h.send(Command::SendChat("status?".into()));
    h.send(Command::SelectPersona("3".into()));
    h.wait_until(|s| s.chat.persona_id == "3" && s.chat.pending)
        .await;

    gate.notify_one();
    let state = h.wait_until(|s| !s.chat.pending).await;
    let reply = state.chat.history.last().unwrap();
    assert_eq!(reply.sender, "Brenda (She/Her)");
    assert_eq!(reply.text, "Numbers look solid.");
    assert_eq!(state.chat.persona_label, "Chris (They/Them)");
    assert_eq!(h.mock.chat_calls()[0].1, "2");
    h.quit().await;
}

#[tokio::test]
async fn chat_failure_releases_input() {
    let mock = MockGateway::new();
    mock.push_chat(Err(ApiError::transport()));
    let mut h = Harness::new(mock);

    h.send(Command::SendChat("hello".into()));
    let state = h
        .wait_until(|s| s.chat.history.len() == 2 && !s.chat.pending)
        .await;

    assert!(state.chat.input_enabled);
    let last = state.chat.history.last().unwrap();
    assert_eq!(last.role, ChatRole::System);
    assert_eq!(last.text, "Error: Failed to reach the server");
    h.quit().await;
}

#[tokio::test]
async fn initial_state_shows_default_persona() {
    let h = Harness::new(MockGateway::new());

    let state = h.state.borrow().clone();
    assert_eq!(state.chat.persona_id, "default");
    assert_eq!(state.chat.persona_label, "Ayzen Assistant");
    assert!(state.chat.input_enabled);
    assert_eq!(state.task.status, TaskStatus::Idle);
    assert!(state.task.controls.start_enabled);
    h.quit().await;
}
