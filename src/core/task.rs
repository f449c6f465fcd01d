//! 任务会话控制器：启动 / 轮询 / 取消 / 重置
//!
//! 状态机：idle → starting → running → {completed | error | cancelled}；终态下可再次提交。
//! 请求在独立 tokio 任务中执行，结果以 TaskEvent 发回，由持有者调用 handle 应用；
//! 每个结果都带启动序号或任务 ID，与当前状态不匹配的过期结果直接丢弃。
//!
//! 不变量：task_id 只在 running 时存在；轮询 worker 只在 task_id 存在时运行。

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ApiGateway, ScrapeConfig, StartedTask, TaskId, TaskStatusReport, TerminalStatus};
use crate::core::error::{ConsoleError, RecoveryAction};
use crate::core::log::{LogAggregator, Severity};
use crate::core::poller::Poller;
use crate::core::progress::{clamp_progress, normalize};
use crate::core::state::TaskView;

/// 客户端任务状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Starting => "starting",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TerminalStatus> for TaskStatus {
    fn from(t: TerminalStatus) -> Self {
        match t {
            TerminalStatus::Completed => TaskStatus::Completed,
            TerminalStatus::Error => TaskStatus::Error,
            TerminalStatus::Cancelled => TaskStatus::Cancelled,
        }
    }
}

/// 可下载的结果文件
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultFile {
    pub name: String,
    pub url: String,
}

/// 任务相关控件的可用性
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TaskControls {
    pub start_enabled: bool,
    pub cancel_enabled: bool,
    /// 启动表单是否锁定
    pub form_locked: bool,
}

impl TaskControls {
    pub fn idle() -> Self {
        Self {
            start_enabled: true,
            cancel_enabled: false,
            form_locked: false,
        }
    }

    fn starting() -> Self {
        Self {
            start_enabled: false,
            cancel_enabled: false,
            form_locked: true,
        }
    }

    fn running() -> Self {
        Self {
            start_enabled: false,
            cancel_enabled: true,
            form_locked: true,
        }
    }
}

/// 异步请求完成后发回控制器的事件
#[derive(Debug)]
pub enum TaskEvent {
    Started {
        attempt: u64,
        result: Result<StartedTask, ApiError>,
    },
    Polled {
        task_id: TaskId,
        result: Result<TaskStatusReport, ApiError>,
    },
    CancelResolved {
        task_id: TaskId,
        result: Result<String, ApiError>,
    },
    Downloaded {
        filename: String,
        result: Result<PathBuf, ConsoleError>,
    },
}

/// 单次任务尝试的状态（新提交时重建日志，teardown 时整体丢弃）
#[derive(Debug, Default)]
pub struct TaskState {
    pub task_id: Option<TaskId>,
    pub status: TaskStatus,
    /// 已收敛到 [0, 100]，保留小数
    pub progress: f64,
    pub log: LogAggregator,
    pub result_files: Vec<ResultFile>,
}

/// 任务会话控制器（TaskState 的唯一持有者）
pub struct TaskSession {
    gateway: Arc<dyn ApiGateway>,
    events: mpsc::UnboundedSender<TaskEvent>,
    interval: Duration,
    token: CancellationToken,
    state: TaskState,
    controls: TaskControls,
    poller: Poller,
    /// 启动序号：用于丢弃过期的启动结果
    attempt: u64,
    /// 本次尝试中的轮询失败次数（用于告警行编号）
    poll_failures: u32,
    /// 控制器自身写入的行在本次尝试中出现的次数；重复行加编号以免被去重吞掉
    repeats: HashMap<String, u32>,
}

impl TaskSession {
    /// 创建控制器；返回的接收端需交给 handle 消费
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        interval: Duration,
        token: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                gateway,
                events,
                interval,
                token,
                state: TaskState::default(),
                controls: TaskControls::idle(),
                poller: Poller::new(),
                attempt: 0,
                poll_failures: 0,
                repeats: HashMap::new(),
            },
            rx,
        )
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.state.task_id.as_ref()
    }

    pub fn controls(&self) -> TaskControls {
        self.controls
    }

    pub fn progress_percent(&self) -> u8 {
        normalize(self.state.progress)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    pub fn view(&self) -> TaskView {
        TaskView {
            status: self.state.status,
            task_id: self.state.task_id.clone(),
            progress: self.progress_percent(),
            log: self.state.log.entries().to_vec(),
            result_files: self.state.result_files.clone(),
            controls: self.controls,
        }
    }

    /// 提交新任务：校验配置、清空日志、发出启动请求
    ///
    /// 启动控件禁用时（starting / running）返回 TaskBusy；终态下可重新提交。
    pub fn submit(&mut self, config: ScrapeConfig) -> Result<(), ConsoleError> {
        if !self.controls.start_enabled {
            tracing::debug!("Submit ignored while task is {}", self.state.status);
            return Err(ConsoleError::TaskBusy);
        }
        let config = match config.validate() {
            Ok(c) => c,
            Err(e) => {
                let err = ConsoleError::from(e);
                self.fail(err.clone());
                return Err(err);
            }
        };

        self.poller.stop();
        self.attempt += 1;
        self.poll_failures = 0;
        self.repeats.clear();
        self.state.log.reset();
        self.state.task_id = None;
        self.state.status = TaskStatus::Starting;
        self.state.progress = 0.0;
        self.state.result_files.clear();
        self.controls = TaskControls::starting();

        self.log_line(
            &format!(
                "Starting task: {} domains, {} threads, {} keywords, Telegram {}",
                config.target_domains,
                config.max_threads,
                config.keyword_source.as_str(),
                if config.send_telegram { "on" } else { "off" },
            ),
            None,
        );
        tracing::info!(attempt = self.attempt, "Issuing start request");

        let gateway = self.gateway.clone();
        let events = self.events.clone();
        let attempt = self.attempt;
        tokio::spawn(async move {
            let result = gateway.start_task(&config).await;
            let _ = events.send(TaskEvent::Started { attempt, result });
        });
        Ok(())
    }

    /// 请求取消当前任务；状态变化只由后续轮询观察到
    pub fn cancel(&mut self) -> Result<(), ConsoleError> {
        if self.state.status != TaskStatus::Running || !self.controls.cancel_enabled {
            return Err(ConsoleError::NoActiveTask);
        }
        let Some(task_id) = self.state.task_id.clone() else {
            return Err(ConsoleError::NoActiveTask);
        };

        self.controls.cancel_enabled = false;
        self.log_line(&format!("Requesting cancellation of task {}...", task_id), None);
        tracing::info!(task_id = %task_id, "Issuing cancel request");

        let gateway = self.gateway.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = gateway.cancel_task(&task_id).await;
            let _ = events.send(TaskEvent::CancelResolved { task_id, result });
        });
        Ok(())
    }

    /// 下载当前结果集中的文件到 dir
    pub fn download(&mut self, filename: &str, dir: &Path) -> Result<(), ConsoleError> {
        if let Err(err) = self.check_downloadable(filename) {
            self.fail(err.clone());
            return Err(err);
        }

        let gateway = self.gateway.clone();
        let events = self.events.clone();
        let filename = filename.to_string();
        let dir = dir.to_path_buf();
        tokio::spawn(async move {
            let result = fetch_to_dir(gateway.as_ref(), &filename, &dir).await;
            let _ = events.send(TaskEvent::Downloaded { filename, result });
        });
        Ok(())
    }

    fn check_downloadable(&self, filename: &str) -> Result<(), ConsoleError> {
        let unsafe_name = filename.trim().is_empty()
            || filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\');
        if unsafe_name {
            return Err(ConsoleError::Download(format!(
                "Invalid file name: {:?}",
                filename
            )));
        }
        if !self.state.result_files.iter().any(|f| f.name == filename) {
            return Err(ConsoleError::Download(format!(
                "{} is not in the current result set",
                filename
            )));
        }
        Ok(())
    }

    /// 显式重置：停止轮询并丢弃整个 TaskState
    pub fn teardown(&mut self) {
        self.poller.stop();
        self.attempt += 1;
        self.poll_failures = 0;
        self.repeats.clear();
        self.state = TaskState::default();
        self.controls = TaskControls::idle();
        tracing::info!("Task session reset");
    }

    /// 应用一个异步结果
    pub fn handle(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Started { attempt, result } => self.on_started(attempt, result),
            TaskEvent::Polled { task_id, result } => self.on_polled(task_id, result),
            TaskEvent::CancelResolved { task_id, result } => {
                self.on_cancel_resolved(task_id, result)
            }
            TaskEvent::Downloaded { filename, result } => self.on_downloaded(filename, result),
        }
    }

    fn on_started(&mut self, attempt: u64, result: Result<StartedTask, ApiError>) {
        if attempt != self.attempt || self.state.status != TaskStatus::Starting {
            tracing::debug!(attempt, "Dropping stale start result");
            return;
        }
        match result {
            Ok(started) => {
                let task_id = started.task_id;
                tracing::info!(task_id = %task_id, "Task accepted by server");
                self.state.task_id = Some(task_id.clone());
                self.state.status = TaskStatus::Running;
                self.controls = TaskControls::running();
                self.log_line(&format!("Task {} started.", task_id), None);
                self.poller.start(
                    self.gateway.clone(),
                    task_id,
                    self.interval,
                    self.events.clone(),
                    self.token.child_token(),
                );
            }
            Err(e) => self.fail(ConsoleError::StartFailure(e)),
        }
    }

    fn on_polled(&mut self, task_id: TaskId, result: Result<TaskStatusReport, ApiError>) {
        if self.state.task_id.as_ref() != Some(&task_id) {
            tracing::debug!(task_id = %task_id, "Dropping stale poll result");
            return;
        }
        match result {
            Ok(report) => {
                self.state.progress = clamp_progress(report.progress);
                for line in &report.log {
                    self.state.log.append(line, None);
                }
                if let Some(terminal) = report.terminal() {
                    self.finish(task_id, terminal, report.result_files);
                }
            }
            Err(e) if e.is_not_found() => self.fail(ConsoleError::PollNotFound(task_id, e)),
            Err(e) => self.fail(ConsoleError::PollTransient(e)),
        }
    }

    fn on_cancel_resolved(&mut self, task_id: TaskId, result: Result<String, ApiError>) {
        if self.state.task_id.as_ref() != Some(&task_id) {
            tracing::debug!(task_id = %task_id, "Cancel resolved after task left running state");
            return;
        }
        match result {
            // 取消控件保持禁用，等待轮询观察到终态
            Ok(message) => {
                tracing::info!(task_id = %task_id, "Cancel accepted: {}", message);
                if !message.trim().is_empty() {
                    self.log_line(&message, Some(Severity::Info));
                }
            }
            Err(e) => self.fail(ConsoleError::CancelFailure(e)),
        }
    }

    fn on_downloaded(&mut self, filename: String, result: Result<PathBuf, ConsoleError>) {
        match result {
            Ok(path) => {
                tracing::info!("Saved {} to {}", filename, path.display());
                self.log_line(
                    &format!("Downloaded {} to {}", filename, path.display()),
                    Some(Severity::Success),
                );
            }
            Err(err) => self.fail(err),
        }
    }

    /// 进入终态：停止轮询、记录汇总行、（完成时）展示结果文件、恢复控件；保留日志
    fn finish(&mut self, task_id: TaskId, terminal: TerminalStatus, files: Vec<String>) {
        self.poller.stop();
        self.state.status = terminal.into();
        self.state.task_id = None;
        self.controls = TaskControls::idle();

        let severity = match terminal {
            TerminalStatus::Completed => Severity::Success,
            TerminalStatus::Error => Severity::Error,
            TerminalStatus::Cancelled => Severity::Warning,
        };
        self.log_line(
            &format!(
                "Task {} finished: {}",
                task_id,
                terminal.as_str().to_uppercase()
            ),
            Some(severity),
        );

        if terminal == TerminalStatus::Completed {
            self.state.result_files = files
                .into_iter()
                .map(|name| ResultFile {
                    url: self.gateway.result_url(&name),
                    name,
                })
                .collect();
            if !self.state.result_files.is_empty() {
                self.log_line(
                    &format!(
                        "{} result file(s) ready for download.",
                        self.state.result_files.len()
                    ),
                    Some(Severity::Success),
                );
            }
        }
        tracing::info!(task_id = %task_id, "Task reached terminal status {}", terminal.as_str());
    }

    /// 在边界处处理失败：记录一行日志并按 RecoveryAction 恢复状态
    fn fail(&mut self, err: ConsoleError) {
        let (line, severity) = match &err {
            ConsoleError::PollTransient(e) => {
                self.poll_failures += 1;
                (
                    format!("Status check failed (#{}): {}; retrying", self.poll_failures, e),
                    Severity::Warning,
                )
            }
            other => (other.to_string(), Severity::Error),
        };
        tracing::warn!("{}", line);
        self.log_line(&line, Some(severity));

        match err.recovery() {
            RecoveryAction::ResetToIdle => self.reset_to_idle(),
            RecoveryAction::ReenableCancel => {
                if self.state.status == TaskStatus::Running {
                    self.controls.cancel_enabled = true;
                }
            }
            RecoveryAction::ContinuePolling
            | RecoveryAction::ReleaseChat
            | RecoveryAction::KeepState => {}
        }
    }

    /// 回到 idle：停止轮询、清除任务 ID、恢复控件（日志保留以便查看失败原因）
    fn reset_to_idle(&mut self) {
        self.poller.stop();
        self.state.task_id = None;
        self.state.status = TaskStatus::Idle;
        self.state.progress = 0.0;
        self.controls = TaskControls::idle();
    }

    fn log_line(&mut self, text: &str, severity: Option<Severity>) {
        let seen = self.repeats.entry(text.to_string()).or_insert(0);
        *seen += 1;
        if *seen == 1 {
            self.state.log.append(text, severity);
        } else {
            let numbered = format!("{} (#{})", text, seen);
            self.state.log.append(&numbered, severity);
        }
    }
}

async fn fetch_to_dir(
    gateway: &dyn ApiGateway,
    filename: &str,
    dir: &Path,
) -> Result<PathBuf, ConsoleError> {
    let bytes = gateway
        .download_result(filename)
        .await
        .map_err(|e| ConsoleError::Download(format!("{}: {}", filename, e)))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConsoleError::Download(format!("{}: {}", dir.display(), e)))?;
    let path = dir.join(filename);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ConsoleError::Download(format!("{}: {}", path.display(), e)))?;
    Ok(path)
}
