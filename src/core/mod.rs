//! 核心编排层：进度、日志聚合、轮询、任务与对话控制器、错误与恢复、状态投影、会话监管、主控循环

pub mod chat;
pub mod error;
pub mod log;
pub mod orchestrator;
pub mod persona;
pub mod poller;
pub mod progress;
pub mod session_supervisor;
pub mod state;
pub mod task;

pub use chat::{ChatEvent, ChatMessage, ChatRole, ChatSession};
pub use error::{ConsoleError, RecoveryAction};
pub use log::{LogAggregator, LogEntry, Severity};
pub use orchestrator::{build_gateway, create_console, spawn_console, Command};
pub use poller::Poller;
pub use session_supervisor::SessionSupervisor;
pub use state::{ChatView, TaskView, UiState};
pub use task::{ResultFile, TaskControls, TaskEvent, TaskSession, TaskState, TaskStatus};
