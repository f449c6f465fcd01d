//! 控制台错误类型与恢复动作
//!
//! 每个失败都在发现它的控制器边界内处理，不向外传播；RecoveryAction 描述处理后的状态恢复方式。

use thiserror::Error;

use crate::api::{ApiError, InvalidConfig, TaskId};

/// 任务 / 对话控制器可能遇到的失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// 请求发出前被拒绝的配置
    #[error("Invalid configuration: {0}")]
    Validation(#[from] InvalidConfig),

    #[error("Failed to start task: {0}")]
    StartFailure(ApiError),

    /// 轮询时任务已不存在：对当前任务是致命的
    #[error("Task {0} not found on server: {1}")]
    PollNotFound(TaskId, ApiError),

    /// 其它轮询失败：告警后继续轮询
    #[error("Status check failed: {0}")]
    PollTransient(ApiError),

    #[error("Cancel request failed: {0}")]
    CancelFailure(ApiError),

    #[error("Chat request failed: {0}")]
    ChatFailure(ApiError),

    #[error("Download failed: {0}")]
    Download(String),

    /// 已有任务在启动或运行中（启动控件处于禁用状态）
    #[error("A task is already starting or running")]
    TaskBusy,

    #[error("No running task to cancel")]
    NoActiveTask,
}

/// 失败处理后的恢复方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 停止轮询、清除任务 ID、恢复全部控件
    ResetToIdle,
    /// 保持运行，等下一次定时轮询
    ContinuePolling,
    /// 重新启用取消控件
    ReenableCancel,
    /// 释放对话发送锁并重新启用输入
    ReleaseChat,
    /// 状态不变（仅记录）
    KeepState,
}

impl ConsoleError {
    pub fn recovery(&self) -> RecoveryAction {
        match self {
            ConsoleError::StartFailure(_) | ConsoleError::PollNotFound(..) => {
                RecoveryAction::ResetToIdle
            }
            ConsoleError::PollTransient(_) => RecoveryAction::ContinuePolling,
            ConsoleError::CancelFailure(_) => RecoveryAction::ReenableCancel,
            ConsoleError::ChatFailure(_) => RecoveryAction::ReleaseChat,
            ConsoleError::Validation(_)
            | ConsoleError::Download(_)
            | ConsoleError::TaskBusy
            | ConsoleError::NoActiveTask => RecoveryAction::KeepState,
        }
    }
}
