//! 状态投影：UiState
//!
//! 控制器持有完整内部状态；UI 只拿到可直接渲染的轻量投影（进度取整、控件可用性、日志与对话快照）。

use serde::Serialize;

use crate::api::TaskId;
use crate::core::chat::ChatMessage;
use crate::core::log::LogEntry;
use crate::core::task::{ResultFile, TaskControls, TaskStatus};

/// UI 看到的「投影」状态
#[derive(Clone, Debug, Default, Serialize)]
pub struct UiState {
    pub task: TaskView,
    pub chat: ChatView,
}

/// 任务面板
#[derive(Clone, Debug, Serialize)]
pub struct TaskView {
    pub status: TaskStatus,
    pub task_id: Option<TaskId>,
    /// 展示用整数百分比
    pub progress: u8,
    pub log: Vec<LogEntry>,
    pub result_files: Vec<ResultFile>,
    pub controls: TaskControls,
}

impl Default for TaskView {
    fn default() -> Self {
        Self {
            status: TaskStatus::Idle,
            task_id: None,
            progress: 0,
            log: Vec::new(),
            result_files: Vec::new(),
            controls: TaskControls::idle(),
        }
    }
}

/// 对话面板
#[derive(Clone, Debug, Default, Serialize)]
pub struct ChatView {
    pub open: bool,
    pub persona_id: String,
    pub persona_label: String,
    pub history: Vec<ChatMessage>,
    pub pending: bool,
    /// 输入框 / 发送按钮是否可用（等待回复期间禁用）
    pub input_enabled: bool,
}
