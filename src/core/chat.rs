//! 对话会话管理：历史、人设选择、单飞发送
//!
//! 同一时刻最多一个在途请求（pending）。用户消息在请求前立即追加且不会撤回；
//! 回复用发送时的人设署名。请求任务持有 ReplyGuard，无论成功、失败还是被中途丢弃都会回报一次，
//! 因此 pending 总会被释放。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ApiGateway};
use crate::core::error::{ConsoleError, RecoveryAction};
use crate::core::persona;
use crate::core::state::ChatView;

/// 用户消息的署名
pub const USER_SENDER: &str = "You";
const SYSTEM_SENDER: &str = "System";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
    pub role: ChatRole,
}

impl ChatMessage {
    fn user(text: &str) -> Self {
        Self {
            sender: USER_SENDER.to_string(),
            text: text.to_string(),
            role: ChatRole::User,
        }
    }

    fn assistant(persona_id: &str, text: String) -> Self {
        Self {
            sender: persona::label(persona_id).to_string(),
            text,
            role: ChatRole::Assistant,
        }
    }

    fn system(text: String) -> Self {
        Self {
            sender: SYSTEM_SENDER.to_string(),
            text,
            role: ChatRole::System,
        }
    }
}

#[derive(Debug)]
pub enum ChatEvent {
    /// persona_id 为发送时选中的人设
    Reply {
        persona_id: String,
        result: Result<String, ApiError>,
    },
}

/// 保证请求任务恰好回报一次
struct ReplyGuard {
    persona_id: Option<String>,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl ReplyGuard {
    fn report(mut self, result: Result<String, ApiError>) {
        if let Some(persona_id) = self.persona_id.take() {
            let _ = self.events.send(ChatEvent::Reply { persona_id, result });
        }
    }
}

impl Drop for ReplyGuard {
    fn drop(&mut self) {
        if let Some(persona_id) = self.persona_id.take() {
            tracing::warn!("Chat request dropped before completion");
            let _ = self.events.send(ChatEvent::Reply {
                persona_id,
                result: Err(ApiError::Transport(
                    "Chat request was interrupted".to_string(),
                )),
            });
        }
    }
}

/// 对话控制器（ChatState 的唯一持有者）
pub struct ChatSession {
    gateway: Arc<dyn ApiGateway>,
    events: mpsc::UnboundedSender<ChatEvent>,
    token: CancellationToken,
    open: bool,
    persona_id: String,
    history: Vec<ChatMessage>,
    pending: bool,
}

impl ChatSession {
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        default_persona: &str,
        token: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                gateway,
                events,
                token,
                open: false,
                persona_id: default_persona.to_string(),
                history: Vec::new(),
                pending: false,
            },
            rx,
        )
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn persona_id(&self) -> &str {
        &self.persona_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// 打开面板；首次打开且历史为空时由默认人设发一条问候
    pub fn open(&mut self) {
        self.open = true;
        if self.history.is_empty() {
            let greeting = format!(
                "Hi! I'm {}. Ask me anything about your scraping tasks.",
                persona::DEFAULT_PERSONA_LABEL
            );
            self.history
                .push(ChatMessage::assistant(persona::DEFAULT_PERSONA_ID, greeting));
        }
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn toggle(&mut self) {
        if self.open {
            self.close();
        } else {
            self.open();
        }
    }

    /// 仅改变后续发送使用的人设
    pub fn select_persona(&mut self, persona_id: &str) {
        tracing::debug!("Persona selected: {}", persona::label(persona_id));
        self.persona_id = persona_id.to_string();
    }

    /// 发送一条消息；空白文本或已有在途请求时为 no-op，返回是否真正发出
    pub fn send(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.pending {
            return false;
        }

        self.history.push(ChatMessage::user(text));
        self.pending = true;
        tracing::info!(persona = %self.persona_id, "Sending chat message");

        let guard = ReplyGuard {
            persona_id: Some(self.persona_id.clone()),
            events: self.events.clone(),
        };
        let gateway = self.gateway.clone();
        let token = self.token.clone();
        let text = text.to_string();
        let persona_id = self.persona_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                // 关停时 guard 被丢弃，自行回报中断
                _ = token.cancelled() => {}
                result = gateway.send_chat_message(&text, &persona_id) => guard.report(result),
            }
        });
        true
    }

    pub fn handle(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Reply { persona_id, result } => self.on_reply(persona_id, result),
        }
    }

    fn on_reply(&mut self, persona_id: String, result: Result<String, ApiError>) {
        match result {
            Ok(reply) => {
                tracing::info!(persona = %persona_id, "Chat reply received");
                self.history.push(ChatMessage::assistant(&persona_id, reply));
                self.pending = false;
            }
            Err(e) => self.fail(ConsoleError::ChatFailure(e)),
        }
    }

    /// 失败时追加一条 System 记录，并按 RecoveryAction 恢复
    fn fail(&mut self, err: ConsoleError) {
        tracing::warn!("{}", err);
        let reason = match &err {
            ConsoleError::ChatFailure(e) => e.to_string(),
            other => other.to_string(),
        };
        self.history.push(ChatMessage::system(format!("Error: {}", reason)));
        match err.recovery() {
            RecoveryAction::ReleaseChat => self.pending = false,
            RecoveryAction::ResetToIdle
            | RecoveryAction::ContinuePolling
            | RecoveryAction::ReenableCancel
            | RecoveryAction::KeepState => {}
        }
    }

    pub fn view(&self) -> ChatView {
        ChatView {
            open: self.open,
            persona_id: self.persona_id.clone(),
            persona_label: persona::label(&self.persona_id).to_string(),
            history: self.history.clone(),
            pending: self.pending,
            input_enabled: !self.pending,
        }
    }
}
