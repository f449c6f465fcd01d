//! 后端协议类型：启动配置、任务状态、取消 / 对话应答
//!
//! 字段名与服务端 JSON 保持一致（启动配置使用 kebab-case 键）。

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// 目标域名数下限
pub const MIN_TARGET_DOMAINS: u32 = 10;
/// 线程数上下限
pub const MIN_THREADS: u8 = 1;
pub const MAX_THREADS: u8 = 16;

/// 任务 ID（不透明；服务端发整数，客户端统一存为字符串）
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(n) => TaskId(n.to_string()),
            Raw::Str(s) => TaskId(s),
        })
    }
}

/// 关键词来源
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordSource {
    #[default]
    Default,
    Ai,
}

impl KeywordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordSource::Default => "default",
            KeywordSource::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "default" => Some(KeywordSource::Default),
            "ai" => Some(KeywordSource::Ai),
            _ => None,
        }
    }
}

/// 启动配置非法（在发出任何请求前拒绝）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("Target domain count must be at least {min} (got {0})", min = MIN_TARGET_DOMAINS)]
    TooFewDomains(u32),

    #[error("Max threads must be between {lo} and {hi} (got {0})", lo = MIN_THREADS, hi = MAX_THREADS)]
    ThreadsOutOfRange(u8),

    #[error("User name must not be empty")]
    EmptyUserName,
}

/// 抓取任务启动配置（POST /start_scrape 的请求体）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScrapeConfig {
    pub user_name: String,
    pub target_domains: u32,
    pub max_threads: u8,
    pub keyword_source: KeywordSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
    #[serde(default)]
    pub send_telegram: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_name: "Web User".to_string(),
            target_domains: 100,
            max_threads: 4,
            keyword_source: KeywordSource::Default,
            ai_prompt: None,
            send_telegram: false,
        }
    }
}

impl ScrapeConfig {
    /// 校验并规整：空白 prompt 丢弃；关键词来源为 default 时不携带 prompt
    pub fn validate(mut self) -> Result<Self, InvalidConfig> {
        if self.target_domains < MIN_TARGET_DOMAINS {
            return Err(InvalidConfig::TooFewDomains(self.target_domains));
        }
        if !(MIN_THREADS..=MAX_THREADS).contains(&self.max_threads) {
            return Err(InvalidConfig::ThreadsOutOfRange(self.max_threads));
        }
        self.user_name = self.user_name.trim().to_string();
        if self.user_name.is_empty() {
            return Err(InvalidConfig::EmptyUserName);
        }
        self.ai_prompt = match self.keyword_source {
            KeywordSource::Ai => self
                .ai_prompt
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            KeywordSource::Default => None,
        };
        Ok(self)
    }
}

/// POST /start_scrape 成功应答
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StartedTask {
    pub task_id: TaskId,
    #[serde(default)]
    pub message: Option<String>,
}

/// 终态（封闭集合）；其它任何状态字符串都视为进行中
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Error,
    Cancelled,
}

impl TerminalStatus {
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "completed" => Some(TerminalStatus::Completed),
            "error" => Some(TerminalStatus::Error),
            "cancelled" => Some(TerminalStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalStatus::Completed => "completed",
            TerminalStatus::Error => "error",
            TerminalStatus::Cancelled => "cancelled",
        }
    }
}

/// GET /status/{id} 应答
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(default)]
    pub result_files: Vec<String>,
}

impl TaskStatusReport {
    pub fn new(status: impl Into<String>, progress: f64) -> Self {
        Self {
            status: status.into(),
            progress,
            ..Default::default()
        }
    }

    pub fn with_log<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.result_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn terminal(&self) -> Option<TerminalStatus> {
        TerminalStatus::parse(&self.status)
    }
}

/// POST /chat 请求体
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub persona_id: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ChatReply {
    pub reply: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct CancelAck {
    #[serde(default)]
    pub message: String,
}

/// GET /health 应答
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
