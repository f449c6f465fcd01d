//! 网关错误类型与错误信息解析
//!
//! 四个后端调用失败时统一表现为 ApiError；面向用户的文字按优先级解析：
//! 服务端结构化字段（error / message） > HTTP 状态文本 > 通用网络失败文本。

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// 无法连上服务端时展示的通用文本
pub const TRANSPORT_FAILURE: &str = "Failed to reach the server";

/// 网关调用失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 任务在服务端不存在（状态查询 404），与其它失败区分
    #[error("{0}")]
    NotFound(String),

    /// 服务端返回非 2xx
    #[error("{message}")]
    Server { status: u16, message: String },

    /// 连接 / 传输层失败
    #[error("{0}")]
    Transport(String),

    /// 2xx 但响应体无法解析
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// 通用传输失败（不暴露底层细节，细节只进 tracing）
    pub fn transport() -> Self {
        ApiError::Transport(TRANSPORT_FAILURE.to_string())
    }

    /// 由非 2xx 响应构造错误；404 单独归为 NotFound
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = resolve_message(status, body);
        if status == StatusCode::NOT_FOUND {
            ApiError::NotFound(message)
        } else {
            ApiError::Server {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// 服务端错误体：Flask 端点返回 {"error": ...} 或 {"message": ...}
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// 按优先级得到可读错误文本
pub fn resolve_message(status: StatusCode, body: &str) -> String {
    let structured = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| non_blank(b.error).or_else(|| non_blank(b.message)));
    if let Some(msg) = structured {
        return msg;
    }
    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => format!("HTTP {}", status.as_u16()),
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
