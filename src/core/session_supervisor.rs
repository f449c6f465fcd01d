//! 会话监管：控制台会话标识与统一关停
//!
//! 持有根 CancellationToken；轮询 worker 与在途请求各持有子 token，退出时一次取消全部。

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 控制台会话的生命周期：会话 ID 与根取消令牌
#[derive(Debug)]
pub struct SessionSupervisor {
    session_id: Uuid,
    cancel_token: CancellationToken,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// 本次控制台会话 ID（记录在 tracing span 上）
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// 子 token（单个轮询 worker / 请求）；根 token 取消时一并取消
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }

    /// 关停会话（退出时），可重复调用
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_cancels_children() {
        let supervisor = SessionSupervisor::new();
        let child = supervisor.child_token();
        assert!(!child.is_cancelled());
        supervisor.shutdown();
        supervisor.shutdown();
        assert!(child.is_cancelled());
        assert!(supervisor.is_shut_down());
    }

    #[test]
    fn test_child_cancel_is_local() {
        let supervisor = SessionSupervisor::new();
        let a = supervisor.child_token();
        let b = supervisor.child_token();
        a.cancel();
        assert!(!b.is_cancelled());
        assert!(!supervisor.is_shut_down());
    }
}
