//! 状态轮询 worker
//!
//! 任务进入 running 后启动：立即查询一次，之后按固定间隔查询；查询严格串行（上一次返回后才可能发起下一次）。
//! 结果带上任务 ID 发回控制器，由控制器校验是否仍属于当前任务。停止通过取消 token 完成，可重复调用。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiGateway, TaskId};
use crate::core::task::TaskEvent;

struct ActivePoll {
    task_id: TaskId,
    token: CancellationToken,
}

/// 轮询定时器句柄（由任务控制器独占）
#[derive(Default)]
pub struct Poller {
    active: Option<ActivePoll>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 task_id 启动轮询；已有 worker 时先停止
    pub fn start(
        &mut self,
        gateway: Arc<dyn ApiGateway>,
        task_id: TaskId,
        interval: Duration,
        events: mpsc::UnboundedSender<TaskEvent>,
        token: CancellationToken,
    ) {
        self.stop();
        tracing::debug!(task_id = %task_id, "Starting poll worker ({:?} interval)", interval);
        tokio::spawn(poll_loop(
            gateway,
            task_id.clone(),
            interval,
            events,
            token.clone(),
        ));
        self.active = Some(ActivePoll { task_id, token });
    }

    /// 停止轮询；未在轮询时为 no-op。返回是否确实停止了一个 worker
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.token.cancel();
                tracing::debug!(task_id = %active.task_id, "Poll worker cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.active.as_ref().map(|a| &a.task_id)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    gateway: Arc<dyn ApiGateway>,
    task_id: TaskId,
    interval: Duration,
    events: mpsc::UnboundedSender<TaskEvent>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // 第一次 tick 立即完成 => 立即首查
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            r = gateway.get_status(&task_id) => r,
        };
        let event = TaskEvent::Polled {
            task_id: task_id.clone(),
            result,
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockGateway, TaskStatusReport};

    #[tokio::test]
    async fn test_polls_immediately_then_repeats() {
        let mock = Arc::new(MockGateway::new());
        mock.push_status(Ok(TaskStatusReport::new("running", 10.0)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new();
        poller.start(
            mock.clone(),
            TaskId::from("T1"),
            Duration::from_millis(10),
            tx,
            CancellationToken::new(),
        );
        assert_eq!(poller.task_id(), Some(&TaskId::from("T1")));

        for _ in 0..3 {
            match rx.recv().await {
                Some(TaskEvent::Polled { task_id, result }) => {
                    assert_eq!(task_id.as_str(), "T1");
                    assert_eq!(result.unwrap().progress, 10.0);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert!(poller.stop());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_final() {
        let mock = Arc::new(MockGateway::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut poller = Poller::new();
        assert!(!poller.stop());

        poller.start(
            mock.clone(),
            TaskId::from("T1"),
            Duration::from_millis(5),
            tx,
            CancellationToken::new(),
        );
        assert!(rx.recv().await.is_some());
        assert!(poller.stop());
        assert!(!poller.stop());
        assert!(!poller.is_active());

        // 停止前可能已有一条在途结果，排空后不应再有新查询
        tokio::time::sleep(Duration::from_millis(30)).await;
        while rx.try_recv().is_ok() {}
        let calls = mock.status_calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(mock.status_calls(), calls);
    }

    #[tokio::test]
    async fn test_parent_token_stops_worker() {
        let mock = Arc::new(MockGateway::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let parent = CancellationToken::new();
        let mut poller = Poller::new();
        poller.start(
            mock,
            TaskId::from("T1"),
            Duration::from_millis(5),
            tx,
            parent.child_token(),
        );
        assert!(rx.recv().await.is_some());
        parent.cancel();
        // worker 退出后发送端被丢弃，通道最终关闭
        while rx.recv().await.is_some() {}
    }
}
