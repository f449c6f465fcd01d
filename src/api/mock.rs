//! Mock 网关（用于测试与离线演示，无需后端）
//!
//! 各操作按脚本队列依次返回；状态查询脚本耗尽后重复最后一个结果。
//! 完全未编排状态脚本时模拟一次抓取：每次查询前进 25%，到 100% 时完成并给出一个结果文件。
//! 对话回复可用 gate_chat 挂起，直到测试方放行。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::error::ApiError;
use super::types::{HealthStatus, ScrapeConfig, StartedTask, TaskId, TaskStatusReport};
use super::ApiGateway;

/// 模拟抓取完成时给出的结果文件名
pub const MOCK_RESULT_FILE: &str = "ayzen_contacts_mock.csv";

type Scripted<T> = Mutex<VecDeque<Result<T, ApiError>>>;

#[derive(Default)]
pub struct MockGateway {
    start: Scripted<StartedTask>,
    status: Scripted<TaskStatusReport>,
    last_status: Mutex<Option<Result<TaskStatusReport, ApiError>>>,
    cancel: Scripted<String>,
    chat: Scripted<String>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    chat_gate: Mutex<Option<Arc<Notify>>>,
    started: Mutex<Vec<ScrapeConfig>>,
    chats: Mutex<Vec<(String, String)>>,
    status_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    simulated_polls: AtomicUsize,
    next_id: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_start(&self, result: Result<StartedTask, ApiError>) -> &Self {
        lock(&self.start).push_back(result);
        self
    }

    /// 便捷：下一次启动返回给定任务 ID
    pub fn push_started(&self, task_id: &str) -> &Self {
        self.push_start(Ok(StartedTask {
            task_id: TaskId::from(task_id),
            message: Some("Scraping process initiated".to_string()),
        }))
    }

    pub fn push_status(&self, result: Result<TaskStatusReport, ApiError>) -> &Self {
        lock(&self.status).push_back(result);
        self
    }

    pub fn push_cancel(&self, result: Result<String, ApiError>) -> &Self {
        lock(&self.cancel).push_back(result);
        self
    }

    pub fn push_chat(&self, result: Result<String, ApiError>) -> &Self {
        lock(&self.chat).push_back(result);
        self
    }

    pub fn add_file(&self, name: &str, content: &[u8]) -> &Self {
        lock(&self.files).insert(name.to_string(), content.to_vec());
        self
    }

    /// 之后的对话请求在返回前等待放行（notify_one 放行一个）
    pub fn gate_chat(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.chat_gate) = Some(gate.clone());
        gate
    }

    pub fn start_calls(&self) -> usize {
        lock(&self.started).len()
    }

    pub fn started_configs(&self) -> Vec<ScrapeConfig> {
        lock(&self.started).clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// 已收到的对话请求：(text, persona_id)
    pub fn chat_calls(&self) -> Vec<(String, String)> {
        lock(&self.chats).clone()
    }

    fn simulate_status(&self) -> TaskStatusReport {
        let n = self.simulated_polls.fetch_add(1, Ordering::SeqCst) + 1;
        let progress = (n * 25).min(100) as f64;
        let ts = chrono::Local::now().format("%H:%M:%S");
        if progress >= 100.0 {
            TaskStatusReport::new("completed", 100.0)
                .with_log([format!("[{}] Finished OK. Contacts: 42.", ts)])
                .with_files([MOCK_RESULT_FILE])
        } else {
            TaskStatusReport::new("running", progress)
                .with_log([format!("[{}] Mock phase {}/4 in progress...", ts, n)])
        }
    }
}

#[async_trait]
impl ApiGateway for MockGateway {
    async fn start_task(&self, config: &ScrapeConfig) -> Result<StartedTask, ApiError> {
        lock(&self.started).push(config.clone());
        self.simulated_polls.store(0, Ordering::SeqCst);
        if let Some(result) = lock(&self.start).pop_front() {
            return result;
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StartedTask {
            task_id: TaskId::new(format!("mock-{}", n)),
            message: Some("Scraping process initiated".to_string()),
        })
    }

    async fn get_status(&self, _task_id: &TaskId) -> Result<TaskStatusReport, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = lock(&self.status).pop_front();
        let mut last = lock(&self.last_status);
        match scripted {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => match last.as_ref() {
                Some(result) => result.clone(),
                None => Ok(self.simulate_status()),
            },
        }
    }

    async fn cancel_task(&self, _task_id: &TaskId) -> Result<String, ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.cancel)
            .pop_front()
            .unwrap_or_else(|| Ok("Cancellation signal sent.".to_string()))
    }

    async fn send_chat_message(&self, text: &str, persona_id: &str) -> Result<String, ApiError> {
        lock(&self.chats).push((text.to_string(), persona_id.to_string()));
        let gate = lock(&self.chat_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        lock(&self.chat)
            .pop_front()
            .unwrap_or_else(|| Ok(format!("Echo from Mock: {}", text)))
    }

    async fn download_result(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        if let Some(content) = lock(&self.files).get(filename) {
            return Ok(content.clone());
        }
        if filename == MOCK_RESULT_FILE {
            return Ok(b"name,email,phone\n".to_vec());
        }
        Err(ApiError::NotFound(
            "Result file not found or access denied.".to_string(),
        ))
    }

    fn result_url(&self, filename: &str) -> String {
        format!("mock://results/{}", filename)
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        Ok(HealthStatus {
            status: "ok".to_string(),
            timestamp: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_script_repeats_last() {
        let mock = MockGateway::new();
        mock.push_status(Ok(TaskStatusReport::new("running", 10.0)));
        mock.push_status(Err(ApiError::NotFound("gone".into())));

        let id = TaskId::from("1");
        assert_eq!(mock.get_status(&id).await.unwrap().progress, 10.0);
        assert!(mock.get_status(&id).await.unwrap_err().is_not_found());
        assert!(mock.get_status(&id).await.unwrap_err().is_not_found());
        assert_eq!(mock.status_calls(), 3);
    }

    #[tokio::test]
    async fn test_simulated_run_completes() {
        let mock = MockGateway::new();
        let started = mock.start_task(&ScrapeConfig::default()).await.unwrap();
        let mut last = None;
        for _ in 0..4 {
            last = Some(mock.get_status(&started.task_id).await.unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.status, "completed");
        assert_eq!(last.result_files, vec![MOCK_RESULT_FILE.to_string()]);
    }

    #[tokio::test]
    async fn test_chat_defaults_to_echo() {
        let mock = MockGateway::new();
        let reply = mock.send_chat_message("hi", "2").await.unwrap();
        assert_eq!(reply, "Echo from Mock: hi");
        assert_eq!(mock.chat_calls(), vec![("hi".to_string(), "2".to_string())]);
    }
}
