//! 后端网关抽象
//!
//! 控制器只通过 ApiGateway 访问后端：HttpGateway（reqwest）用于真实服务，MockGateway 用于测试与离线演示。

use async_trait::async_trait;

use super::error::ApiError;
use super::types::{HealthStatus, ScrapeConfig, StartedTask, TaskId, TaskStatusReport};

/// 后端网关：启动 / 查询 / 取消任务，助手对话，结果下载
#[async_trait]
pub trait ApiGateway: Send + Sync {
    /// 启动抓取任务，返回服务端分配的任务 ID
    async fn start_task(&self, config: &ScrapeConfig) -> Result<StartedTask, ApiError>;

    /// 查询任务状态；任务不存在时返回 ApiError::NotFound
    async fn get_status(&self, task_id: &TaskId) -> Result<TaskStatusReport, ApiError>;

    /// 请求取消（尽力而为：成功只表示请求被接受），返回服务端说明文字
    async fn cancel_task(&self, task_id: &TaskId) -> Result<String, ApiError>;

    /// 发送一条对话消息，返回助手回复
    async fn send_chat_message(&self, text: &str, persona_id: &str) -> Result<String, ApiError>;

    /// 下载结果文件内容
    async fn download_result(&self, filename: &str) -> Result<Vec<u8>, ApiError>;

    /// 结果文件的下载地址（用于展示）
    fn result_url(&self, filename: &str) -> String;

    /// 后端健康检查
    async fn health(&self) -> Result<HealthStatus, ApiError>;
}
