//! HTTP 网关：基于 reqwest 访问 Flask 后端（/api/v1）
//!
//! 不设置客户端请求超时：失败只通过请求被拒绝体现。
//! 非 2xx 响应体按 error / message 字段解析为 ApiError，连接失败统一为通用传输错误。

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::{
    CancelAck, ChatReply, ChatRequest, HealthStatus, ScrapeConfig, StartedTask, TaskId,
    TaskStatusReport,
};
use super::ApiGateway;
use crate::config::ApiSection;

/// 所有业务端点的路径前缀
pub const API_PREFIX: &str = "/api/v1";

const DEFAULT_USER_AGENT: &str = concat!("ayzen/", env!("CARGO_PKG_VERSION"));

/// reqwest 实现的网关
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Self {
        Self::with_user_agent(base_url, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(base_url: &str, user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(cfg: &ApiSection) -> Self {
        match cfg.user_agent.as_deref() {
            Some(ua) => Self::with_user_agent(&cfg.base_url, ua),
            None => Self::new(&cfg.base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// route 后追加一个经过百分号编码的路径段（任务 ID、文件名）
    fn segment_endpoint(&self, route: &str, segment: &str) -> String {
        let raw = self.endpoint(route);
        let Ok(mut url) = reqwest::Url::parse(&raw) else {
            return format!("{}/{}", raw, segment);
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url.into()
    }

    /// 发送请求；连接层错误记 debug 后转为通用传输错误
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Response, ApiError> {
        req.send().await.map_err(|e| {
            tracing::debug!("Request failed at transport level: {}", e);
            ApiError::transport()
        })
    }

    /// 非 2xx 转 ApiError，2xx 解析 JSON
    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let resp = Self::check(resp).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_response(status, &body))
    }
}

#[async_trait]
impl ApiGateway for HttpGateway {
    async fn start_task(&self, config: &ScrapeConfig) -> Result<StartedTask, ApiError> {
        let resp = self
            .send(self.client.post(self.endpoint("/start_scrape")).json(config))
            .await?;
        Self::decode(resp).await
    }

    async fn get_status(&self, task_id: &TaskId) -> Result<TaskStatusReport, ApiError> {
        let resp = self
            .send(self.client.get(self.segment_endpoint("/status", task_id.as_str())))
            .await?;
        Self::decode(resp).await
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<String, ApiError> {
        let resp = self
            .send(self.client.post(self.segment_endpoint("/cancel", task_id.as_str())))
            .await?;
        let ack: CancelAck = Self::decode(resp).await?;
        Ok(ack.message)
    }

    async fn send_chat_message(&self, text: &str, persona_id: &str) -> Result<String, ApiError> {
        let body = ChatRequest {
            message: text,
            persona_id,
        };
        let resp = self
            .send(self.client.post(self.endpoint("/chat")).json(&body))
            .await?;
        let reply: ChatReply = Self::decode(resp).await?;
        Ok(reply.reply)
    }

    async fn download_result(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.send(self.client.get(self.result_url(filename))).await?;
        let resp = Self::check(resp).await?;
        let bytes = resp.bytes().await.map_err(|e| {
            tracing::debug!("Download body read failed: {}", e);
            ApiError::transport()
        })?;
        Ok(bytes.to_vec())
    }

    fn result_url(&self, filename: &str) -> String {
        self.segment_endpoint("/results", filename)
    }

    async fn health(&self) -> Result<HealthStatus, ApiError> {
        let resp = self
            .send(self.client.get(format!("{}/health", self.base_url)))
            .await?;
        Self::decode(resp).await
    }
}
