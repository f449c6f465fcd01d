//! Ayzen - 抓取任务控制台
//!
//! 模块划分：
//! - **api**: 后端网关抽象（ApiGateway）、reqwest 实现与离线 Mock、线上数据类型
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 任务会话（启动 / 轮询 / 取消）、日志聚合、对话会话、状态投影与主控循环
//! - **observability**: tracing 初始化
//! - **ui**: Ratatui TUI 界面

pub mod api;
pub mod config;
pub mod core;
pub mod observability;
pub mod ui;
