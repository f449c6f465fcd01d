//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AYZEN__*` 覆盖（双下划线表示嵌套，如 `AYZEN__API__BASE_URL=http://host:5001`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::api::{KeywordSource, ScrapeConfig};

/// 轮询间隔下限（毫秒）
const MIN_POLL_INTERVAL_MS: u64 = 100;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub api: ApiSection,
    pub polling: PollingSection,
    pub task: TaskSection,
    pub chat: ChatSection,
}

/// [app] 段：应用名、结果文件下载目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            download_dir: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// [api] 段：后端地址
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub user_agent: Option<String>,
    /// 为 true 时使用内置 Mock 网关（离线演示）
    #[serde(default)]
    pub mock: bool,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: None,
            mock: false,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

/// [polling] 段：状态轮询间隔（固定节奏，无重试上限）
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollingSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

fn default_interval_ms() -> u64 {
    2000
}

/// [task] 段：启动表单默认值
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSection {
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_target_domains")]
    pub target_domains: u32,
    #[serde(default = "default_max_threads")]
    pub max_threads: u8,
    #[serde(default)]
    pub keyword_source: KeywordSource,
    pub ai_prompt: Option<String>,
    #[serde(default)]
    pub send_telegram: bool,
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            user_name: default_user_name(),
            target_domains: default_target_domains(),
            max_threads: default_max_threads(),
            keyword_source: KeywordSource::Default,
            ai_prompt: None,
            send_telegram: false,
        }
    }
}

impl TaskSection {
    /// 表单初始值（未校验）
    pub fn scrape_config(&self) -> ScrapeConfig {
        ScrapeConfig {
            user_name: self.user_name.clone(),
            target_domains: self.target_domains,
            max_threads: self.max_threads,
            keyword_source: self.keyword_source,
            ai_prompt: self.ai_prompt.clone(),
            send_telegram: self.send_telegram,
        }
    }
}

fn default_user_name() -> String {
    "Web User".to_string()
}

fn default_target_domains() -> u32 {
    100
}

fn default_max_threads() -> u8 {
    4
}

/// [chat] 段：默认人设
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_persona")]
    pub default_persona: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            default_persona: default_persona(),
        }
    }
}

fn default_persona() -> String {
    "default".to_string()
}

/// 从 config 目录加载配置，环境变量 AYZEN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AYZEN__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AYZEN")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 加载配置；失败时记录告警并回退到默认值
pub fn load_config_or_default(config_path: Option<PathBuf>) -> AppConfig {
    load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    })
}
