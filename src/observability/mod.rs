//! 可观测性：tracing 订阅器
//!
//! TUI 占用 stdout，日志写到 stderr（可用 `2>ayzen.log` 重定向）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .init();
}
