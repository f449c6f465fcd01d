//! Ayzen 抓取控制台
//!
//! 入口：初始化日志、加载配置、创建编排器与 TUI，并运行主循环。
//! 用法：`ayzen [config.toml]`

use std::path::PathBuf;

use anyhow::Context;
use ayzen::{config::load_config_or_default, core::create_console, observability, ui::run_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config_or_default(config_path);

    // 创建编排器：返回命令发送端、状态接收端、后台任务句柄
    let (cmd_tx, state_rx, console) = create_console(&cfg).await;

    // 启动 TUI 主循环（消费 state，向 cmd_tx 发送用户指令）
    let result = run_app(state_rx, cmd_tx.clone(), cfg.task.scrape_config())
        .await
        .context("App run failed");

    let _ = cmd_tx.send(ayzen::core::Command::Quit);
    let _ = console.await;
    result
}
