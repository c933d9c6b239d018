//! Weave - 文本内嵌工具调用的对话编排
//!
//! 入口：初始化日志、加载配置、构建运行时并启动会话清理，然后在 stdin/stdout 上运行对话循环。
//! 命令：/clear 清空对话历史，/quit 退出；Ctrl+C 中断当前回合，空闲时 Ctrl+C 退出。

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use weave::config::{load_config, AppConfig};
use weave::core::{Bootstrap, RuntimeBuilder, Supervisor};
use weave::{observability, Conversation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    // 可选参数：额外的配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config ({}), using defaults", e);
        AppConfig::default()
    });

    let bootstrap = Bootstrap::new(RuntimeBuilder::new(cfg));
    let runtime = bootstrap.runtime();
    let mut supervisor = Supervisor::start(
        runtime.sessions.clone(),
        Duration::from_secs(runtime.config.agents.cleanup_interval_secs),
    );

    let name = runtime
        .config
        .app
        .name
        .clone()
        .unwrap_or_else(|| "weave".to_string());
    let mut conversation = Conversation::new(runtime.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await.context("Failed to write prompt")?;
        stdout.flush().await.context("Failed to flush stdout")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                conversation.clear();
                stdout.write_all(b"(history cleared)\n").await?;
                continue;
            }
            _ => {}
        }

        let reply = tokio::select! {
            turn = conversation.send(input) => turn.text,
            _ = tokio::signal::ctrl_c() => "(interrupted)".to_string(),
        };
        stdout
            .write_all(format!("{}: {}\n", name, reply).as_bytes())
            .await
            .context("Failed to write reply")?;
    }

    supervisor.shutdown().await;
    tracing::info!("Bye");
    Ok(())
}
