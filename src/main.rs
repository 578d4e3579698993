//! Hive - Rust 多智能体编排层
//!
//! 入口：初始化日志、装配编排器，并运行 stdin REPL 主循环。

use std::io::Write;

use anyhow::Context;
use hive::config::{load_config, AppConfig};
use hive::core::Orchestrator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn print_prompt() {
    print!("你: ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志级别默认 info，RUST_LOG 可调
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let app_name = cfg.app.name.clone().unwrap_or_else(|| "Hive".to_string());

    let orchestrator = Orchestrator::new(&cfg).context("Failed to assemble orchestrator")?;

    println!("{} 已就绪。输入内容开始对话，/quit 退出。", app_name);
    print_prompt();

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    while let Some(line) = lines.next_line().await.context("stdin read failed")? {
        let input = line.trim();
        if input.is_empty() {
            print_prompt();
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }

        // 单条输入失败不结束会话
        match orchestrator.handle(input).await {
            Ok(reply) => println!("{}: {}\n", app_name, reply),
            Err(e) => eprintln!("[error] {}\n", e),
        }
        print_prompt();
    }

    let (prompt, completion, total) = orchestrator.token_usage();
    println!(
        "再见。Token 用量：prompt {} / completion {} / total {}",
        prompt, completion, total
    );
    Ok(())
}
