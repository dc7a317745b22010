// ShellSync - SSH/SFTP 单文件同步工具
// 应用入口

use std::process::ExitCode;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{error, info};

mod constants;
mod error;
mod models;
mod services;
mod ssh;
mod transfer;

use constants::EXIT_DELAY_SECS;
use transfer::{format_duration, ConsoleReporter};

fn main() -> ExitCode {
    // 初始化日志系统
    // 可以通过 RUST_LOG 环境变量控制日志级别，例如：RUST_LOG=debug cargo run
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false) // 不显示 target（模块路径）
        .init();

    // 配置只加载一次，之后显式传递
    let config = match services::config::load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::thread::sleep(Duration::from_secs(EXIT_DELAY_SECS));
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("sync-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let started = Instant::now();
    println!("{}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let mut reporter = ConsoleReporter;
    let result = runtime.block_on(transfer::run(&config, &mut reporter));

    match result {
        Ok(report) => {
            info!(
                "[Transfer] Done, {} bytes at {}/s",
                report.bytes,
                transfer::humanize(report.speed_bytes_per_sec())
            );
            println!(
                "end={},cost={}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                format_duration(started.elapsed())
            );
            std::thread::sleep(Duration::from_secs(EXIT_DELAY_SECS));
            ExitCode::SUCCESS
        }
        Err(e) => {
            // 单次运行不重试，只提示是否可能是临时故障
            if e.is_transient() {
                error!("[{:?}] {} (transient, may succeed on a later run)", e.kind(), e);
            } else {
                error!("[{:?}] {}", e.kind(), e);
            }
            ExitCode::FAILURE
        }
    }
}
