//! # Pupil Tracker CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - TCP 追踪服务与测试客户端
//! - 图像序列的在线 / 批处理追踪
//! - 配置验证与展示

mod cli;
mod commands;
mod error;
mod input;
mod stats;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_client, run_info, run_serve, run_track, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: cli.command.metrics_port(),
        default_log_level: cli.log_level().to_string(),
    })?;

    info!(version = env!("CARGO_PKG_VERSION"), "Pupil Tracker CLI starting");

    let result = match &cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Track(args) => run_track(args).await,
        Commands::Client(args) => run_client(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
