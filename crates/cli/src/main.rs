//! # CARLA Overtake CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 日志与指标初始化
//! - 场景运行与优雅关闭
//! - 固定场景布局的打印

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_describe, run_scenario};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Metrics exporter is started by `run`, only logging here
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: observability::level_from_verbosity(cli.verbose, cli.quiet)
            .to_string(),
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "CARLA Overtake starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_scenario(args).await,
        Commands::Describe(args) => run_describe(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
