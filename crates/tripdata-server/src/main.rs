use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tripdata_config::RuntimeConfig;

/// HTTP server answering time-ordered trip queries over monthly parquet partitions
#[derive(Parser)]
#[command(name = "tripdata")]
#[command(version)]
#[command(about = "HTTP server for querying historical trip records", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Local directory for downloaded partition files
    #[arg(short = 'd', long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // CLI overrides take the highest priority.
    if let Some(port) = cli.port {
        config.server.listen_addr = format!("0.0.0.0:{port}");
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = dir.to_string_lossy().to_string();
    }
    if let Some(level) = &cli.log_level {
        config.server.log_level = level.clone();
    }

    config.validate().context("Invalid configuration")?;

    tripdata_server::run_with_config(config).await
}
