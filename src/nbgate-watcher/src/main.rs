//! nbgate watcher binary.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use nbgate_common::setup_logging;
use nbgate_watcher::{FileWatcher, WatcherConfig};

/// Commits notebook changes to the portal
#[derive(Parser)]
#[command(name = "nbgate-watcher")]
#[command(about = "Polls the notebook file and commits every change to the portal")]
#[command(version)]
struct Args {
    /// File to watch (overrides WATCH_FILE)
    #[arg(short, long)]
    watch_file: Option<String>,

    /// Token broker URL (overrides NBGATE_AUTH_PROXY_URL)
    #[arg(long)]
    auth_proxy_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let mut config = WatcherConfig::from_env();
    if let Some(path) = args.watch_file {
        config.watch_file = path.into();
    }
    if let Some(url) = args.auth_proxy_url {
        config.auth_proxy_url = url;
    }

    let watcher = match FileWatcher::new(config) {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to start watcher: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
    };

    watcher.run_until(shutdown).await;

    ExitCode::SUCCESS
}
