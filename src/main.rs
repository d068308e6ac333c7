//! feedflow - Interaction orchestration for content feeds
//!
//! Command-line entry point: replays scripted feed sessions against the
//! controllers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

use feedflow::config::Config;
use feedflow::replay::{self, ReplayScript};
use feedflow::telemetry::init_tracing;

/// feedflow - Interaction orchestration for content feeds
#[derive(Parser, Debug)]
#[command(name = "feedflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "FEEDFLOW_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scripted session and print a summary
    Replay {
        /// Path to the YAML script
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Initialize tracing/logging
    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting feedflow"
    );

    match args.command {
        Command::Replay { script } => {
            let script = ReplayScript::from_file(&script)?;

            let report = tokio::select! {
                report = replay::run(&script, &config) => report?,
                _ = shutdown_signal() => {
                    warn!("Replay interrupted");
                    return Ok(());
                }
            };

            print!("{}", serde_yaml::to_string(&report)?);
        }
    }

    Ok(())
}

/// Load configuration from file or environment variables
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping replay");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping replay");
        }
    }
}
