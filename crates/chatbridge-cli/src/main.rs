mod cli;
mod setup;

use anyhow::Result;
use chatbridge_core::{BridgeConfig, BridgeController};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Init => {
            setup::ensure_files(&cli.config)?;
            info!("Bridge files ready next to {}", cli.config.display());
            Ok(())
        }
        Commands::Check => {
            let config = BridgeConfig::load(&cli.config)?;
            config.validate()?;
            setup::print_summary(&config);
            Ok(())
        }
        Commands::Run => run(&cli.config).await,
    }
}

async fn run(config_path: &Path) -> Result<()> {
    setup::ensure_files(config_path)?;

    let config = match BridgeConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            // Malformed persisted file: report and keep running on defaults
            error!("{:#}; continuing with default configuration", e);
            BridgeConfig::default()
        }
    };

    let controller = BridgeController::new(config, config_path);
    controller.start().await?;
    info!("Bridge running; Ctrl-C to stop, SIGHUP to reload");

    wait_for_shutdown(&controller).await?;
    controller.stop().await?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(controller: &BridgeController) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = hangup.recv() => {
                if let Err(e) = controller.reload() {
                    warn!("Reload failed: {:#}", e);
                }
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_controller: &BridgeController) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
