//! Command-line definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatbridge", version, about = "Multi-platform live-chat aggregation bridge")]
pub struct Cli {
    /// Path to the persisted bridge configuration
    #[arg(short, long, default_value = "bridge_config.json", env = "CHATBRIDGE_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge until interrupted (default)
    Run,
    /// Validate the configuration and print a summary
    Check,
    /// Seed config, blacklist and idle-message files if missing
    Init,
}
