//! First-run file seeding and config inspection.

use anyhow::{Context, Result};
use chatbridge_core::BridgeConfig;
use std::path::Path;
use tracing::info;

const DEFAULT_BLACKLIST: &str = "putin\nnazi\nhate\nslur\n";
const DEFAULT_IDLE_MESSAGES: &str = "Hey I'm still here!\n";

/// Seed the config, blacklist and idle-message files if missing.
/// Existing files are never overwritten.
pub fn ensure_files(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        BridgeConfig::default().save(config_path)?;
        info!("Wrote default config to {}", config_path.display());
    }

    let config = BridgeConfig::load(config_path).unwrap_or_default();
    seed(&config.blacklist_file, DEFAULT_BLACKLIST)?;
    seed(&config.idle_messages_file, DEFAULT_IDLE_MESSAGES)?;
    Ok(())
}

fn seed(path: &Path, contents: &str) -> Result<()> {
    if !path.exists() {
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to seed {}", path.display()))?;
        info!("Seeded {}", path.display());
    }
    Ok(())
}

/// Print a human-readable configuration summary.
pub fn print_summary(config: &BridgeConfig) {
    println!("endpoint:      {}", config.ws_url);
    println!(
        "invitee:       {}",
        config.invitee_uid.as_deref().unwrap_or("(none)")
    );
    println!("rate limit:    {}s", config.rate_limit_secs);
    println!("dedup window:  {}", config.message_queue_limit);
    println!(
        "sources:       twitch={} youtube={} irc={} bilibili={}",
        config.twitch_enabled,
        config.youtube_enabled,
        config.irc_enabled,
        config.bilibili_enabled
    );
    println!(
        "idle:          enabled={} only_mode={} interval={}s file={}",
        config.idle_enabled,
        config.idle_as_only_mode,
        config.idle_interval_secs,
        config.idle_messages_file.display()
    );
    println!("blacklist:     {}", config.blacklist_file.display());
}
