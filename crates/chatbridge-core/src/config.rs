//! Bridge Configuration
//!
//! Process-wide configuration, loaded once at startup and mutable only
//! through the control surface. Persisted as JSON. A missing file yields
//! defaults; a malformed file is an error so the caller can keep its
//! last-known-good in-memory copy.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::BridgeError;

/// Persisted bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Downstream WebSocket endpoint
    pub ws_url: String,
    /// UID invited into the downstream group before each chat frame
    pub invitee_uid: Option<String>,

    pub twitch_enabled: bool,
    pub twitch_username: String,
    pub twitch_oauth: String,

    pub youtube_enabled: bool,
    pub youtube_video_id: String,
    pub youtube_api_key: String,

    pub irc_enabled: bool,
    pub irc_server: String,
    pub irc_port: u16,
    pub irc_channel: String,

    pub bilibili_enabled: bool,
    pub bilibili_room_ids: Vec<u64>,
    pub bilibili_sessdata: String,

    pub blacklist_file: PathBuf,
    /// Dedup window capacity
    pub message_queue_limit: usize,
    /// Minimum seconds between downstream sends, across all sources
    pub rate_limit_secs: u64,

    pub idle_enabled: bool,
    pub idle_as_only_mode: bool,
    pub idle_interval_secs: u64,
    pub idle_messages_file: PathBuf,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:12393/proxy-ws".to_string(),
            invitee_uid: None,
            twitch_enabled: false,
            twitch_username: String::new(),
            twitch_oauth: String::new(),
            youtube_enabled: false,
            youtube_video_id: String::new(),
            youtube_api_key: String::new(),
            irc_enabled: false,
            irc_server: "irc.libera.chat".to_string(),
            irc_port: 6667,
            irc_channel: String::new(),
            bilibili_enabled: false,
            bilibili_room_ids: Vec::new(),
            bilibili_sessdata: String::new(),
            blacklist_file: PathBuf::from("blacklist.txt"),
            message_queue_limit: 100,
            rate_limit_secs: 6,
            idle_enabled: true,
            idle_as_only_mode: false,
            idle_interval_secs: 30,
            idle_messages_file: PathBuf::from("msg.txt"),
        }
    }
}

impl BridgeConfig {
    /// Load from a JSON file. Missing file yields defaults; a malformed
    /// file is an error (callers keep their last-known-good config).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Malformed config file {}", path.display()))
    }

    /// Persist as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Validate startup-fatal fields.
    pub fn validate(&self) -> Result<(), BridgeError> {
        self.endpoint().map(|_| ())
    }

    /// Parse the downstream endpoint URL.
    pub fn endpoint(&self) -> Result<Url, BridgeError> {
        Url::parse(&self.ws_url).map_err(|source| BridgeError::InvalidEndpoint {
            url: self.ws_url.clone(),
            source,
        })
    }

    pub fn rate_limit(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.rate_limit_secs)
    }

    pub fn idle_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_interval_secs)
    }
}
