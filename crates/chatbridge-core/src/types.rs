//! Core Bridge Types
//!
//! Message types shared by the ingestion pipeline, the source adapters
//! and the outbound dispatcher.

use serde::{Deserialize, Serialize};

/// Chat platform origin tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Twitch,
    YouTube,
    Irc,
    BiliBili,
    Idle,
}

impl Source {
    /// Short tag used to prefix user names (e.g. `Twitch:alice`).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Twitch => "Twitch",
            Self::YouTube => "YouTube",
            Self::Irc => "IRC",
            Self::BiliBili => "BiliBili",
            Self::Idle => "Idle",
        }
    }

    /// Prefix a platform-local user name with this source's tag.
    pub fn tagged_user(&self, user: &str) -> String {
        format!("{}:{}", self.tag(), user)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A chat message as observed by a source adapter or the idle injector.
///
/// Immutable once produced; consumed exactly once by the ingestion entry
/// point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Originating platform
    pub source: Source,
    /// Full user identifier, already source-tagged (e.g. `Twitch:alice`)
    pub user: String,
    /// Message text
    pub text: String,
    /// Observation timestamp (milliseconds since epoch)
    pub observed_at: i64,
}

impl ChatEvent {
    pub fn new(source: Source, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source,
            user: user.into(),
            text: text.into(),
            observed_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Key used for duplicate suppression: exact `user + ":" + text`.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.user, self.text)
    }
}

/// A filtered, deduplicated message ready for outbound dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Downstream client identifier (`bridge-` + user)
    pub client_id: String,
    /// Message text
    pub text: String,
}

impl Envelope {
    pub fn for_user(user: &str, text: impl Into<String>) -> Self {
        Self {
            client_id: format!("bridge-{}", user),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tags() {
        assert_eq!(Source::Twitch.tag(), "Twitch");
        assert_eq!(Source::Irc.tag(), "IRC");
        assert_eq!(Source::Twitch.tagged_user("alice"), "Twitch:alice");
    }

    #[test]
    fn test_dedup_key_is_exact_concatenation() {
        let event = ChatEvent::new(Source::Twitch, "Twitch:alice", "hello");
        assert_eq!(event.dedup_key(), "Twitch:alice:hello");
    }

    #[test]
    fn test_envelope_client_id_prefix() {
        let envelope = Envelope::for_user("Twitch:alice", "hello");
        assert_eq!(envelope.client_id, "bridge-Twitch:alice");
        assert_eq!(envelope.text, "hello");
    }
}
