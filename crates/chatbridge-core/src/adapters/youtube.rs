//! Polling adapter - YouTube comment threads.
//!
//! On a fixed interval, requests recent comment threads and submits any
//! item whose id has not been seen this session. On error the loop backs
//! off to a longer interval and retries; it never terminates on its own.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{AdapterHandle, SourceAdapter};
use crate::ingest::IngestSink;
use crate::types::Source;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3/commentThreads";

/// YouTube polling configuration.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub video_id: String,
    pub api_key: String,
    /// Normal polling cadence
    pub poll_interval: Duration,
    /// Cadence after a request failure
    pub error_backoff: Duration,
    pub max_results: u32,
}

impl YouTubeConfig {
    pub fn new(video_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            api_key: api_key.into(),
            poll_interval: Duration::from_secs(10),
            error_backoff: Duration::from_secs(30),
            max_results: 10,
        }
    }
}

/// Fixed-interval comment poller.
pub struct YouTubeAdapter {
    config: YouTubeConfig,
    client: reqwest::Client,
}

impl YouTubeAdapter {
    pub fn new(config: YouTubeConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}?part=snippet&videoId={}&key={}&maxResults={}&order=time",
            API_BASE, self.config.video_id, self.config.api_key, self.config.max_results
        )
    }

    /// Extract `(id, author, text)` triples from a commentThreads response.
    fn parse_items(body: &Value) -> Vec<(String, String, String)> {
        let Some(items) = body["items"].as_array() else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| {
                let id = item["id"].as_str()?;
                let snippet = &item["snippet"]["topLevelComment"]["snippet"];
                let author = snippet["authorDisplayName"].as_str()?;
                let text = snippet["textDisplay"].as_str()?;
                Some((id.to_string(), author.to_string(), text.to_string()))
            })
            .collect()
    }

    async fn poll_once(&self, seen: &mut HashSet<String>, sink: &IngestSink) -> Result<()> {
        let body: Value = self
            .client
            .get(self.request_url())
            .send()
            .await
            .context("Comment request failed")?
            .json()
            .await
            .context("Comment response was not JSON")?;

        for (id, author, text) in Self::parse_items(&body) {
            if seen.insert(id) {
                sink.submit(
                    Source::YouTube,
                    &Source::YouTube.tagged_user(&author),
                    &text,
                );
            }
        }
        Ok(())
    }

    async fn run(self, sink: IngestSink, cancel: CancellationToken) {
        info!(
            "YouTube adapter started (video={}, interval={:?})",
            self.config.video_id, self.config.poll_interval
        );
        let mut seen = HashSet::new();

        loop {
            let delay = match self.poll_once(&mut seen, &sink).await {
                Ok(()) => self.config.poll_interval,
                Err(e) => {
                    warn!("YouTube poll failed, backing off: {:#}", e);
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("YouTube adapter stopped");
    }
}

#[async_trait]
impl SourceAdapter for YouTubeAdapter {
    fn source(&self) -> Source {
        Source::YouTube
    }

    fn is_configured(&self) -> bool {
        !self.config.video_id.is_empty() && !self.config.api_key.is_empty()
    }

    async fn start(&self, sink: IngestSink, cancel: CancellationToken) -> Result<AdapterHandle> {
        let adapter = Self {
            config: self.config.clone(),
            client: self.client.clone(),
        };
        Ok(AdapterHandle::Task(tokio::spawn(adapter.run(sink, cancel))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_comment_items() {
        let body = json!({
            "items": [
                {
                    "id": "c1",
                    "snippet": {
                        "topLevelComment": {
                            "snippet": {
                                "authorDisplayName": "alice",
                                "textDisplay": "great stream"
                            }
                        }
                    }
                },
                {
                    "id": "c2",
                    "snippet": {
                        "topLevelComment": {
                            "snippet": {
                                "authorDisplayName": "bob",
                                "textDisplay": "hello"
                            }
                        }
                    }
                }
            ]
        });

        let items = YouTubeAdapter::parse_items(&body);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], ("c1".into(), "alice".into(), "great stream".into()));
        assert_eq!(items[1].1, "bob");
    }

    #[test]
    fn test_parse_tolerates_malformed_items() {
        let body = json!({
            "items": [
                { "id": "c1" },
                { "snippet": {} },
                "not an object"
            ]
        });
        assert!(YouTubeAdapter::parse_items(&body).is_empty());

        let no_items = json!({ "error": { "code": 403 } });
        assert!(YouTubeAdapter::parse_items(&no_items).is_empty());
    }

    #[test]
    fn test_request_url_shape() {
        let adapter = YouTubeAdapter::new(YouTubeConfig::new("vid123", "key456"));
        let url = adapter.request_url();
        assert!(url.contains("videoId=vid123"));
        assert!(url.contains("key=key456"));
        assert!(url.contains("order=time"));
    }

    #[test]
    fn test_empty_credentials_disable_adapter() {
        assert!(!YouTubeAdapter::new(YouTubeConfig::new("", "key")).is_configured());
        assert!(!YouTubeAdapter::new(YouTubeConfig::new("vid", "")).is_configured());
        assert!(YouTubeAdapter::new(YouTubeConfig::new("vid", "key")).is_configured());
    }
}
