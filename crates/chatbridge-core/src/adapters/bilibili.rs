//! Streaming-client adapter - BiliBili live rooms.
//!
//! Delegates to an external streaming client collaborator behind the
//! [`LiveClient`] trait. The adapter registers a callback that forwards
//! room messages into the ingestion entry point and owns start/stop of
//! the collaborator. If no client implementation is wired in (the
//! optional dependency is unavailable), the adapter disables itself and
//! reports the condition instead of failing the whole bridge.
//!
//! Such a client manages its own connection state, so stopping routes an
//! explicit `disconnect` call onto the owning task rather than relying
//! on cancellation alone.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{AdapterHandle, SourceAdapter};
use crate::ingest::IngestSink;
use crate::types::Source;

/// Callback invoked by the streaming client for each room message.
pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;

/// External streaming client collaborator.
#[async_trait]
pub trait LiveClient: Send + Sync {
    /// Connect and stream messages into the callback until disconnected.
    async fn connect(&self, on_message: MessageCallback) -> Result<()>;

    /// Tear down the client's own connection state.
    async fn disconnect(&self) -> Result<()>;
}

/// Adapter owning an optional external streaming client.
pub struct BiliBiliAdapter {
    client: Option<Arc<dyn LiveClient>>,
    room_ids: Vec<u64>,
}

impl BiliBiliAdapter {
    pub fn new(client: Option<Arc<dyn LiveClient>>, room_ids: Vec<u64>) -> Self {
        Self { client, room_ids }
    }

    /// An adapter with no client wired in; it will disable itself.
    pub fn unavailable(room_ids: Vec<u64>) -> Self {
        Self::new(None, room_ids)
    }
}

#[async_trait]
impl SourceAdapter for BiliBiliAdapter {
    fn source(&self) -> Source {
        Source::BiliBili
    }

    fn is_configured(&self) -> bool {
        self.client.is_some() && !self.room_ids.is_empty()
    }

    async fn start(&self, sink: IngestSink, cancel: CancellationToken) -> Result<AdapterHandle> {
        let Some(client) = self.client.clone() else {
            warn!("BiliBili streaming client unavailable; adapter disabled");
            return Ok(AdapterHandle::Task(tokio::spawn(async {})));
        };
        if self.room_ids.is_empty() {
            warn!("BiliBili room ids not configured; adapter disabled");
            return Ok(AdapterHandle::Task(tokio::spawn(async {})));
        }

        let room_ids = self.room_ids.clone();
        let handle = tokio::spawn(async move {
            info!("BiliBili adapter started (rooms={:?})", room_ids);

            let on_message: MessageCallback = Arc::new(move |text: String| {
                sink.submit(Source::BiliBili, Source::BiliBili.tag(), &text);
            });

            tokio::select! {
                result = client.connect(on_message) => {
                    if let Err(e) = result {
                        error!("BiliBili client ended with error: {:#}", e);
                    }
                }
                _ = cancel.cancelled() => {
                    // Explicit disconnect on the owning task; the client
                    // cannot be safely cancelled from an arbitrary context
                    if let Err(e) = client.disconnect().await {
                        warn!("BiliBili disconnect failed: {:#}", e);
                    }
                }
            }

            info!("BiliBili adapter stopped");
        });

        Ok(AdapterHandle::Task(handle))
    }
}
