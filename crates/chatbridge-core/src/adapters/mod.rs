//! Source Adapters - Independent producers, one per chat platform.
//!
//! Adapters are a closed set behind one capability trait, selected by
//! configuration. Each runs in its own task or thread and is an
//! independent failure domain (bulkhead policy): an unhandled error in
//! one adapter never terminates the others, the dispatcher, or the idle
//! injector.

mod bilibili;
mod socket_line;
mod youtube;

pub use bilibili::{BiliBiliAdapter, LiveClient, MessageCallback};
pub use socket_line::{SocketLineAdapter, SocketLineConfig};
pub use youtube::{YouTubeAdapter, YouTubeConfig};

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ingest::IngestSink;
use crate::types::Source;

/// Capability interface over the closed set of platform adapters.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Platform this adapter ingests from.
    fn source(&self) -> Source;

    /// Whether the adapter has the credentials/settings it needs.
    /// An unconfigured adapter is skipped at startup, never an error.
    fn is_configured(&self) -> bool;

    /// Start producing into the sink until the token is cancelled.
    async fn start(&self, sink: IngestSink, cancel: CancellationToken) -> Result<AdapterHandle>;
}

/// Handle to a running adapter: a cooperative task or a blocking thread.
pub enum AdapterHandle {
    Task(tokio::task::JoinHandle<()>),
    Thread(std::thread::JoinHandle<()>),
}

impl AdapterHandle {
    /// Join the adapter, swallowing its failure (bulkhead policy:
    /// adapter faults are logged, never raised to the caller).
    pub async fn join(self, source: Source) {
        match self {
            Self::Task(handle) => {
                if let Err(e) = handle.await {
                    warn!("{} adapter task ended abnormally: {}", source, e);
                }
            }
            Self::Thread(handle) => {
                let joined = tokio::task::spawn_blocking(move || handle.join()).await;
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => warn!("{} adapter thread panicked", source),
                    Err(e) => warn!("Failed to join {} adapter thread: {}", source, e),
                }
            }
        }
    }
}
