//! Bridge error taxonomy surfaced to the control surface.

use thiserror::Error;

/// Errors reported synchronously to the control surface.
///
/// Everything else in the bridge recovers locally: transport errors back
/// off, source errors stay inside their adapter, missing resource files
/// degrade to empty sets.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Unrecoverable startup condition: the downstream URL does not parse.
    #[error("invalid downstream endpoint '{url}': {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("bridge is already running")]
    AlreadyRunning,

    #[error("bridge is not running")]
    NotRunning,
}
