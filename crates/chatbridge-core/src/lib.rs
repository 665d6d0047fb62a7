//! ChatBridge Core
//!
//! Chat-aggregation bridge: ingests messages from multiple independent
//! live-chat sources, filters and deduplicates them, injects synthetic
//! idle messages during quiet periods, and forwards the result -
//! rate-limited and serialized - to a single downstream real-time
//! endpoint.
//!
//! # Architecture
//!
//! ```text
//! Source Adapter ──┐
//! Source Adapter ──┼─▶ IngestSink ──▶ Outbound Channel ──▶ Dispatcher ──▶ endpoint
//! Idle Injector ───┘   (filter +          (FIFO mpsc)      (rate limit,
//!                       dedup +                             retry/backoff)
//!                       activity clock)
//! ```
//!
//! Two concurrency regimes coexist: tokio tasks for the dispatcher, the
//! idle injector and the polling/streaming adapters, and dedicated OS
//! threads for blocking socket readers. All producers funnel through
//! [`ingest::IngestSink::submit`], the one sanctioned crossing point.

pub mod adapters;
pub mod config;
pub mod controller;
pub mod dedup;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod idle;
pub mod ingest;
pub mod types;

pub use config::BridgeConfig;
pub use controller::BridgeController;
pub use error::BridgeError;
pub use types::{ChatEvent, Envelope, Source};
