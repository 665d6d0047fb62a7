//! Ingestion Entry Point - The single funnel for all message producers.
//!
//! Every source adapter and the idle injector submit through here. This
//! is the only place filter and dedup state is touched, so every
//! enqueued envelope passed exactly one filter+dedup evaluation no
//! matter how many producers call concurrently.
//!
//! `submit` is synchronous and thread-safe: blocking socket threads call
//! it directly, async tasks call it inline. The critical section is a
//! short mutex over the dedup window and activity clock; the hand-off to
//! the dispatcher is an unbounded channel whose send never blocks. This
//! is the one sanctioned crossing point between the blocking-thread and
//! cooperative-scheduler regimes.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::dedup::DedupWindow;
use crate::filter::Blacklist;
use crate::types::{ChatEvent, Envelope, Source};

/// Outcome of a single `submit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Envelope enqueued for dispatch
    Accepted,
    /// Rejected by the filter gate
    Filtered,
    /// Suppressed by the dedup window
    Duplicate,
    /// Outbound channel closed (bridge stopping)
    Closed,
}

struct IngestState {
    dedup: DedupWindow,
    /// Timestamp of the most recent accepted event (epoch milliseconds)
    last_activity_ms: i64,
}

/// Shared, cloneable handle to the ingestion entry point.
#[derive(Clone)]
pub struct IngestSink {
    blacklist: Arc<Blacklist>,
    state: Arc<Mutex<IngestState>>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl IngestSink {
    /// Create the sink together with the dispatcher's end of the
    /// outbound channel.
    pub fn new(
        blacklist: Arc<Blacklist>,
        dedup_capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            blacklist,
            state: Arc::new(Mutex::new(IngestState {
                dedup: DedupWindow::new(dedup_capacity),
                last_activity_ms: chrono::Utc::now().timestamp_millis(),
            })),
            outbound: tx,
        };
        (sink, rx)
    }

    /// Filter, deduplicate and enqueue a message.
    ///
    /// `user` is the full source-tagged identifier (e.g. `Twitch:alice`).
    pub fn submit(&self, source: Source, user: &str, text: &str) -> SubmitOutcome {
        let event = ChatEvent::new(source, user, text);

        if !self.blacklist.allowed(&event.text) {
            debug!("Dropping filtered message from {}", event.user);
            return SubmitOutcome::Filtered;
        }

        // Single-writer critical section: check-and-insert and the
        // activity clock update cannot interleave across producers.
        {
            let mut state = self.state.lock();
            if state.dedup.seen(&event.dedup_key()) {
                trace!("Dropping duplicate message from {}", event.user);
                return SubmitOutcome::Duplicate;
            }
            state.last_activity_ms = event.observed_at;
        }

        let envelope = Envelope::for_user(&event.user, event.text);
        match self.outbound.send(envelope) {
            Ok(()) => SubmitOutcome::Accepted,
            Err(_) => SubmitOutcome::Closed,
        }
    }

    /// Milliseconds elapsed since the last accepted event.
    pub fn millis_since_activity(&self) -> i64 {
        let last = self.state.lock().last_activity_ms;
        chrono::Utc::now().timestamp_millis() - last
    }
}
