//! Idle Injector - Synthetic messages during quiet periods.
//!
//! Cycles on a fixed timer. On each tick, if idle-only mode is set or
//! the activity clock has been quiet longer than the interval, one line
//! is picked uniformly at random from the idle-message file and fed
//! through the normal ingestion entry point. The file is re-read on
//! every tick; an empty or missing file skips the tick silently.

use rand::seq::IndexedRandom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ingest::IngestSink;
use crate::types::Source;

/// User name attached to injected idle messages.
pub const IDLE_USER: &str = "idle_bot";

pub struct IdleInjector {
    sink: IngestSink,
    messages_path: PathBuf,
    interval: Duration,
    idle_only: bool,
}

impl IdleInjector {
    pub fn new(
        sink: IngestSink,
        messages_path: impl Into<PathBuf>,
        interval: Duration,
        idle_only: bool,
    ) -> Self {
        Self {
            sink,
            messages_path: messages_path.into(),
            interval,
            idle_only,
        }
    }

    /// Run the Waiting/Checking cycle until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            "Idle injector started (interval={:?}, idle_only={})",
            self.interval, self.idle_only
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.check().await,
            }
        }

        info!("Idle injector stopped");
    }

    async fn check(&self) {
        if !self.idle_only && self.sink.millis_since_activity() <= self.interval.as_millis() as i64
        {
            return;
        }

        // Intentional per-tick file round-trip; no caching
        let contents = match tokio::fs::read_to_string(&self.messages_path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(
                    "Idle messages file {} not readable ({}); skipping tick",
                    self.messages_path.display(),
                    e
                );
                return;
            }
        };

        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        if let Some(line) = lines.choose(&mut rand::rng()) {
            self.sink.submit(Source::Idle, IDLE_USER, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Blacklist;
    use std::io::Write;
    use std::sync::Arc;

    fn sink() -> (IngestSink, tokio::sync::mpsc::UnboundedReceiver<crate::types::Envelope>) {
        IngestSink::new(Arc::new(Blacklist::empty()), 100)
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_only_mode_injects_on_each_tick() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ping").unwrap();

        let (sink, mut rx) = sink();
        let injector = IdleInjector::new(sink, file.path(), Duration::from_millis(10), true);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(injector.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(25)).await;
        cancel.cancel();
        handle.await.unwrap();

        let envelope = rx.try_recv().expect("at least one idle envelope");
        assert_eq!(envelope.text, "ping");
        assert_eq!(envelope.client_id, "bridge-idle_bot");
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_gate_respects_activity_clock() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ping").unwrap();

        let (sink, mut rx) = sink();
        // Long interval: the clock was touched at sink creation, so the
        // first few ticks see recent activity and must stay silent.
        let injector =
            IdleInjector::new(sink, file.path(), Duration::from_secs(3600), false);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(injector.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_skips_silently() {
        let (sink, mut rx) = sink();
        let injector = IdleInjector::new(
            sink,
            "/nonexistent/msg.txt",
            Duration::from_millis(10),
            true,
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(injector.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_lines_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\n\n  \nping\n\n").unwrap();

        let (sink, mut rx) = sink();
        let injector = IdleInjector::new(sink, file.path(), Duration::from_millis(10), true);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(injector.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(25)).await;
        cancel.cancel();
        handle.await.unwrap();

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.text, "ping");
    }
}
