//! Dispatcher - The serialized, rate-limited sender loop.
//!
//! Sole consumer of the outbound channel. Owns the downstream connection
//! lifecycle: per envelope it connects, optionally sends a group-invite
//! control frame, sends the chat frame, then holds the global rate-limit
//! interval. Transport failures drop the envelope (delivery is
//! best-effort) and back off briefly before the next dequeue.
//!
//! The transport sits behind the [`Connector`] trait so tests can inject
//! a mock; production uses [`WsConnector`] over tokio-tungstenite.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::types::Envelope;

/// Sender-loop state, exposed for observation via a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Blocked awaiting the next envelope
    Idle,
    /// Opening the downstream connection
    Connecting,
    /// Writing frames
    Sending,
    /// Holding the global rate-limit interval after a successful send
    RateLimitWait,
    /// Holding the back-off delay after a transport failure
    ErrorBackoff,
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Downstream WebSocket endpoint
    pub endpoint: Url,
    /// Group-membership invitee sent before each chat frame, if set
    pub invitee_uid: Option<String>,
    /// Minimum interval between successful sends, shared across all sources
    pub rate_limit: Duration,
    /// Delay before returning to Idle after a transport failure
    pub error_backoff: Duration,
    /// Pause between the invite frame and the chat frame
    pub invite_pause: Duration,
}

impl DispatcherConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            invitee_uid: None,
            rate_limit: Duration::from_secs(6),
            error_backoff: Duration::from_secs(1),
            invite_pause: Duration::from_millis(200),
        }
    }

    pub fn with_invitee(mut self, invitee_uid: impl Into<String>) -> Self {
        self.invitee_uid = Some(invitee_uid.into());
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_error_backoff(mut self, error_backoff: Duration) -> Self {
        self.error_backoff = error_backoff;
        self
    }

    pub fn with_invite_pause(mut self, invite_pause: Duration) -> Self {
        self.invite_pause = invite_pause;
        self
    }
}

/// An open downstream connection that accepts JSON frames.
#[async_trait]
pub trait Connection: Send {
    async fn send_frame(&mut self, frame: Value) -> Result<()>;
}

/// Downstream connection factory, injected for testability.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Connection>>;
}

/// Production connector speaking WebSocket via tokio-tungstenite.
pub struct WsConnector;

struct WsConnection {
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn Connection>> {
        let (stream, _) = tokio_tungstenite::connect_async(endpoint.as_str())
            .await
            .context("Failed to connect to downstream endpoint")?;
        Ok(Box::new(WsConnection { stream }))
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_frame(&mut self, frame: Value) -> Result<()> {
        use futures::SinkExt;
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        self.stream
            .send(WsMessage::Text(frame.to_string().into()))
            .await
            .context("Failed to send frame")
    }
}

/// The sender loop. Runs until cancelled; has no terminal state of its own.
pub struct Dispatcher {
    config: DispatcherConfig,
    connector: Arc<dyn Connector>,
    state_tx: watch::Sender<DispatcherState>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(DispatcherState::Idle);
        Self {
            config,
            connector,
            state_tx,
        }
    }

    /// Observe state transitions (for the control surface and tests).
    pub fn state(&self) -> watch::Receiver<DispatcherState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: DispatcherState) {
        // send_replace never fails even with no subscribers
        self.state_tx.send_replace(state);
    }

    /// Consume the outbound channel until cancellation.
    pub async fn run(
        self,
        mut inbox: mpsc::UnboundedReceiver<Envelope>,
        cancel: CancellationToken,
    ) {
        info!("Dispatcher started (endpoint={})", self.config.endpoint);

        loop {
            self.set_state(DispatcherState::Idle);

            let envelope = tokio::select! {
                _ = cancel.cancelled() => break,
                received = inbox.recv() => match received {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            self.set_state(DispatcherState::Connecting);
            match self.deliver(&envelope).await {
                Ok(()) => {
                    debug!("Delivered envelope for {}", envelope.client_id);
                    self.set_state(DispatcherState::RateLimitWait);
                    if pause(self.config.rate_limit, &cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    // Best-effort delivery: the failed envelope is
                    // dropped, never requeued (requeueing would reorder
                    // the channel and resurrect deduped keys).
                    warn!("Dropping envelope for {}: {:#}", envelope.client_id, e);
                    self.set_state(DispatcherState::ErrorBackoff);
                    if pause(self.config.error_backoff, &cancel).await {
                        break;
                    }
                }
            }
        }

        info!("Dispatcher stopped");
    }

    async fn deliver(&self, envelope: &Envelope) -> Result<()> {
        let mut connection = self.connector.connect(&self.config.endpoint).await?;
        self.set_state(DispatcherState::Sending);

        if let Some(invitee) = &self.config.invitee_uid {
            connection
                .send_frame(json!({
                    "type": "add-client-to-group",
                    "invitee_uid": invitee,
                }))
                .await
                .context("Failed to send group invite")?;
            sleep(self.config.invite_pause).await;
        }

        connection
            .send_frame(json!({
                "type": "text-input",
                "uid": envelope.client_id,
                "text": envelope.text,
                "source": "bridge",
            }))
            .await
            .context("Failed to send chat frame")
    }
}

/// Cancellable delay. Returns `true` if cancellation fired first.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = sleep(duration) => false,
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockConnector;
    use super::*;

    fn test_config() -> DispatcherConfig {
        let endpoint = Url::parse("ws://localhost:12393/proxy-ws").unwrap();
        DispatcherConfig::new(endpoint)
            .with_rate_limit(Duration::from_millis(50))
            .with_error_backoff(Duration::from_millis(40))
            .with_invite_pause(Duration::from_millis(5))
    }

    fn spawn_dispatcher(
        config: DispatcherConfig,
        connector: Arc<MockConnector>,
    ) -> (
        mpsc::UnboundedSender<Envelope>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(config, connector);
        let handle = tokio::spawn(dispatcher.run(rx, cancel.clone()));
        (tx, cancel, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_frame_shape() {
        let connector = MockConnector::new();
        let (tx, cancel, handle) = spawn_dispatcher(test_config(), connector.clone());

        tx.send(Envelope::for_user("Twitch:alice", "hello")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let frames = connector.frames.lock().await;
        assert_eq!(frames.len(), 1);
        let frame = &frames[0].1;
        assert_eq!(frame["type"], "text-input");
        assert_eq!(frame["uid"], "bridge-Twitch:alice");
        assert_eq!(frame["text"], "hello");
        assert_eq!(frame["source"], "bridge");
        drop(frames);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invite_frame_precedes_chat_frame() {
        let connector = MockConnector::new();
        let config = test_config().with_invitee("avatar-main");
        let (tx, cancel, handle) = spawn_dispatcher(config, connector.clone());

        tx.send(Envelope::for_user("IRC:bob", "hi")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let frames = connector.frames.lock().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].1["type"], "add-client-to-group");
        assert_eq!(frames[0].1["invitee_uid"], "avatar-main");
        assert_eq!(frames[1].1["type"], "text-input");
        // The fixed short pause separates the two frames
        assert!(frames[1].0 - frames[0].0 >= Duration::from_millis(5));
        drop(frames);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spacing_across_envelopes() {
        let connector = MockConnector::new();
        let (tx, cancel, handle) = spawn_dispatcher(test_config(), connector.clone());

        tx.send(Envelope::for_user("Twitch:a", "one")).unwrap();
        tx.send(Envelope::for_user("YouTube:b", "two")).unwrap();
        tx.send(Envelope::for_user("IRC:c", "three")).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let frames = connector.frames.lock().await;
        assert_eq!(frames.len(), 3);
        // The limiter is shared across all sources
        assert!(frames[1].0 - frames[0].0 >= Duration::from_millis(50));
        assert!(frames[2].0 - frames[1].0 >= Duration::from_millis(50));
        drop(frames);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_drops_envelope_and_backs_off() {
        let connector = MockConnector::new();
        connector.fail_next_connects(1);
        let (tx, cancel, handle) = spawn_dispatcher(test_config(), connector.clone());

        let start = tokio::time::Instant::now();
        tx.send(Envelope::for_user("Twitch:a", "lost")).unwrap();
        tx.send(Envelope::for_user("Twitch:b", "delivered")).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let frames = connector.frames.lock().await;
        // The failed envelope is never re-sent
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1["text"], "delivered");
        // The second envelope waited out the back-off delay
        assert!(frames[0].0 - start >= Duration::from_millis(40));
        drop(frames);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_also_drops_envelope() {
        let connector = MockConnector::new();
        connector.fail_next_sends(1);
        let (tx, cancel, handle) = spawn_dispatcher(test_config(), connector.clone());

        tx.send(Envelope::for_user("Twitch:a", "lost")).unwrap();
        tx.send(Envelope::for_user("Twitch:b", "delivered")).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let frames = connector.frames.lock().await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1["text"], "delivered");
        drop(frames);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_until_cancelled_with_empty_channel() {
        let connector = MockConnector::new();
        let dispatcher = Dispatcher::new(test_config(), connector.clone());
        let state = dispatcher.state();

        let (_tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(dispatcher.run(rx, cancel.clone()));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*state.borrow(), DispatcherState::Idle);
        assert!(connector.frames.lock().await.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
