//! Bridge Controller - Composition and lifecycle.
//!
//! Owns all shared state explicitly (blacklist, dedup window, activity
//! clock live inside the ingest sink it builds) and passes it into the
//! units it starts; nothing is process-global. Startup order: outbound
//! channel, dispatcher, idle injector, then each enabled source adapter,
//! recording every handle. Stop cancels the shared token and joins every
//! unit without letting adapter faults surface to the caller.

use anyhow::Result;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::{
    AdapterHandle, BiliBiliAdapter, LiveClient, SocketLineAdapter, SocketLineConfig,
    SourceAdapter, YouTubeAdapter, YouTubeConfig,
};
use crate::config::BridgeConfig;
use crate::dispatcher::{Connector, Dispatcher, DispatcherConfig, WsConnector};
use crate::error::BridgeError;
use crate::filter::Blacklist;
use crate::idle::IdleInjector;
use crate::ingest::IngestSink;
use crate::types::Source;

struct RunningBridge {
    session_id: Uuid,
    cancel: CancellationToken,
    dispatcher: tokio::task::JoinHandle<()>,
    idle: Option<tokio::task::JoinHandle<()>>,
    adapters: Vec<(Source, AdapterHandle)>,
}

/// Control surface over the whole bridge.
pub struct BridgeController {
    config_path: PathBuf,
    config: RwLock<BridgeConfig>,
    blacklist: Arc<Blacklist>,
    connector: Arc<dyn Connector>,
    bilibili_client: Option<Arc<dyn LiveClient>>,
    running: Mutex<Option<RunningBridge>>,
}

impl BridgeController {
    /// Build a controller around an in-memory config. The blacklist is
    /// loaded eagerly from the configured file (missing file == empty).
    pub fn new(config: BridgeConfig, config_path: impl Into<PathBuf>) -> Self {
        let blacklist = Arc::new(Blacklist::load(&config.blacklist_file));
        Self {
            config_path: config_path.into(),
            config: RwLock::new(config),
            blacklist,
            connector: Arc::new(WsConnector),
            bilibili_client: None,
            running: Mutex::new(None),
        }
    }

    /// Inject a downstream connector (tests use a mock).
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Wire in the optional BiliBili streaming client collaborator.
    pub fn with_bilibili_client(mut self, client: Arc<dyn LiveClient>) -> Self {
        self.bilibili_client = Some(client);
        self
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> BridgeConfig {
        self.config.read().clone()
    }

    /// Mutate configuration fields from the control surface.
    pub fn update_config(&self, update: impl FnOnce(&mut BridgeConfig)) {
        update(&mut self.config.write());
    }

    /// Shared blacklist, exposed for control-surface inspection.
    pub fn blacklist(&self) -> Arc<Blacklist> {
        self.blacklist.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Start every unit. Fails synchronously, before any unit starts,
    /// only on an unrecoverable condition (invalid endpoint URL or an
    /// already-running bridge).
    pub async fn start(&self) -> Result<(), BridgeError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }

        let config = self.config.read().clone();
        let endpoint = config.endpoint()?;

        let session_id = Uuid::new_v4();
        info!("Starting bridge session {}", session_id);

        let (sink, outbox) = IngestSink::new(self.blacklist.clone(), config.message_queue_limit);
        let cancel = CancellationToken::new();

        let mut dispatcher_config =
            DispatcherConfig::new(endpoint).with_rate_limit(config.rate_limit());
        if let Some(invitee) = &config.invitee_uid {
            dispatcher_config = dispatcher_config.with_invitee(invitee);
        }
        let dispatcher = Dispatcher::new(dispatcher_config, self.connector.clone());
        let dispatcher_handle = tokio::spawn(dispatcher.run(outbox, cancel.clone()));

        let idle = config.idle_enabled.then(|| {
            let injector = IdleInjector::new(
                sink.clone(),
                config.idle_messages_file.clone(),
                config.idle_interval(),
                config.idle_as_only_mode,
            );
            tokio::spawn(injector.run(cancel.clone()))
        });

        let mut adapters = Vec::new();
        for adapter in self.enabled_adapters(&config) {
            let source = adapter.source();
            if !adapter.is_configured() {
                info!("{} source enabled but not configured; skipping", source);
                continue;
            }
            // Bulkhead: a failed adapter start is logged, the rest of
            // the bridge comes up regardless
            match adapter.start(sink.clone(), cancel.clone()).await {
                Ok(handle) => adapters.push((source, handle)),
                Err(e) => warn!("Failed to start {} adapter: {:#}", source, e),
            }
        }

        *running = Some(RunningBridge {
            session_id,
            cancel,
            dispatcher: dispatcher_handle,
            idle,
            adapters,
        });
        Ok(())
    }

    /// Cancel and join every running unit.
    pub async fn stop(&self) -> Result<(), BridgeError> {
        let Some(running) = self.running.lock().await.take() else {
            return Err(BridgeError::NotRunning);
        };

        info!("Stopping bridge session {}", running.session_id);
        running.cancel.cancel();

        if let Err(e) = running.dispatcher.await {
            warn!("Dispatcher ended abnormally: {}", e);
        }
        if let Some(idle) = running.idle {
            if let Err(e) = idle.await {
                warn!("Idle injector ended abnormally: {}", e);
            }
        }
        for (source, handle) in running.adapters {
            handle.join(source).await;
        }

        info!("Bridge stopped");
        Ok(())
    }

    /// Swap the blacklist and re-read configuration fields from disk
    /// without restarting running units. A malformed file keeps the
    /// last-known-good config and is reported to the caller.
    pub fn reload(&self) -> Result<()> {
        match BridgeConfig::load(&self.config_path) {
            Ok(fresh) => *self.config.write() = fresh,
            Err(e) => {
                warn!("Config reload failed, keeping last-known-good: {:#}", e);
                // Still swap the blacklist below before reporting
                let path = self.config.read().blacklist_file.clone();
                self.blacklist.reload_from(path);
                return Err(e);
            }
        }
        let path = self.config.read().blacklist_file.clone();
        self.blacklist.reload_from(path);
        info!("Reloaded configuration and blacklist");
        Ok(())
    }

    /// Persist the current configuration.
    pub fn save(&self) -> Result<()> {
        self.config.read().save(&self.config_path)
    }

    fn enabled_adapters(&self, config: &BridgeConfig) -> Vec<Box<dyn SourceAdapter>> {
        let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
        if config.twitch_enabled {
            adapters.push(Box::new(SocketLineAdapter::new(SocketLineConfig::twitch(
                &config.twitch_username,
                &config.twitch_oauth,
            ))));
        }
        if config.irc_enabled {
            adapters.push(Box::new(SocketLineAdapter::new(SocketLineConfig::irc(
                &config.irc_server,
                config.irc_port,
                &config.irc_channel,
            ))));
        }
        if config.youtube_enabled {
            adapters.push(Box::new(YouTubeAdapter::new(YouTubeConfig::new(
                &config.youtube_video_id,
                &config.youtube_api_key,
            ))));
        }
        if config.bilibili_enabled {
            adapters.push(Box::new(BiliBiliAdapter::new(
                self.bilibili_client.clone(),
                config.bilibili_room_ids.clone(),
            )));
        }
        adapters
    }
}
