//! Gateway: the session coordinator tying connections, rules and the store together.
//!
//! Owns one connection per session slot, funnels their events into a single
//! loop, runs the reset timer and serves the HTTP command surface.

mod commands;
mod lifecycle;
mod pipeline;
pub mod registry;
mod reset;
pub mod ui;


pub use commands::SessionSnapshot;
pub use registry::{SessionRegistry, SessionState};
pub use ui::{UiEvent, UiTracker, UiView};

use autoreply_core::{
    config::{ApiConfig, Config},
    error::AutoReplyError,
    message::ConnectionEvent,
    session::SessionId,
    traits::{Connection, ConnectionFactory},
};
use reset::ResetTimer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// A connection event tagged with the slot and connection generation it came from.
#[derive(Debug)]
pub struct SessionEvent {
    pub session: SessionId,
    pub generation: u64,
    pub event: ConnectionEvent,
}

/// The live connection of a slot.
#[derive(Clone)]
pub(crate) struct ConnectionSlot {
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) generation: u64,
}

/// The central coordinator of all session slots.
pub struct Gateway {
    pub(super) registry: Arc<SessionRegistry>,
    pub(super) factory: Arc<dyn ConnectionFactory>,
    pub(super) connections: RwLock<HashMap<SessionId, ConnectionSlot>>,
    pub(super) next_generation: AtomicU64,
    /// Token of the recreate scheduled by the latest logout, per slot.
    pub(super) pending_recreate: std::sync::Mutex<HashMap<SessionId, u64>>,
    pub(super) events_tx: mpsc::Sender<SessionEvent>,
    pub(super) events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    pub(super) ui: broadcast::Sender<UiEvent>,
    pub(super) tracker: UiTracker,
    pub(super) reset: ResetTimer,
    pub(super) recreate_delay: Duration,
    pub(super) api_config: ApiConfig,
    pub(super) print_qr: bool,
    pub(super) uptime: Instant,
}

impl Gateway {
    /// Create a new gateway over an already loaded registry.
    pub fn new(
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn ConnectionFactory>,
        config: &Config,
    ) -> Result<Self, AutoReplyError> {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (ui, _) = broadcast::channel(64);
        let tracker = UiTracker::default();
        tokio::spawn(tracker.clone().follow(ui.subscribe()));

        Ok(Self {
            registry,
            factory,
            connections: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            pending_recreate: std::sync::Mutex::new(HashMap::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            ui,
            tracker,
            reset: ResetTimer::new(config.reset.interval_minutes)?,
            recreate_delay: Duration::from_millis(config.logout.recreate_delay_ms),
            api_config: config.api.clone(),
            print_qr: config.whatsapp.print_qr,
            uptime: Instant::now(),
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &UiTracker {
        &self.tracker
    }

    pub fn uptime(&self) -> Duration {
        self.uptime.elapsed()
    }

    /// Subscribe to UI notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.ui.subscribe()
    }

    pub(super) fn emit(&self, event: UiEvent) {
        // No subscribers is fine.
        let _ = self.ui.send(event);
    }

    /// Run the main event loop until Ctrl-C.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let mut rx = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow::anyhow!("gateway is already running"))?;

        let ids = self.registry.ids();
        info!(
            "autoreply gateway running | sessions: {} | reset every {} min",
            ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", "),
            self.reset.period().as_secs() / 60,
        );

        // Terminal QR printer.
        let qr_handle = if self.print_qr {
            let mut labels = HashMap::new();
            for id in &ids {
                let session = self.registry.get(id)?;
                labels.insert(id.clone(), session.lock().await.label.clone());
            }
            let qr_rx = self.subscribe();
            Some(tokio::spawn(ui::print_qr_codes(qr_rx, labels)))
        } else {
            None
        };

        for id in &ids {
            self.start_session(id).await;
        }

        // Spawn reset loop.
        let reset_handle = tokio::spawn(reset::reset_loop(
            self.registry.clone(),
            self.reset.subscribe(),
        ));

        // Spawn HTTP API server.
        let api_handle = if self.api_config.enabled {
            let api_cfg = self.api_config.clone();
            let api_gateway = self.clone();
            Some(tokio::spawn(async move {
                crate::api::serve(api_cfg, api_gateway).await;
            }))
        } else {
            None
        };

        // Main event loop with graceful shutdown.
        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    self.clone().handle_event(event).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown(&reset_handle, &api_handle, &qr_handle).await;
        Ok(())
    }

    /// Route one connection event.
    ///
    /// Lifecycle events are applied in order; messages are handled on their
    /// own task so a slow send never stalls the loop.
    pub(crate) async fn handle_event(self: Arc<Self>, event: SessionEvent) {
        let SessionEvent {
            session,
            generation,
            event,
        } = event;
        let Some(connection) = self.current_connection(&session, generation).await else {
            debug!("[{session}] dropping event from superseded connection #{generation}");
            return;
        };

        match event {
            ConnectionEvent::QrRequired(code) => self.on_qr(&session, code).await,
            ConnectionEvent::Ready => {
                self.on_ready(&session).await;
                tokio::spawn(async move {
                    self.refresh_profile(&session, connection).await;
                });
            }
            ConnectionEvent::Message(msg) => {
                if msg.session != session {
                    warn!("[{session}] message tagged for {}, dropping", msg.session);
                    return;
                }
                tokio::spawn(async move {
                    self.handle_message(msg, connection).await;
                });
            }
            ConnectionEvent::AuthFailure(reason) => self.on_auth_failure(&session, &reason).await,
            ConnectionEvent::Disconnected(reason) => self.on_disconnected(&session, &reason).await,
            ConnectionEvent::LoggedOut => self.on_remote_logout(&session).await,
        }
    }

    /// The slot's connection, if it is still generation `generation`.
    pub(crate) async fn current_connection(
        &self,
        session: &SessionId,
        generation: u64,
    ) -> Option<Arc<dyn Connection>> {
        self.connections
            .read()
            .await
            .get(session)
            .filter(|slot| slot.generation == generation)
            .map(|slot| slot.connection.clone())
    }

    pub(super) fn bump_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Graceful shutdown: abort background tasks, stop connections.
    async fn shutdown(
        &self,
        reset_handle: &tokio::task::JoinHandle<()>,
        api_handle: &Option<tokio::task::JoinHandle<()>>,
        qr_handle: &Option<tokio::task::JoinHandle<()>>,
    ) {
        info!("Shutting down...");

        reset_handle.abort();
        if let Some(h) = api_handle {
            h.abort();
        }
        if let Some(h) = qr_handle {
            h.abort();
        }

        self.pending_recreate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        let slots: Vec<(SessionId, ConnectionSlot)> =
            self.connections.write().await.drain().collect();
        for (id, slot) in slots {
            if let Err(e) = slot.connection.stop().await {
                warn!("[{id}] failed to stop connection: {e}");
            }
        }

        info!("Shutdown complete.");
    }
}
