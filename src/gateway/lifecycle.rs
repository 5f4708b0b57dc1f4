//! Connection lifecycle: start, pairing, readiness, failures and logout.

use super::{ConnectionSlot, Gateway, SessionEvent, UiEvent};
use autoreply_core::{
    error::AutoReplyError,
    session::{SessionId, SessionStatus},
    traits::Connection,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl Gateway {
    /// Create a fresh connection for `id`, install it as the slot's current
    /// generation and forward its events into the gateway loop.
    ///
    /// A connection it replaces is stopped. A start failure is logged and
    /// leaves the slot without a running connection until the next logout.
    pub(crate) async fn start_session(&self, id: &SessionId) {
        let connection = self.factory.create(id);
        let generation = self.bump_generation();
        let replaced = self.connections.write().await.insert(
            id.clone(),
            ConnectionSlot {
                connection: connection.clone(),
                generation,
            },
        );
        if let Some(old) = replaced {
            info!("[{id}] stopping replaced connection #{}", old.generation);
            if let Err(e) = old.connection.stop().await {
                warn!("[{id}] failed to stop replaced connection: {e}");
            }
        }

        let mut rx = match connection.start().await {
            Ok(rx) => rx,
            Err(e) => {
                error!("[{id}] failed to start connection: {e}");
                self.emit(UiEvent::Status {
                    session: id.clone(),
                    text: Some(format!("Connection failed: {e}")),
                });
                return;
            }
        };

        let tx = self.events_tx.clone();
        let session = id.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let tagged = SessionEvent {
                    session: session.clone(),
                    generation,
                    event,
                };
                if tx.send(tagged).await.is_err() {
                    info!("[{session}] gateway receiver dropped, stopping forwarder");
                    break;
                }
            }
        });

        info!("[{id}] connection #{generation} started");
    }

    async fn set_status(&self, id: &SessionId, apply: impl FnOnce(SessionStatus) -> SessionStatus) {
        if let Ok(session) = self.registry.get(id) {
            let mut state = session.lock().await;
            state.status = apply(state.status);
        }
    }

    async fn label(&self, id: &SessionId) -> String {
        match self.registry.get(id) {
            Ok(session) => session.lock().await.label.clone(),
            Err(_) => id.to_string(),
        }
    }

    pub(super) async fn on_qr(&self, id: &SessionId, code: String) {
        self.set_status(id, SessionStatus::on_qr).await;
        let label = self.label(id).await;
        info!("[{id}] QR code received, waiting for scan");
        self.emit(UiEvent::Qr {
            session: id.clone(),
            code,
        });
        self.emit(UiEvent::ShowQr {
            session: id.clone(),
        });
        self.emit(UiEvent::Status {
            session: id.clone(),
            text: Some(format!("Scan the QR code to link {label}")),
        });
    }

    pub(super) async fn on_ready(&self, id: &SessionId) {
        self.set_status(id, SessionStatus::on_ready).await;
        info!("[{id}] session ready");
        self.emit(UiEvent::HideQr {
            session: id.clone(),
        });
        self.emit(UiEvent::Status {
            session: id.clone(),
            text: None,
        });
    }

    /// Fetch the linked account's identity and publish it. Best-effort.
    pub(super) async fn refresh_profile(&self, id: &SessionId, connection: Arc<dyn Connection>) {
        let mut profile = match connection.profile().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("[{id}] failed to read profile: {e}");
                return;
            }
        };
        profile.profile_pic = match connection.profile_picture_url(&profile.user).await {
            Ok(url) => url,
            Err(e) => {
                warn!("[{id}] failed to fetch profile picture: {e}");
                None
            }
        };
        info!(
            "[{id}] linked as {} ({})",
            profile.user,
            profile.name.as_deref().unwrap_or("no name")
        );
        self.emit(UiEvent::Profile {
            session: id.clone(),
            info: profile,
        });
        self.emit(UiEvent::ShowProfile {
            session: id.clone(),
        });
    }

    pub(super) async fn on_auth_failure(&self, id: &SessionId, reason: &str) {
        error!("[{id}] authentication failed: {reason}");
        self.set_status(id, SessionStatus::on_logout).await;
        self.emit(UiEvent::Status {
            session: id.clone(),
            text: Some(format!("Authentication failed: {reason}")),
        });
    }

    pub(super) async fn on_disconnected(&self, id: &SessionId, reason: &str) {
        warn!("[{id}] disconnected: {reason}");
        self.set_status(id, SessionStatus::on_logout).await;
        self.emit(UiEvent::Status {
            session: id.clone(),
            text: Some(format!("Disconnected: {reason}")),
        });
    }

    /// The account was unlinked from the phone.
    pub(super) async fn on_remote_logout(&self, id: &SessionId) {
        warn!("[{id}] logged out by the linked device");
        self.set_status(id, SessionStatus::on_logout).await;
        self.emit(UiEvent::Status {
            session: id.clone(),
            text: Some("Logged out from the phone. Log out here to link again.".into()),
        });
        self.emit(UiEvent::HideProfile {
            session: id.clone(),
        });
    }

    /// Tear down the slot's connection, wipe its authentication material and
    /// schedule a fresh connection after the configured delay.
    ///
    /// Returns once teardown is done; the replacement starts in the background.
    /// A later logout supersedes a recreate that has not started yet, so the
    /// slot never ends up with two connections.
    pub async fn logout(self: &Arc<Self>, id: &SessionId) -> Result<(), AutoReplyError> {
        self.registry.get(id)?;

        // Retire the current generation before tearing it down so its late
        // events are dropped.
        let previous = self.connections.write().await.remove(id);
        if let Some(slot) = previous {
            info!("[{id}] logging out connection #{}", slot.generation);
            if let Err(e) = slot.connection.logout().await {
                error!("[{id}] logout failed: {e}");
            }
        }

        self.set_status(id, SessionStatus::on_logout).await;
        self.emit(UiEvent::Status {
            session: id.clone(),
            text: Some("Logged out. Scan the QR code again.".into()),
        });
        self.emit(UiEvent::HideProfile {
            session: id.clone(),
        });

        self.registry.reset(id).await?;

        let token = self.bump_generation();
        self.pending_recreate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id.clone(), token);

        let gateway = self.clone();
        let session = id.clone();
        let delay = self.recreate_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !gateway.claim_recreate(&session, token) {
                debug!("[{session}] recreate superseded by a later logout");
                return;
            }
            info!("[{session}] recreating connection");
            gateway.start_session(&session).await;
        });
        Ok(())
    }

    /// Take the slot's pending recreate if it is still `token`.
    fn claim_recreate(&self, id: &SessionId, token: u64) -> bool {
        let mut pending = self
            .pending_recreate
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        if pending.get(id) == Some(&token) {
            pending.remove(id);
            true
        } else {
            false
        }
    }
}
