//! WhatsApp connection: pure Rust implementation via `whatsapp-rust`.
//!
//! Uses the WhatsApp Web protocol (Noise handshake + Signal encryption).
//! Pairing is done by scanning a QR code, like WhatsApp Web.
//! Each session slot persists its keys to `{data_dir}/sessions/{id}/whatsapp.db`.

mod bot;
mod connection;
mod events;
mod send;

use autoreply_core::config::WhatsAppConfig;
use autoreply_core::session::SessionId;
use autoreply_core::traits::{Connection, ConnectionFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use whatsapp_rust::client::Client;
use whatsapp_rust_sqlite_storage::SqliteStore;

/// One WhatsApp account linked to a session slot.
pub struct WhatsAppConnection {
    pub(super) session: SessionId,
    pub(super) config: WhatsAppConfig,
    /// Directory holding this slot's authentication material.
    pub(super) session_dir: PathBuf,
    /// Client handle for sending messages, set once connected.
    pub(super) client: Arc<Mutex<Option<Arc<Client>>>>,
    /// Key store of the running bot, used to read the linked identity.
    pub(super) backend: Mutex<Option<Arc<SqliteStore>>>,
    /// Background task driving the bot.
    pub(super) bot_task: Mutex<Option<tokio::task::AbortHandle>>,
}

impl WhatsAppConnection {
    pub fn new(session: SessionId, config: WhatsAppConfig, data_dir: &Path) -> Self {
        let session_dir = data_dir.join("sessions").join(session.as_str());
        Self {
            session,
            config,
            session_dir,
            client: Arc::new(Mutex::new(None)),
            backend: Mutex::new(None),
            bot_task: Mutex::new(None),
        }
    }

    /// Get the session database path, creating its directory.
    pub(super) fn session_db_path(&self) -> std::io::Result<String> {
        std::fs::create_dir_all(&self.session_dir)?;
        Ok(self
            .session_dir
            .join("whatsapp.db")
            .to_string_lossy()
            .into_owned())
    }

    /// Abort the bot task and drop the client.
    pub(super) async fn shutdown_bot(&self) {
        if let Some(handle) = self.bot_task.lock().await.take() {
            handle.abort();
        }
        *self.client.lock().await = None;
        *self.backend.lock().await = None;
    }
}

/// Builds a fresh [`WhatsAppConnection`] per session slot.
pub struct WhatsAppFactory {
    config: WhatsAppConfig,
    data_dir: PathBuf,
}

impl WhatsAppFactory {
    pub fn new(config: WhatsAppConfig, data_dir: PathBuf) -> Self {
        Self { config, data_dir }
    }
}

impl ConnectionFactory for WhatsAppFactory {
    fn create(&self, session: &SessionId) -> Arc<dyn Connection> {
        Arc::new(WhatsAppConnection::new(
            session.clone(),
            self.config.clone(),
            &self.data_dir,
        ))
    }
}
