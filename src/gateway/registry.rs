//! Per-session state and the default-message dispatcher.
//!
//! Every session slot owns one [`SessionState`] behind its own async mutex.
//! Mutations are persisted through the [`JsonStore`] before the lock is
//! released, so disk and memory agree for anyone who takes the lock next.

use autoreply_core::{
    config::SessionConfig,
    error::AutoReplyError,
    rules::KeywordRule,
    session::{SessionId, SessionStatus},
};
use autoreply_store::{JsonStore, StoreError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Mutable state of one session slot.
#[derive(Debug)]
pub struct SessionState {
    pub id: SessionId,
    pub label: String,
    pub status: SessionStatus,
    pub keywords: Vec<KeywordRule>,
    pub default_message: String,
    /// Contacts greeted with the default message during the current reset epoch.
    pub sent_defaults: HashSet<String>,
}

impl SessionState {
    /// Whether `contact` has not been greeted yet in this epoch.
    pub fn should_send_default(&self, contact: &str) -> bool {
        !self.sent_defaults.contains(contact)
    }
}

/// All session slots, keyed by id.
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Arc<Mutex<SessionState>>>,
    store: JsonStore,
}

impl SessionRegistry {
    /// Seed missing records and load every configured session from disk.
    pub async fn load(store: JsonStore, configs: &[SessionConfig]) -> Result<Self, StoreError> {
        let mut sessions = BTreeMap::new();
        for cfg in configs {
            store.seed(&cfg.id, &cfg.default_message).await?;
            let records = store.load_session(&cfg.id).await;
            info!(
                "[{}] loaded {} keyword(s), {} greeted contact(s)",
                cfg.id,
                records.keywords.len(),
                records.sent_defaults.len()
            );
            let state = SessionState {
                id: cfg.id.clone(),
                label: cfg.display_label().to_string(),
                status: SessionStatus::default(),
                keywords: records.keywords,
                default_message: records.default_message,
                sent_defaults: records.sent_defaults,
            };
            sessions.insert(cfg.id.clone(), Arc::new(Mutex::new(state)));
        }
        Ok(Self { sessions, store })
    }

    pub fn get(&self, id: &SessionId) -> Result<Arc<Mutex<SessionState>>, AutoReplyError> {
        self.sessions
            .get(id)
            .cloned()
            .ok_or_else(|| AutoReplyError::SessionNotFound(id.to_string()))
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    // --- persistence helpers, called with the session lock held ---

    pub(crate) async fn persist_keywords(&self, state: &SessionState) {
        if let Err(e) = self.store.save_keywords(&state.id, &state.keywords).await {
            error!("[{}] failed to persist keywords: {e}", state.id);
        }
    }

    pub(crate) async fn persist_default_message(&self, state: &SessionState) {
        if let Err(e) = self
            .store
            .save_default_message(&state.id, &state.default_message)
            .await
        {
            error!("[{}] failed to persist default message: {e}", state.id);
        }
    }

    pub(crate) async fn persist_sent_defaults(&self, state: &SessionState) {
        if let Err(e) = self
            .store
            .save_sent_defaults(&state.id, &state.sent_defaults)
            .await
        {
            error!("[{}] failed to persist sent defaults: {e}", state.id);
        }
    }

    // --- default-message dispatcher ---

    pub async fn should_send_default(
        &self,
        id: &SessionId,
        contact: &str,
    ) -> Result<bool, AutoReplyError> {
        let session = self.get(id)?;
        let state = session.lock().await;
        Ok(state.should_send_default(contact))
    }

    /// Record that `contact` received the default message and persist the set.
    pub async fn mark_sent(&self, id: &SessionId, contact: &str) -> Result<(), AutoReplyError> {
        let session = self.get(id)?;
        let mut state = session.lock().await;
        self.record_sent(&mut state, contact).await;
        Ok(())
    }

    pub(crate) async fn record_sent(&self, state: &mut SessionState, contact: &str) {
        if state.sent_defaults.insert(contact.to_string()) {
            self.persist_sent_defaults(state).await;
        }
    }

    /// Start a new epoch for one session: clear and persist its sent set.
    pub async fn reset(&self, id: &SessionId) -> Result<(), AutoReplyError> {
        let session = self.get(id)?;
        let mut state = session.lock().await;
        state.sent_defaults.clear();
        self.persist_sent_defaults(&state).await;
        info!("[{id}] default-message tracking reset");
        Ok(())
    }

    /// Clear every session's sent set.
    pub async fn reset_all(&self) {
        for session in self.sessions.values() {
            let mut state = session.lock().await;
            state.sent_defaults.clear();
            self.persist_sent_defaults(&state).await;
        }
        info!("default-message tracking reset for all sessions");
    }
}
