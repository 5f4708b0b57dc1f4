//! Commands exposed to the UI: keyword and default-message management,
//! reset control and session snapshots.

use super::{Gateway, UiView};
use autoreply_core::{
    error::AutoReplyError,
    rules::{KeywordRule, KeywordRulePatch},
    session::{SessionId, SessionStatus},
};
use serde::Serialize;
use tracing::{info, warn};

/// Point-in-time view of a session for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub label: String,
    pub status: SessionStatus,
    pub keywords: usize,
    pub greeted_contacts: usize,
    #[serde(flatten)]
    pub view: UiView,
}

impl Gateway {
    pub async fn get_keywords(&self, id: &SessionId) -> Result<Vec<KeywordRule>, AutoReplyError> {
        let session = self.registry.get(id)?;
        let state = session.lock().await;
        Ok(state.keywords.clone())
    }

    /// Append a rule and return the updated list.
    pub async fn add_keyword(
        &self,
        id: &SessionId,
        rule: KeywordRule,
    ) -> Result<Vec<KeywordRule>, AutoReplyError> {
        let session = self.registry.get(id)?;
        let mut state = session.lock().await;
        info!("[{id}] adding keyword '{}'", rule.keyword);
        state.keywords.push(rule);
        self.registry.persist_keywords(&state).await;
        Ok(state.keywords.clone())
    }

    /// Patch the rule at `index`. An out-of-range index leaves the list unchanged.
    pub async fn edit_keyword(
        &self,
        id: &SessionId,
        index: usize,
        patch: KeywordRulePatch,
    ) -> Result<Vec<KeywordRule>, AutoReplyError> {
        let session = self.registry.get(id)?;
        let mut state = session.lock().await;
        match state.keywords.get_mut(index) {
            Some(rule) => {
                rule.apply(patch);
                info!("[{id}] edited keyword #{index} ('{}')", rule.keyword);
                self.registry.persist_keywords(&state).await;
            }
            None => warn!("[{id}] edit ignored: no keyword at index {index}"),
        }
        Ok(state.keywords.clone())
    }

    /// Remove the rule at `index`. An out-of-range index leaves the list unchanged.
    pub async fn delete_keyword(
        &self,
        id: &SessionId,
        index: usize,
    ) -> Result<Vec<KeywordRule>, AutoReplyError> {
        let session = self.registry.get(id)?;
        let mut state = session.lock().await;
        if index < state.keywords.len() {
            let removed = state.keywords.remove(index);
            info!("[{id}] deleted keyword '{}'", removed.keyword);
            self.registry.persist_keywords(&state).await;
        } else {
            warn!("[{id}] delete ignored: no keyword at index {index}");
        }
        Ok(state.keywords.clone())
    }

    pub async fn get_default_message(&self, id: &SessionId) -> Result<String, AutoReplyError> {
        let session = self.registry.get(id)?;
        let state = session.lock().await;
        Ok(state.default_message.clone())
    }

    pub async fn set_default_message(
        &self,
        id: &SessionId,
        message: String,
    ) -> Result<String, AutoReplyError> {
        let session = self.registry.get(id)?;
        let mut state = session.lock().await;
        state.default_message = message;
        self.registry.persist_default_message(&state).await;
        info!("[{id}] default message updated");
        Ok(state.default_message.clone())
    }

    /// Forget who was greeted so everyone receives the default message again.
    pub async fn reset_default_message(&self, id: &SessionId) -> Result<bool, AutoReplyError> {
        self.registry.reset(id).await?;
        Ok(true)
    }

    /// Change the reset period. Returns the new period in milliseconds.
    pub fn set_reset_interval(&self, minutes: u64) -> Result<u64, AutoReplyError> {
        self.reset.set_minutes(minutes)
    }

    pub fn reset_interval_ms(&self) -> u64 {
        self.reset.period().as_millis() as u64
    }

    pub async fn snapshot(&self, id: &SessionId) -> Result<SessionSnapshot, AutoReplyError> {
        let session = self.registry.get(id)?;
        let state = session.lock().await;
        Ok(SessionSnapshot {
            id: state.id.clone(),
            label: state.label.clone(),
            status: state.status,
            keywords: state.keywords.len(),
            greeted_contacts: state.sent_defaults.len(),
            view: self.tracker.view(id),
        })
    }

    pub async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let mut out = Vec::new();
        for id in self.registry.ids() {
            if let Ok(snapshot) = self.snapshot(&id).await {
                out.push(snapshot);
            }
        }
        out
    }
}
