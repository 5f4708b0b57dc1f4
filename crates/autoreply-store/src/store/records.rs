//! Typed accessors for the three record kinds.

use super::{JsonStore, RecordKind, StoreError};
use autoreply_core::{rules::KeywordRule, session::SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// On-disk shape of the default message.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DefaultMessageRecord {
    #[serde(default)]
    message: String,
}

/// Everything persisted for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecords {
    pub keywords: Vec<KeywordRule>,
    pub default_message: String,
    pub sent_defaults: HashSet<String>,
}

impl JsonStore {
    pub async fn load_keywords(&self, session: &SessionId) -> Vec<KeywordRule> {
        self.load(RecordKind::Keywords, session, Vec::new()).await
    }

    pub async fn save_keywords(
        &self,
        session: &SessionId,
        rules: &[KeywordRule],
    ) -> Result<(), StoreError> {
        self.save(RecordKind::Keywords, session, rules).await
    }

    pub async fn load_default_message(&self, session: &SessionId) -> String {
        self.load(
            RecordKind::DefaultMessage,
            session,
            DefaultMessageRecord::default(),
        )
        .await
        .message
    }

    pub async fn save_default_message(
        &self,
        session: &SessionId,
        message: &str,
    ) -> Result<(), StoreError> {
        let record = DefaultMessageRecord {
            message: message.to_string(),
        };
        self.save(RecordKind::DefaultMessage, session, &record).await
    }

    pub async fn load_sent_defaults(&self, session: &SessionId) -> HashSet<String> {
        self.load::<Vec<String>>(RecordKind::SentDefaults, session, Vec::new())
            .await
            .into_iter()
            .collect()
    }

    /// Persist the sent set as a sorted array.
    pub async fn save_sent_defaults(
        &self,
        session: &SessionId,
        sent: &HashSet<String>,
    ) -> Result<(), StoreError> {
        let mut contacts: Vec<&String> = sent.iter().collect();
        contacts.sort();
        self.save(RecordKind::SentDefaults, session, &contacts).await
    }

    /// Write fallback records for every kind that has no file yet.
    ///
    /// `default_message` seeds the default-message record.
    pub async fn seed(&self, session: &SessionId, default_message: &str) -> Result<(), StoreError> {
        for kind in RecordKind::ALL {
            if self.exists(kind, session).await {
                continue;
            }
            match kind {
                RecordKind::Keywords => self.save_keywords(session, &[]).await?,
                RecordKind::DefaultMessage => {
                    self.save_default_message(session, default_message).await?
                }
                RecordKind::SentDefaults => {
                    self.save_sent_defaults(session, &HashSet::new()).await?
                }
            }
            info!("store: seeded {}", kind.file_name(session));
        }
        Ok(())
    }

    /// Load all records for a session.
    pub async fn load_session(&self, session: &SessionId) -> SessionRecords {
        SessionRecords {
            keywords: self.load_keywords(session).await,
            default_message: self.load_default_message(session).await,
            sent_defaults: self.load_sent_defaults(session).await,
        }
    }
}
