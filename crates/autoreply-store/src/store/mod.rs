//! File-backed JSON store.
//!
//! One file per record kind per session under the data directory:
//! - `keywords_<session>.json`: ordered array of keyword rules
//! - `default_message_<session>.json`: `{ "message": "..." }`
//! - `sent_defaults_<session>.json`: array of contact ids
//!
//! Loads never fail: a missing or unreadable file yields the kind's fallback.
//! Saves are durable before they return and are serialized per file.

mod records;

#[cfg(test)]
mod tests;

pub use records::SessionRecords;

use autoreply_core::{error::AutoReplyError, session::SessionId};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors raised while writing records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<StoreError> for AutoReplyError {
    fn from(e: StoreError) -> Self {
        AutoReplyError::Store(e.to_string())
    }
}

/// The three record kinds kept per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Keywords,
    DefaultMessage,
    SentDefaults,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [Self::Keywords, Self::DefaultMessage, Self::SentDefaults];

    fn file_prefix(&self) -> &'static str {
        match self {
            Self::Keywords => "keywords",
            Self::DefaultMessage => "default_message",
            Self::SentDefaults => "sent_defaults",
        }
    }

    /// File name for this kind in `session`.
    pub fn file_name(&self, session: &SessionId) -> String {
        format!("{}_{}.json", self.file_prefix(), session)
    }
}

/// JSON store rooted at a data directory.
#[derive(Clone)]
pub struct JsonStore {
    dir: PathBuf,
    /// One write lock per file path.
    locks: Arc<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl JsonStore {
    /// Open a store, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        Ok(Self {
            dir,
            locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        })
    }

    /// Path of the file holding `kind` for `session`.
    pub fn path(&self, kind: RecordKind, session: &SessionId) -> PathBuf {
        self.dir.join(kind.file_name(session))
    }

    /// Whether a record file exists.
    pub async fn exists(&self, kind: RecordKind, session: &SessionId) -> bool {
        tokio::fs::try_exists(self.path(kind, session))
            .await
            .unwrap_or(false)
    }

    /// Load a record, returning `fallback` on any read or decode failure.
    pub async fn load<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        session: &SessionId,
        fallback: T,
    ) -> T {
        let path = self.path(kind, session);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("store: {} not found, using fallback", path.display());
                return fallback;
            }
            Err(e) => {
                warn!("store: failed to read {}: {e}", path.display());
                return fallback;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!("store: failed to parse {}: {e}", path.display());
                fallback
            }
        }
    }

    /// Write a record. The data is on disk when this returns.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        kind: RecordKind,
        session: &SessionId,
        value: &T,
    ) -> Result<(), StoreError> {
        let path = self.path(kind, session);
        let json = serde_json::to_vec_pretty(value)?;

        let lock = self.lock_for(&path);
        let _guard = lock.lock().await;

        let tmp = path.with_extension("json.tmp");
        write_synced(&tmp, &json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        debug!("store: wrote {}", path.display());
        Ok(())
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
