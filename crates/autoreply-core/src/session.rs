//! Session identity and authentication status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a session slot (e.g. `session1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Authentication status of a session's connection.
///
/// `Unauthenticated -> AwaitingScan -> Ready`, and back to `Unauthenticated`
/// on logout or when the connection reports an auth failure.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    AwaitingScan,
    Ready,
}

impl SessionStatus {
    /// A QR code was issued. Ignored once the session is ready.
    pub fn on_qr(self) -> Self {
        match self {
            Self::Ready => Self::Ready,
            _ => Self::AwaitingScan,
        }
    }

    /// Authentication completed.
    pub fn on_ready(self) -> Self {
        Self::Ready
    }

    /// Logged out, auth failure, or a fresh connection replaced the old one.
    pub fn on_logout(self) -> Self {
        Self::Unauthenticated
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::AwaitingScan => "awaiting_scan",
            Self::Ready => "ready",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lifecycle() {
        let s = SessionStatus::default();
        assert_eq!(s, SessionStatus::Unauthenticated);
        let s = s.on_qr();
        assert_eq!(s, SessionStatus::AwaitingScan);
        // QR codes rotate while waiting.
        let s = s.on_qr();
        assert_eq!(s, SessionStatus::AwaitingScan);
        let s = s.on_ready();
        assert_eq!(s, SessionStatus::Ready);
        let s = s.on_logout();
        assert_eq!(s, SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_stale_qr_does_not_unready() {
        assert_eq!(SessionStatus::Ready.on_qr(), SessionStatus::Ready);
    }

    #[test]
    fn test_session_id_serde_is_plain_string() {
        let id = SessionId::new("session1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"session1\"");
        let back: SessionId = serde_json::from_str("\"session2\"").unwrap();
        assert_eq!(back.as_str(), "session2");
        assert_eq!(back.to_string(), "session2");
    }
}
