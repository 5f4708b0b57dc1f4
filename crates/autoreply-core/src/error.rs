use thiserror::Error;

/// Top-level error type for autoreply.
#[derive(Debug, Error)]
pub enum AutoReplyError {
    /// Error from a session connection (send, auth, transport).
    #[error("connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persistent store error.
    #[error("store error: {0}")]
    Store(String),

    /// No session with this identifier is configured.
    #[error("unknown session: {0}")]
    SessionNotFound(String),

    /// A keyword rule image is not a usable `data:` URI.
    #[error("invalid media: {0}")]
    InvalidMedia(String),

    /// A reset interval that cannot be scheduled.
    #[error("invalid reset interval: {0}")]
    InvalidInterval(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
