use crate::{
    error::AutoReplyError,
    message::{ConnectionEvent, InboundMessage, MediaPayload, ProfileInfo},
    session::SessionId,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Session connection trait: one authenticated messaging account.
///
/// The protocol, QR pairing and key storage live behind this trait; the
/// coordinator only sees events and send operations.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Session slot this connection serves.
    fn session(&self) -> &SessionId;

    /// Start connecting. Returns a receiver that yields lifecycle and message events.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<ConnectionEvent>, AutoReplyError>;

    /// Reply to an inbound message in the same conversation.
    async fn reply(&self, to: &InboundMessage, text: &str) -> Result<(), AutoReplyError>;

    /// Send media with a caption to a contact.
    async fn send_media(
        &self,
        to: &str,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<(), AutoReplyError>;

    /// Identity of the linked account. Only meaningful once ready.
    async fn profile(&self) -> Result<ProfileInfo, AutoReplyError>;

    /// Profile picture URL for a JID, if the account has one.
    async fn profile_picture_url(&self, _jid: &str) -> Result<Option<String>, AutoReplyError> {
        Ok(None)
    }

    /// Terminate the connection and wipe its persisted authentication material.
    async fn logout(&self) -> Result<(), AutoReplyError>;

    /// Graceful shutdown, keeping authentication material.
    async fn stop(&self) -> Result<(), AutoReplyError>;
}

/// Creates fresh, unstarted connections for a session slot.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, session: &SessionId) -> Arc<dyn Connection>;
}
