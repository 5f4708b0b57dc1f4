use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AutoReplyError;
use crate::session::SessionId;

/// Server suffix of WhatsApp group JIDs.
pub const GROUP_SUFFIX: &str = "@g.us";

/// An incoming message from a session connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    /// Id the platform assigned to the message, used to quote it in replies.
    #[serde(default)]
    pub platform_id: Option<String>,
    /// Session that received the message.
    pub session: SessionId,
    /// Sender identity (e.g. `628111@c.us`). Keys the sent-defaults set.
    pub from: String,
    /// Conversation to reply into. Usually equal to `from` for direct chats.
    pub chat: String,
    /// Human-readable sender name.
    pub sender_name: Option<String>,
    /// Body text, or the caption for media.
    pub text: String,
    pub kind: MessageKind,
    /// Whether this message comes from a group chat.
    #[serde(default)]
    pub is_group: bool,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Build a direct plain-chat message. Connections fill in the rest.
    pub fn chat(session: SessionId, from: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform_id: None,
            session,
            from: from.to_string(),
            chat: from.to_string(),
            sender_name: None,
            text: text.to_string(),
            kind: MessageKind::Chat,
            is_group: from.ends_with(GROUP_SUFFIX),
            timestamp: Utc::now(),
        }
    }

    /// Whether the message originates from a group conversation.
    pub fn is_from_group(&self) -> bool {
        self.is_group || self.from.ends_with(GROUP_SUFFIX) || self.chat.ends_with(GROUP_SUFFIX)
    }
}

/// Message types as reported by the connection.
///
/// Only `Chat` is eligible for the default greeting; the rest are media or
/// notification events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    System,
    Other,
}

/// Decoded binary media ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MediaPayload {
    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self, AutoReplyError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| AutoReplyError::InvalidMedia("missing 'data:' prefix".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AutoReplyError::InvalidMedia("missing ',' separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AutoReplyError::InvalidMedia("only base64 data URIs are supported".into()))?;
        if mime_type.is_empty() {
            return Err(AutoReplyError::InvalidMedia("empty MIME type".into()));
        }
        let data = BASE64
            .decode(payload.trim())
            .map_err(|e| AutoReplyError::InvalidMedia(format!("bad base64 payload: {e}")))?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Identity of the account linked to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// Phone number / user part of the JID.
    pub user: String,
    pub name: Option<String>,
    pub platform: Option<String>,
    pub profile_pic: Option<String>,
}

/// Events a session connection reports to the coordinator.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A fresh QR payload to scan. Earlier payloads have expired.
    QrRequired(String),
    /// Authenticated and able to send.
    Ready,
    Message(InboundMessage),
    AuthFailure(String),
    Disconnected(String),
    /// The linked device was removed from the phone.
    LoggedOut,
}
