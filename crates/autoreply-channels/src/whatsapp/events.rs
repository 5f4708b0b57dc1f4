//! Incoming WhatsApp message handling: filtering, unwrapping, and classification.

use autoreply_core::message::{InboundMessage, MessageKind};
use autoreply_core::session::SessionId;
use tracing::debug;
use uuid::Uuid;
use waproto::whatsapp::Message;

/// Translate a library message event into an [`InboundMessage`].
///
/// Returns `None` for our own messages. Group messages are forwarded with
/// `is_group` set; the coordinator decides what to do with them.
pub(super) fn to_inbound(
    session: &SessionId,
    msg: Message,
    info: wacore::types::message::MessageInfo,
) -> Option<InboundMessage> {
    if info.source.is_from_me {
        debug!("[{session}] WA filtered: own message {}", info.id);
        return None;
    }

    let (kind, text) = classify(unwrap_message(&msg));
    let from = info.source.sender.to_string();
    let sender_name = if info.push_name.is_empty() {
        None
    } else {
        Some(info.push_name.clone())
    };

    Some(InboundMessage {
        id: Uuid::new_v4(),
        platform_id: Some(info.id.clone()),
        session: session.clone(),
        from,
        chat: info.source.chat.to_string(),
        sender_name,
        text,
        kind,
        is_group: info.source.is_group,
        timestamp: chrono::Utc::now(),
    })
}

/// Unwrap nested wrappers (device_sent, ephemeral, view_once).
fn unwrap_message(msg: &Message) -> &Message {
    msg.device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg)
}

/// Message type and body text (caption for media).
fn classify(inner: &Message) -> (MessageKind, String) {
    if let Some(text) = inner.conversation.as_deref().or_else(|| {
        inner
            .extended_text_message
            .as_ref()
            .and_then(|e| e.text.as_deref())
    }) {
        return (MessageKind::Chat, text.to_string());
    }
    if let Some(ref img) = inner.image_message {
        return (MessageKind::Image, img.caption.clone().unwrap_or_default());
    }
    if let Some(ref video) = inner.video_message {
        return (MessageKind::Video, video.caption.clone().unwrap_or_default());
    }
    if let Some(ref doc) = inner.document_message {
        return (MessageKind::Document, doc.caption.clone().unwrap_or_default());
    }
    if inner.audio_message.is_some() {
        return (MessageKind::Audio, String::new());
    }
    if inner.sticker_message.is_some() {
        return (MessageKind::Sticker, String::new());
    }
    if inner.protocol_message.is_some() || inner.reaction_message.is_some() {
        return (MessageKind::System, String::new());
    }
    (MessageKind::Other, String::new())
}
