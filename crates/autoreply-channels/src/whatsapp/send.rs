//! Message sending: retry with backoff and media message construction.

use autoreply_core::{
    error::AutoReplyError,
    message::{InboundMessage, MediaPayload},
};
use std::time::Duration;
use tracing::{error, warn};
use wacore_binary::jid::Jid;
use whatsapp_rust::client::Client;
use whatsapp_rust::download::MediaType;

/// Retry delays for exponential backoff: 500ms, 1s, 2s.
pub(super) const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// Parse a contact or chat identifier into a JID.
pub(super) fn parse_jid(target: &str) -> Result<Jid, AutoReplyError> {
    target
        .parse()
        .map_err(|e| AutoReplyError::Connection(format!("invalid whatsapp JID '{target}': {e}")))
}

/// Send a WhatsApp message, retrying with backoff on failure.
pub(super) async fn retry_send(
    client: &Client,
    jid: &Jid,
    msg: waproto::whatsapp::Message,
) -> Result<String, AutoReplyError> {
    let mut last_err = None;

    for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        match client.send_message(jid.clone(), msg.clone()).await {
            Ok(msg_id) => return Ok(msg_id),
            Err(e) => {
                let attempt_num = attempt + 1;
                if attempt_num < RETRY_DELAYS_MS.len() {
                    warn!(
                        "whatsapp send attempt {attempt_num}/{} failed: {e}, retrying in {delay_ms}ms",
                        RETRY_DELAYS_MS.len()
                    );
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                } else {
                    error!(
                        "whatsapp send attempt {attempt_num}/{} failed: {e}, giving up",
                        RETRY_DELAYS_MS.len()
                    );
                }
                last_err = Some(e);
            }
        }
    }

    Err(AutoReplyError::Connection(format!(
        "whatsapp send failed after {} attempts: {}",
        RETRY_DELAYS_MS.len(),
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Upload `media` and build the message carrying it.
///
/// Images go out as image messages; anything else as a document.
pub(super) async fn upload_media_message(
    client: &Client,
    media: &MediaPayload,
    caption: &str,
) -> Result<waproto::whatsapp::Message, AutoReplyError> {
    use waproto::whatsapp::message::{DocumentMessage, ImageMessage};

    let media_type = if media.is_image() {
        MediaType::Image
    } else {
        MediaType::Document
    };
    let upload = client
        .upload(media.data.clone(), media_type)
        .await
        .map_err(|e| AutoReplyError::Connection(format!("whatsapp media upload failed: {e}")))?;

    let msg = if media.is_image() {
        waproto::whatsapp::Message {
            image_message: Some(Box::new(ImageMessage {
                mimetype: Some(media.mime_type.clone()),
                caption: Some(caption.to_string()),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                ..Default::default()
            })),
            ..Default::default()
        }
    } else {
        waproto::whatsapp::Message {
            document_message: Some(Box::new(DocumentMessage {
                mimetype: Some(media.mime_type.clone()),
                caption: Some(caption.to_string()),
                file_name: Some(document_file_name(&media.mime_type)),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                ..Default::default()
            })),
            ..Default::default()
        }
    };
    Ok(msg)
}

/// Text reply quoting `to` when its platform id is known, plain text otherwise.
pub(super) fn reply_message(to: &InboundMessage, text: &str) -> waproto::whatsapp::Message {
    use waproto::whatsapp::{message::ExtendedTextMessage, ContextInfo, Message};

    let Some(stanza_id) = to.platform_id.clone() else {
        return Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        };
    };
    let quoted = Message {
        conversation: Some(to.text.clone()),
        ..Default::default()
    };
    Message {
        extended_text_message: Some(Box::new(ExtendedTextMessage {
            text: Some(text.to_string()),
            context_info: Some(Box::new(ContextInfo {
                stanza_id: Some(stanza_id),
                participant: Some(to.from.clone()),
                quoted_message: Some(Box::new(quoted)),
                ..Default::default()
            })),
            ..Default::default()
        })),
        ..Default::default()
    }
}

/// File name shown for documents, derived from the MIME subtype.
pub(super) fn document_file_name(mime_type: &str) -> String {
    let ext = mime_type
        .split('/')
        .nth(1)
        .and_then(|sub| sub.split(['+', ';']).next())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin");
    format!("attachment.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_file_name() {
        assert_eq!(document_file_name("application/pdf"), "attachment.pdf");
        assert_eq!(document_file_name("image/svg+xml"), "attachment.svg");
        assert_eq!(document_file_name("weird"), "attachment.bin");
    }

    #[test]
    fn test_parse_jid() {
        assert!(parse_jid("5511999887766@s.whatsapp.net").is_ok());
    }

    #[test]
    fn test_reply_quotes_inbound_message() {
        let mut inbound = InboundMessage::chat(
            autoreply_core::session::SessionId::from("session1"),
            "628111@s.whatsapp.net",
            "halo",
        );
        inbound.platform_id = Some("3EB0ABC".into());

        let msg = reply_message(&inbound, "Hai!");
        assert!(msg.conversation.is_none());
        let ext = msg.extended_text_message.unwrap();
        assert_eq!(ext.text.as_deref(), Some("Hai!"));
        let ctx = ext.context_info.unwrap();
        assert_eq!(ctx.stanza_id.as_deref(), Some("3EB0ABC"));
        assert_eq!(ctx.participant.as_deref(), Some("628111@s.whatsapp.net"));
        assert_eq!(
            ctx.quoted_message.unwrap().conversation.as_deref(),
            Some("halo")
        );
    }

    #[test]
    fn test_reply_without_platform_id_is_plain_text() {
        let inbound = InboundMessage::chat(
            autoreply_core::session::SessionId::from("session1"),
            "628111@s.whatsapp.net",
            "halo",
        );
        let msg = reply_message(&inbound, "Hai!");
        assert_eq!(msg.conversation.as_deref(), Some("Hai!"));
        assert!(msg.extended_text_message.is_none());
    }

    #[test]
    fn test_retry_delays_increase() {
        assert!(RETRY_DELAYS_MS.windows(2).all(|w| w[0] < w[1]));
    }
}
