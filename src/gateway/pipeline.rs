//! Inbound message handling: keyword replies first, then the default message.

use super::Gateway;
use autoreply_core::{
    error::AutoReplyError,
    message::{InboundMessage, MessageKind},
    rules::{format_response, match_rule, KeywordRule, Reply},
    traits::Connection,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Group traffic is never answered.
    IgnoredGroup,
    UnknownSession,
    KeywordReplied,
    DefaultSent,
    /// Contact was already greeted during this epoch.
    AlreadyGreeted,
    /// No keyword matched and no default applies (non-chat kind or blank message).
    NoReply,
    SendFailed,
}

impl Gateway {
    pub(crate) async fn handle_message(
        &self,
        msg: InboundMessage,
        connection: Arc<dyn Connection>,
    ) -> Outcome {
        if msg.is_from_group() {
            debug!("[{}] ignoring group message from {}", msg.session, msg.chat);
            return Outcome::IgnoredGroup;
        }

        let session = match self.registry.get(&msg.session) {
            Ok(session) => session,
            Err(e) => {
                warn!("dropping message: {e}");
                return Outcome::UnknownSession;
            }
        };
        let mut state = session.lock().await;

        if let Some(rule) = match_rule(&state.keywords, &msg.text).cloned() {
            drop(state);
            info!(
                "[{}] keyword '{}' matched message from {}",
                msg.session, rule.keyword, msg.from
            );
            return match send_keyword_reply(connection.as_ref(), &msg, &rule).await {
                Ok(()) => Outcome::KeywordReplied,
                Err(e) => {
                    error!("[{}] keyword reply to {} failed: {e}", msg.session, msg.from);
                    Outcome::SendFailed
                }
            };
        }

        if msg.kind != MessageKind::Chat {
            return Outcome::NoReply;
        }
        if !state.should_send_default(&msg.from) {
            debug!("[{}] {} already greeted this epoch", msg.session, msg.from);
            return Outcome::AlreadyGreeted;
        }
        if state.default_message.trim().is_empty() {
            debug!("[{}] no default message configured", msg.session);
            return Outcome::NoReply;
        }

        // The lock stays held until the contact is recorded, so concurrent
        // messages from the same contact cannot both get the greeting.
        let text = state.default_message.clone();
        match connection.reply(&msg, &text).await {
            Ok(()) => {
                self.registry.record_sent(&mut state, &msg.from).await;
                info!("[{}] default message sent to {}", msg.session, msg.from);
                Outcome::DefaultSent
            }
            Err(e) => {
                error!(
                    "[{}] default message to {} failed: {e}",
                    msg.session, msg.from
                );
                Outcome::SendFailed
            }
        }
    }
}

/// Send the reply a rule produces. A rule whose image cannot be decoded
/// falls back to its text.
async fn send_keyword_reply(
    connection: &dyn Connection,
    msg: &InboundMessage,
    rule: &KeywordRule,
) -> Result<(), AutoReplyError> {
    let reply = rule.reply().unwrap_or_else(|e| {
        warn!(
            "[{}] keyword '{}' has an unusable image, replying with text: {e}",
            msg.session, rule.keyword
        );
        Reply::Text(format_response(&rule.response))
    });

    match reply {
        Reply::Text(text) => connection.reply(msg, &text).await,
        Reply::Media { media, caption } => connection.send_media(&msg.chat, &media, &caption).await,
    }
}
