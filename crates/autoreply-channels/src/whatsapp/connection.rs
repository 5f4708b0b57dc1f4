//! Connection trait implementation for WhatsApp.

use super::send::{parse_jid, reply_message, retry_send, upload_media_message};
use super::WhatsAppConnection;
use async_trait::async_trait;
use autoreply_core::{
    error::AutoReplyError,
    message::{ConnectionEvent, InboundMessage, MediaPayload, ProfileInfo},
    session::SessionId,
    traits::Connection,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use wacore::store::traits::DeviceStore;
use whatsapp_rust::client::Client;

impl WhatsAppConnection {
    async fn connected_client(&self) -> Result<Arc<Client>, AutoReplyError> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| AutoReplyError::Connection("whatsapp client not connected".into()))
    }
}

/// Account JIDs are stored as bare phone numbers; queries need the full form.
fn user_jid(user: &str) -> String {
    if user.contains('@') {
        user.to_string()
    } else {
        format!("{user}@s.whatsapp.net")
    }
}

#[async_trait]
impl Connection for WhatsAppConnection {
    fn session(&self) -> &SessionId {
        &self.session
    }

    async fn start(&self) -> Result<mpsc::Receiver<ConnectionEvent>, AutoReplyError> {
        let (tx, rx) = mpsc::channel(64);
        self.build_and_run_bot(tx).await?;
        info!("[{}] WhatsApp connection started", self.session);
        Ok(rx)
    }

    async fn reply(&self, to: &InboundMessage, text: &str) -> Result<(), AutoReplyError> {
        let client = self.connected_client().await?;
        let jid = parse_jid(&to.chat)?;
        retry_send(&client, &jid, reply_message(to, text)).await?;
        Ok(())
    }

    async fn send_media(
        &self,
        to: &str,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<(), AutoReplyError> {
        let client = self.connected_client().await?;
        let jid = parse_jid(to)?;
        let msg = upload_media_message(&client, media, caption).await?;
        retry_send(&client, &jid, msg).await?;
        Ok(())
    }

    async fn profile(&self) -> Result<ProfileInfo, AutoReplyError> {
        let backend = self
            .backend
            .lock()
            .await
            .clone()
            .ok_or_else(|| AutoReplyError::Connection("whatsapp store not open".into()))?;
        let device = backend
            .load()
            .await
            .map_err(|e| AutoReplyError::Connection(format!("failed to load device: {e}")))?
            .ok_or_else(|| AutoReplyError::Connection("no linked device yet".into()))?;

        let name = (!device.push_name.is_empty()).then(|| device.push_name.clone());
        // The phone's platform is not reported to linked devices.
        Ok(ProfileInfo {
            user: device.pn.as_ref().map(|jid| jid.user.clone()).unwrap_or_default(),
            name,
            platform: None,
            profile_pic: None,
        })
    }

    async fn profile_picture_url(&self, jid: &str) -> Result<Option<String>, AutoReplyError> {
        let client = self.connected_client().await?;
        let jid = parse_jid(&user_jid(jid))?;
        let picture = client
            .contacts()
            .get_profile_picture(&jid, false)
            .await
            .map_err(|e| AutoReplyError::Connection(format!("profile picture query failed: {e}")))?;
        Ok(picture.map(|p| p.url))
    }

    async fn logout(&self) -> Result<(), AutoReplyError> {
        self.shutdown_bot().await;
        if tokio::fs::try_exists(&self.session_dir).await.unwrap_or(false) {
            info!(
                "[{}] deleting WhatsApp session at {}",
                self.session,
                self.session_dir.display()
            );
            tokio::fs::remove_dir_all(&self.session_dir).await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), AutoReplyError> {
        self.shutdown_bot().await;
        info!("[{}] WhatsApp connection stopped", self.session);
        Ok(())
    }
}
