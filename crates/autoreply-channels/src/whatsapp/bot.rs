//! Bot lifecycle: building and running the WhatsApp bot.

use super::events::to_inbound;
use super::WhatsAppConnection;
use autoreply_core::{error::AutoReplyError, message::ConnectionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wacore::types::events::Event;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_sqlite_storage::SqliteStore;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

impl WhatsAppConnection {
    /// Build a WhatsApp bot with the event handler and run it in the background.
    ///
    /// Library events are translated into [`ConnectionEvent`]s on `tx`.
    pub(super) async fn build_and_run_bot(
        &self,
        tx: mpsc::Sender<ConnectionEvent>,
    ) -> Result<(), AutoReplyError> {
        let db_path = self.session_db_path()?;
        let session = self.session.clone();

        info!("[{session}] WhatsApp bot building (store: {db_path})...");

        let backend = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .map_err(|e| AutoReplyError::Connection(format!("whatsapp store init failed: {e}")))?,
        );
        *self.backend.lock().await = Some(backend.clone());

        let client_handle = self.client.clone();
        let tx_events = tx.clone();
        let session_for_event = session.clone();

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.config.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, client| {
                let tx = tx_events.clone();
                let client_store = client_handle.clone();
                let session = session_for_event.clone();
                async move {
                    let forwarded = match event {
                        Event::PairingQrCode { code, .. } => {
                            info!("[{session}] WhatsApp QR code generated (scan to pair)");
                            Some(ConnectionEvent::QrRequired(code))
                        }
                        Event::PairSuccess(_) => {
                            info!("[{session}] WhatsApp pairing successful");
                            None
                        }
                        Event::Connected(_) => {
                            info!("[{session}] WhatsApp connected");
                            *client_store.lock().await = Some(client);
                            Some(ConnectionEvent::Ready)
                        }
                        Event::Disconnected(_) => {
                            warn!("[{session}] WhatsApp disconnected");
                            *client_store.lock().await = None;
                            Some(ConnectionEvent::Disconnected(
                                "connection closed".to_string(),
                            ))
                        }
                        Event::LoggedOut(_) => {
                            warn!("[{session}] WhatsApp logged out, session invalidated");
                            *client_store.lock().await = None;
                            Some(ConnectionEvent::LoggedOut)
                        }
                        Event::Message(msg, info) => {
                            to_inbound(&session, *msg, info).map(ConnectionEvent::Message)
                        }
                        _ => None,
                    };
                    if let Some(event) = forwarded {
                        if tx.send(event).await.is_err() {
                            debug!("[{session}] connection event receiver dropped");
                        }
                    }
                }
            })
            .build()
            .await
            .map_err(|e| AutoReplyError::Connection(format!("whatsapp bot build failed: {e}")))?;

        let handle = bot
            .run()
            .await
            .map_err(|e| AutoReplyError::Connection(format!("whatsapp bot run failed: {e}")))?;

        *self.bot_task.lock().await = Some(handle.abort_handle());

        // Report when the bot stops on its own so the coordinator can surface it.
        let session_for_task = session.clone();
        tokio::spawn(async move {
            let reason = match handle.await {
                Ok(()) => "bot stopped".to_string(),
                Err(e) if e.is_cancelled() => {
                    debug!("[{session_for_task}] WhatsApp bot aborted");
                    return;
                }
                Err(e) => {
                    error!("[{session_for_task}] WhatsApp bot task error: {e}");
                    format!("bot task failed: {e}")
                }
            };
            let _ = tx.send(ConnectionEvent::Disconnected(reason)).await;
        });

        info!("[{session}] WhatsApp bot started");
        Ok(())
    }
}
