//! Notifications for the UI collaborator.
//!
//! The gateway publishes [`UiEvent`]s on a broadcast channel. Two consumers
//! ship with the binary: [`UiTracker`], which folds them into per-session views
//! served by the HTTP API, and the terminal QR printer.

use autoreply_channels::generate_qr_terminal;
use autoreply_core::{message::ProfileInfo, session::SessionId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Qr { session: SessionId, code: String },
    Status { session: SessionId, text: Option<String> },
    Profile { session: SessionId, info: ProfileInfo },
    ShowQr { session: SessionId },
    HideQr { session: SessionId },
    ShowProfile { session: SessionId },
    HideProfile { session: SessionId },
}

impl UiEvent {
    pub fn session(&self) -> &SessionId {
        match self {
            Self::Qr { session, .. }
            | Self::Status { session, .. }
            | Self::Profile { session, .. }
            | Self::ShowQr { session }
            | Self::HideQr { session }
            | Self::ShowProfile { session }
            | Self::HideProfile { session } => session,
        }
    }
}

/// What the UI currently shows for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiView {
    pub qr: Option<String>,
    pub qr_visible: bool,
    pub status_text: Option<String>,
    pub profile: Option<ProfileInfo>,
    pub profile_visible: bool,
}

impl UiView {
    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Qr { code, .. } => self.qr = Some(code),
            UiEvent::Status { text, .. } => self.status_text = text,
            UiEvent::Profile { info, .. } => self.profile = Some(info),
            UiEvent::ShowQr { .. } => self.qr_visible = true,
            UiEvent::HideQr { .. } => {
                self.qr_visible = false;
                self.qr = None;
            }
            UiEvent::ShowProfile { .. } => self.profile_visible = true,
            UiEvent::HideProfile { .. } => {
                self.profile_visible = false;
                self.profile = None;
            }
        }
    }
}

/// Latest [`UiView`] per session.
#[derive(Clone, Default)]
pub struct UiTracker {
    views: Arc<RwLock<HashMap<SessionId, UiView>>>,
}

impl UiTracker {
    pub fn apply(&self, event: UiEvent) {
        let mut views = self.views.write().unwrap_or_else(|p| p.into_inner());
        views
            .entry(event.session().clone())
            .or_default()
            .apply(event);
    }

    pub fn view(&self, session: &SessionId) -> UiView {
        let views = self.views.read().unwrap_or_else(|p| p.into_inner());
        views.get(session).cloned().unwrap_or_default()
    }

    /// Fold events into the tracker until the channel closes.
    pub async fn follow(self, mut rx: broadcast::Receiver<UiEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.apply(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("ui tracker lagged, skipped {n} event(s)");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Print every QR code to the terminal, labelled with its session.
pub async fn print_qr_codes(
    mut rx: broadcast::Receiver<UiEvent>,
    labels: HashMap<SessionId, String>,
) {
    loop {
        match rx.recv().await {
            Ok(UiEvent::Qr { session, code }) => {
                let label = labels
                    .get(&session)
                    .map(String::as_str)
                    .unwrap_or(session.as_str());
                match generate_qr_terminal(&code) {
                    Ok(qr) => println!("\nScan with WhatsApp to link {label}:\n{qr}"),
                    Err(e) => warn!("[{session}] failed to render QR code: {e}"),
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!("qr printer lagged, skipped {n} event(s)");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        SessionId::from("session1")
    }

    #[test]
    fn test_qr_then_hide_clears_code() {
        let tracker = UiTracker::default();
        tracker.apply(UiEvent::Qr { session: sid(), code: "2@abc".into() });
        tracker.apply(UiEvent::ShowQr { session: sid() });
        let view = tracker.view(&sid());
        assert_eq!(view.qr.as_deref(), Some("2@abc"));
        assert!(view.qr_visible);

        tracker.apply(UiEvent::HideQr { session: sid() });
        let view = tracker.view(&sid());
        assert!(view.qr.is_none());
        assert!(!view.qr_visible);
    }

    #[test]
    fn test_profile_shown_and_hidden() {
        let tracker = UiTracker::default();
        let info = ProfileInfo {
            user: "628111".into(),
            name: Some("Toko".into()),
            ..Default::default()
        };
        tracker.apply(UiEvent::Profile { session: sid(), info: info.clone() });
        tracker.apply(UiEvent::ShowProfile { session: sid() });
        assert_eq!(tracker.view(&sid()).profile, Some(info));

        tracker.apply(UiEvent::HideProfile { session: sid() });
        let view = tracker.view(&sid());
        assert!(view.profile.is_none());
        assert!(!view.profile_visible);
    }

    #[test]
    fn test_views_are_per_session() {
        let tracker = UiTracker::default();
        tracker.apply(UiEvent::Status { session: sid(), text: Some("hi".into()) });
        assert_eq!(tracker.view(&SessionId::from("session2")), UiView::default());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(UiEvent::HideQr { session: sid() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "hide_qr", "session": "session1"}));
    }

    #[tokio::test]
    async fn test_follow_consumes_broadcast() {
        let (tx, rx) = broadcast::channel(8);
        let tracker = UiTracker::default();
        let task = tokio::spawn(tracker.clone().follow(rx));
        tx.send(UiEvent::Status { session: sid(), text: Some("ready".into()) })
            .unwrap();
        drop(tx);
        task.await.unwrap();
        assert_eq!(tracker.view(&sid()).status_text.as_deref(), Some("ready"));
    }
}
