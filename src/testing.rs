//! Test doubles shared by the gateway and API tests.

use crate::gateway::{Gateway, SessionRegistry};
use async_trait::async_trait;
use autoreply_core::{
    config::Config,
    error::AutoReplyError,
    message::{ConnectionEvent, InboundMessage, MediaPayload, ProfileInfo},
    session::SessionId,
    traits::{Connection, ConnectionFactory},
};
use autoreply_store::JsonStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Something a mock connection was asked to send.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { to: String, text: String },
    Media { to: String, mime_type: String, caption: String },
}

/// A connection that records sends instead of talking to WhatsApp.
pub struct MockConnection {
    session: SessionId,
    sent: Arc<Mutex<Vec<Sent>>>,
    fail_send: Arc<AtomicBool>,
    fail_picture: AtomicBool,
    // Keeps the event channel open.
    _events: Mutex<Option<mpsc::Sender<ConnectionEvent>>>,
    pub logged_out: AtomicBool,
    pub stopped: AtomicBool,
}

impl MockConnection {
    pub fn new(session: &str) -> Self {
        Self {
            session: SessionId::from(session),
            sent: Arc::new(Mutex::new(Vec::new())),
            fail_send: Arc::new(AtomicBool::new(false)),
            fail_picture: AtomicBool::new(false),
            _events: Mutex::new(None),
            logged_out: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    pub fn fail_profile_pictures(&self) {
        self.fail_picture.store(true, Ordering::SeqCst);
    }

    /// Neither logged out nor stopped.
    pub fn is_live(&self) -> bool {
        !self.logged_out.load(Ordering::SeqCst) && !self.stopped.load(Ordering::SeqCst)
    }

    fn record(&self, sent: Sent) -> Result<(), AutoReplyError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(AutoReplyError::Connection("connection reset".to_string()));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn session(&self) -> &SessionId {
        &self.session
    }

    async fn start(&self) -> Result<mpsc::Receiver<ConnectionEvent>, AutoReplyError> {
        let (tx, rx) = mpsc::channel(16);
        *self._events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn reply(&self, to: &InboundMessage, text: &str) -> Result<(), AutoReplyError> {
        self.record(Sent::Text {
            to: to.chat.clone(),
            text: text.to_string(),
        })
    }

    async fn send_media(
        &self,
        to: &str,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<(), AutoReplyError> {
        self.record(Sent::Media {
            to: to.to_string(),
            mime_type: media.mime_type.clone(),
            caption: caption.to_string(),
        })
    }

    async fn profile(&self) -> Result<ProfileInfo, AutoReplyError> {
        Ok(ProfileInfo {
            user: "628999".to_string(),
            name: Some("Toko Maju".to_string()),
            platform: Some("mock".to_string()),
            profile_pic: None,
        })
    }

    async fn profile_picture_url(&self, jid: &str) -> Result<Option<String>, AutoReplyError> {
        if self.fail_picture.load(Ordering::SeqCst) {
            return Err(AutoReplyError::Connection("picture query timed out".to_string()));
        }
        Ok(Some(format!("https://pps.example.net/{jid}.jpg")))
    }

    async fn logout(&self) -> Result<(), AutoReplyError> {
        self.logged_out.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), AutoReplyError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`MockConnection`]s and remembers them.
#[derive(Default)]
pub struct MockFactory {
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockFactory {
    pub fn created(&self) -> Vec<Arc<MockConnection>> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_for(&self, session: &str) -> Vec<Arc<MockConnection>> {
        self.created()
            .into_iter()
            .filter(|c| c.session.as_str() == session)
            .collect()
    }
}

impl ConnectionFactory for MockFactory {
    fn create(&self, session: &SessionId) -> Arc<dyn Connection> {
        let connection = Arc::new(MockConnection::new(session.as_str()));
        self.created.lock().unwrap().push(connection.clone());
        connection
    }
}

/// A gateway over the default two sessions, persisting into a temp dir.
pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub factory: Arc<MockFactory>,
    pub store: JsonStore,
    pub _dir: tempfile::TempDir,
}

pub async fn harness() -> Harness {
    harness_with(Config::default()).await
}

pub async fn harness_with(mut config: Config) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    config.logout.recreate_delay_ms = 10;
    let store = JsonStore::open(dir.path()).await.unwrap();
    let registry = Arc::new(
        SessionRegistry::load(store.clone(), &config.sessions)
            .await
            .unwrap(),
    );
    let factory = Arc::new(MockFactory::default());
    let gateway = Arc::new(Gateway::new(registry, factory.clone(), &config).unwrap());
    Harness {
        gateway,
        factory,
        store,
        _dir: dir,
    }
}

pub fn sid(id: &str) -> SessionId {
    SessionId::from(id)
}

pub fn chat(session: &str, from: &str, text: &str) -> InboundMessage {
    InboundMessage::chat(sid(session), from, text)
}
