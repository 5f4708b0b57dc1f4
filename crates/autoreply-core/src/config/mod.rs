mod defaults;


use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AutoReplyError;
use crate::session::SessionId;
use defaults::*;

/// Top-level autoreply configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub autoreply: AutoReplyConfig,
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub logout: LogoutConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default = "default_sessions")]
    pub sessions: Vec<SessionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autoreply: AutoReplyConfig::default(),
            reset: ResetConfig::default(),
            logout: LogoutConfig::default(),
            api: ApiConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            sessions: default_sessions(),
        }
    }
}

impl Config {
    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), AutoReplyError> {
        if self.sessions.is_empty() {
            return Err(AutoReplyError::Config(
                "at least one [[sessions]] entry is required".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for session in &self.sessions {
            if session.id.as_str().is_empty() {
                return Err(AutoReplyError::Config("session id must not be empty".into()));
            }
            if !session
                .id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(AutoReplyError::Config(format!(
                    "session id '{}' may only contain letters, digits, '-' and '_'",
                    session.id
                )));
            }
            if !seen.insert(session.id.clone()) {
                return Err(AutoReplyError::Config(format!(
                    "duplicate session id '{}'",
                    session.id
                )));
            }
        }
        if self.reset.interval_minutes == 0 {
            return Err(AutoReplyError::Config(
                "reset.interval_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Expanded data directory.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand(&self.autoreply.data_dir))
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Periodic reset of the sent-defaults sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetConfig {
    #[serde(default = "default_reset_interval")]
    pub interval_minutes: u64,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_reset_interval(),
        }
    }
}

/// Logout teardown settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutConfig {
    /// Pause between tearing down a connection and creating its replacement.
    #[serde(default = "default_recreate_delay_ms")]
    pub recreate_delay_ms: u64,
}

impl Default for LogoutConfig {
    fn default() -> Self {
        Self {
            recreate_delay_ms: default_recreate_delay_ms(),
        }
    }
}

/// HTTP API configuration -- command surface for the dashboard UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for API authentication. Empty = no auth (for local-only use).
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// WhatsApp connection config.
///
/// Session data is stored at `{data_dir}/sessions/{session_id}/`.
/// Pairing is done by scanning a QR code (like WhatsApp Web).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Device name shown under "Linked devices" on the phone.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Render QR codes in the terminal as they arrive.
    #[serde(default = "default_true")]
    pub print_qr: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            print_qr: true,
        }
    }
}

/// One session slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub id: SessionId,
    /// Human-readable label used in status texts. Defaults to the id.
    #[serde(default)]
    pub label: Option<String>,
    /// Default message written to disk the first time the session starts.
    #[serde(default)]
    pub default_message: String,
}

impl SessionConfig {
    pub fn new(id: &str) -> Self {
        Self {
            id: SessionId::new(id),
            label: None,
            default_message: String::new(),
        }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Runs before logging is
/// set up, so callers report the fallback themselves.
pub fn load(path: &str) -> Result<Config, AutoReplyError> {
    let path = Path::new(path);
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| AutoReplyError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| AutoReplyError::Config(format!("failed to parse config: {}", e)))?;

    config.validate()?;
    Ok(config)
}
