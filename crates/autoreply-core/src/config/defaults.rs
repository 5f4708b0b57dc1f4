//! Default value functions used by serde for config deserialization.

use super::SessionConfig;

pub fn default_data_dir() -> String {
    "~/.autoreply".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

/// 24 hours.
pub fn default_reset_interval() -> u64 {
    1440
}

pub fn default_recreate_delay_ms() -> u64 {
    1000
}

pub fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_api_port() -> u16 {
    3700
}

pub fn default_device_name() -> String {
    "AUTOREPLY".to_string()
}

pub fn default_sessions() -> Vec<SessionConfig> {
    vec![SessionConfig::new("session1"), SessionConfig::new("session2")]
}
