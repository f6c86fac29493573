//! Server configuration
//!
//! Loaded from an optional YAML file. Every field has a default so a partial
//! file (or none at all) yields a runnable configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::KEY_SIZE;
use crate::error::AppError;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Environment variable overriding `service.encryption_key`
pub const ENCRYPTION_KEY_ENV: &str = "CHAT_ENCRYPTION_KEY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub hub: HubConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
        }
    }
}

/// Hub tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Pending messages each client mailbox can hold
    pub mailbox_capacity: usize,
    /// Pending commands the hub intake can hold
    pub command_buffer: usize,
    /// Upper bound on a single mailbox push; unset means wait indefinitely
    pub send_timeout_ms: Option<u64>,
}

impl HubConfig {
    pub fn send_timeout(&self) -> Option<Duration> {
        self.send_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 10,
            command_buffer: 256,
            send_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Message encryption key, used as raw bytes; must be 32 bytes long
    pub encryption_key: String,
    /// Name of the room the `"default"` join sentinel resolves to
    pub default_room_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            encryption_key: String::new(),
            default_room_name: "Default".to_string(),
        }
    }
}

impl Config {
    /// Parse a YAML document
    pub fn from_yaml(text: &str) -> Result<Self, AppError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(ENCRYPTION_KEY_ENV) {
            self.service.encryption_key = key;
        }
        self
    }

    /// Log settings that will run but degrade behavior
    pub fn warn_on_weak_settings(&self) {
        let len = self.service.encryption_key.len();
        if len != KEY_SIZE {
            warn!(
                "Encryption key is {} bytes, expected {}; messages will be stored unencrypted",
                len, KEY_SIZE
            );
        }
    }
}
