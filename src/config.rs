//! Runtime configuration.

use crate::error::{OneBotError, Result};
use crate::event::DEFAULT_EVENT_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`OneBot`](crate::OneBot) instance.
///
/// Every field has a default, so a partial document such as
/// `{"comm": {"ws": [{"port": 6700}]}}` is enough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub comm: CommConfig,
    pub heartbeat: HeartbeatConfig,

    /// Max buffered events per subscriber before it is dropped.
    /// Default: 1000
    pub event_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            comm: CommConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Parse a JSON configuration document.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| OneBotError::Deserialization(e.to_string()))
    }
}

/// Transports to start. Each list may hold any number of entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommConfig {
    pub http: Vec<HttpConfig>,
    pub ws: Vec<WsConfig>,
    pub http_webhook: Vec<WebhookConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5700,
        }
    }
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6700,
        }
    }
}

impl WsConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,

    /// Per-request timeout in milliseconds.
    /// Default: 5000
    pub timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 5000,
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        // zero would spin the heartbeat task
        Duration::from_millis(self.interval_ms.max(1))
    }
}
