//! Core types shared across the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Identity of one logical bot served by the runtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotSelf {
    pub platform: String,
    pub user_id: String,
}

impl BotSelf {
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for BotSelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.user_id)
    }
}

/// Seconds since Unix epoch, with sub-second precision.
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(pub f64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Timestamp(duration.as_secs_f64())
    }

    /// Whether the timestamp was never stamped.
    pub fn is_unset(&self) -> bool {
        self.0 <= 0.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Wire encoding of requests and responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Json,
    MessagePack,
}

impl Encoding {
    /// MIME type used for this encoding on HTTP transports.
    pub fn content_type(self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::MessagePack => "application/msgpack",
        }
    }

    /// Select an encoding from a `Content-Type` header value.
    ///
    /// Parameters such as `; charset=utf-8` are tolerated.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.starts_with("application/json") {
            Some(Encoding::Json)
        } else if content_type.starts_with("application/msgpack") {
            Some(Encoding::MessagePack)
        } else {
            None
        }
    }

    pub fn is_binary(self) -> bool {
        matches!(self, Encoding::MessagePack)
    }
}
