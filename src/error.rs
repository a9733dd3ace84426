//! Error types for the OneBot runtime.

use crate::action::retcode;
use thiserror::Error;

/// Main error type for runtime operations.
#[derive(Debug, Error)]
pub enum OneBotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request bytes are not well-formed for the stated encoding.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request decoded fine but violates the action request schema.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Serve error: {0}")]
    Serve(String),

    #[error("Webhook error: {0}")]
    Webhook(String),
}

impl OneBotError {
    /// Protocol retcode used when this error is reported in a response envelope.
    pub fn retcode(&self) -> i64 {
        match self {
            OneBotError::Parse(_) | OneBotError::Validation(_) => retcode::BAD_REQUEST,
            _ => retcode::INTERNAL_HANDLER_ERROR,
        }
    }
}

impl From<serde_json::Error> for OneBotError {
    fn from(e: serde_json::Error) -> Self {
        OneBotError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for OneBotError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        OneBotError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for OneBotError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        OneBotError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for OneBotError {
    fn from(e: reqwest::Error) -> Self {
        OneBotError::Webhook(e.to_string())
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, OneBotError>;
