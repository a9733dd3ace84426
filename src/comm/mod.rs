//! Transport adapters.
//!
//! Each transport is started with a shared [`OneBot`](crate::OneBot) handle
//! and a cancellation token, and runs until the token fires.

pub mod http;
pub mod webhook;
pub mod ws;

use crate::error::{OneBotError, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Bind a TCP listener, reporting failures as [`OneBotError::Bind`].
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await.map_err(|e| OneBotError::Bind {
        addr: addr.to_string(),
        reason: e.to_string(),
    })?;
    info!(%addr, "listener bound");
    Ok(listener)
}
