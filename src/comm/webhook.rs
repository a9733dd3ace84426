//! Outbound webhook: POSTs every event as JSON to a configured URL.
//!
//! One attempt per event within the configured timeout. Failures are logged
//! and the event is dropped. Responses from the receiver are ignored.

use crate::config::WebhookConfig;
use crate::error::{OneBotError, Result};
use crate::event::EncodedEvent;
use crate::onebot::OneBot;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const ONEBOT_VERSION: &str = "12";

/// Deliver events to `config.url` until `cancel` fires.
///
/// If the subscription is dropped because delivery fell behind, a new one is
/// opened and delivery continues from the next pushed event.
pub async fn run_webhook(config: WebhookConfig, ob: Arc<OneBot>, cancel: CancellationToken) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .default_headers(default_headers(ob.impl_name())?)
        .build()?;

    let mut sub = ob.open_listen_chan();
    info!(url = %config.url, "webhook transport started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = sub.recv() => match event {
                Some(event) => {
                    if let Err(e) = deliver(&client, &config.url, &event).await {
                        warn!(url = %config.url, error = %e, "webhook delivery failed, event dropped");
                    }
                }
                None => {
                    warn!(url = %config.url, "event subscription dropped, reopening");
                    sub = ob.open_listen_chan();
                }
            },
        }
    }

    ob.close_listen_chan(sub.id());
    info!(url = %config.url, "webhook transport stopped");
    Ok(())
}

fn default_headers(impl_name: &str) -> Result<HeaderMap> {
    let invalid = |e: reqwest::header::InvalidHeaderValue| {
        OneBotError::Webhook(format!("invalid implementation name `{impl_name}`: {e}"))
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("OneBot/{ONEBOT_VERSION} ({impl_name})")).map_err(invalid)?,
    );
    headers.insert("X-OneBot-Version", HeaderValue::from_static(ONEBOT_VERSION));
    headers.insert("X-Impl", HeaderValue::from_str(impl_name).map_err(invalid)?);
    Ok(headers)
}

/// POST a single event.
pub async fn deliver(client: &reqwest::Client, url: &str, event: &EncodedEvent) -> Result<()> {
    let response = client.post(url).body(event.json.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(OneBotError::Webhook(format!("{url} answered {status}")));
    }
    debug!(%url, %status, "event delivered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers() {
        let headers = default_headers("walle").unwrap();
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[USER_AGENT], "OneBot/12 (walle)");
        assert_eq!(headers["X-OneBot-Version"], "12");
        assert_eq!(headers["X-Impl"], "walle");
    }

    #[test]
    fn test_invalid_impl_name_rejected() {
        let err = default_headers("bad\nname").unwrap_err();
        assert!(matches!(err, OneBotError::Webhook(_)));
    }
}
