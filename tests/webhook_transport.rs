//! Webhook transport tests against a local receiver.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use libonebot::comm::webhook::{deliver, run_webhook};
use libonebot::{
    BotSelf, Config, EncodedEvent, Message, MessageEvent, NoticeEvent, OneBot, OneBotError,
    Segment, WebhookConfig,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Receiver {
    tx: mpsc::UnboundedSender<(HeaderMap, Value)>,
    hits: Arc<AtomicUsize>,
    /// Requests with these 1-based numbers are answered with 500.
    fail_on: Vec<usize>,
}

async fn receive(State(rx): State<Receiver>, headers: HeaderMap, body: String) -> StatusCode {
    let n = rx.hits.fetch_add(1, Ordering::SeqCst) + 1;
    let _ = rx.tx.send((headers, serde_json::from_str(&body).unwrap_or(Value::Null)));
    if rx.fail_on.contains(&n) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

/// Start a receiver; returns its URL, the delivered requests and a hit count.
async fn boot_receiver(
    fail_on: Vec<usize>,
) -> (String, mpsc::UnboundedReceiver<(HeaderMap, Value)>, Arc<AtomicUsize>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/", post(receive)).with_state(Receiver {
        tx,
        hits: Arc::clone(&hits),
        fail_on,
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{addr}/"), rx, hits)
}

fn test_bot() -> Arc<OneBot> {
    Arc::new(OneBot::new(
        "walle",
        BotSelf::new("myplat", "bot"),
        Config::default(),
    ))
}

async fn wait_for_subscriber(ob: &OneBot) {
    timeout(TIMEOUT, async {
        while ob.broadcaster().subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_events_posted_with_headers() {
    let (url, mut delivered, _) = boot_receiver(vec![]).await;
    let ob = test_bot();
    let cancel = CancellationToken::new();
    let config = WebhookConfig {
        url,
        timeout_ms: 2000,
    };
    let task = tokio::spawn(run_webhook(config, Arc::clone(&ob), cancel.clone()));
    wait_for_subscriber(&ob).await;

    let message = Message::from(vec![Segment::text("hi")]);
    assert!(ob.push(MessageEvent::make_private_message_event("m1", message, "42")));

    let (headers, body) = timeout(TIMEOUT, delivered.recv()).await.unwrap().unwrap();
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["user-agent"], "OneBot/12 (walle)");
    assert_eq!(headers["x-onebot-version"], "12");
    assert_eq!(headers["x-impl"], "walle");
    assert_eq!(body["type"], "message");
    assert_eq!(body["message_id"], "m1");
    assert_eq!(body["self"], json!({"platform": "myplat", "user_id": "bot"}));

    cancel.cancel();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(ob.broadcaster().subscriber_count(), 0);
}

#[tokio::test]
async fn test_failed_delivery_is_not_retried() {
    let (url, mut delivered, hits) = boot_receiver(vec![1]).await;
    let ob = test_bot();
    let cancel = CancellationToken::new();
    let config = WebhookConfig {
        url,
        timeout_ms: 2000,
    };
    let task = tokio::spawn(run_webhook(config, Arc::clone(&ob), cancel.clone()));
    wait_for_subscriber(&ob).await;

    assert!(ob.push(NoticeEvent::make_friend_increase_notice_event("1")));
    assert!(ob.push(NoticeEvent::make_friend_increase_notice_event("2")));

    let (_, first) = timeout(TIMEOUT, delivered.recv()).await.unwrap().unwrap();
    let (_, second) = timeout(TIMEOUT, delivered.recv()).await.unwrap().unwrap();
    assert_eq!(first["user_id"], "1");
    assert_eq!(second["user_id"], "2");

    // give a retry the chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    cancel.cancel();
    timeout(TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_deliver_reports_errors() {
    let (url, _delivered, _) = boot_receiver(vec![1]).await;
    let client = reqwest::Client::new();
    let event = EncodedEvent {
        value: json!({"id": "1"}),
        json: r#"{"id":"1"}"#.to_string(),
    };

    let err = deliver(&client, &url, &event).await.unwrap_err();
    assert!(matches!(err, OneBotError::Webhook(_)));
    deliver(&client, &url, &event).await.unwrap();

    // nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);
    let err = deliver(&client, &closed, &event).await.unwrap_err();
    assert!(matches!(err, OneBotError::Webhook(_)));
}
