//! A dummy OneBot implementation.
//!
//! Serves HTTP on 127.0.0.1:5700 and WebSocket on 127.0.0.1:6700, pushes a
//! private message every three seconds and shuts down after thirty.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example dummy
//! ```

use libonebot::{
    actions, ActionMux, BotSelf, Config, Message, MessageEvent, OneBot, ParamGetter, Segment,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"{
    "comm": {
        "http": [{"host": "127.0.0.1", "port": 5700}],
        "ws": [{"host": "127.0.0.1", "port": 6700}]
    },
    "heartbeat": {"enabled": true, "interval_ms": 10000}
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut mux = ActionMux::new();
    mux.register_fn(actions::GET_VERSION, |w, _| {
        w.write_data(json!({
            "impl": "dummy",
            "version": "1.0.0",
            "onebot_version": "12",
        }));
    });
    mux.register_fn(actions::SEND_MESSAGE, |w, r| {
        let mut p = ParamGetter::new(w, r);
        let Some(user_id) = p.get_string("user_id") else { return };
        let Some(message) = p.get_message("message") else { return };
        debug!(%user_id, text = %message.extract_text(), "send message");
        w.write_data(json!({"message_id": "0", "time": 0}));
    });
    mux.register_extended_fn("do_something", |_, _| {});

    let mut ob = OneBot::new("dummy", BotSelf::new("dummy", "123"), Config::from_json(CONFIG)?);
    ob.handle(mux);
    let ob = Arc::new(ob);

    let pusher = Arc::clone(&ob);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3));
        let mut n = 0u64;
        loop {
            ticker.tick().await;
            n += 1;
            let message = Message::from(vec![Segment::text("hello")]);
            pusher.push(MessageEvent::make_private_message_event(n.to_string(), message, "234"));
        }
    });

    let stopper = Arc::clone(&ob);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        stopper.shutdown();
    });

    info!("dummy implementation starting");
    ob.run().await?;
    Ok(())
}
