//! # libonebot
//!
//! A runtime for building OneBot 12 implementations: it accepts action
//! requests from connected applications, routes them to registered handlers,
//! and pushes events to every connected transport.
//!
//! ## Core Concepts
//!
//! - **Actions**: RPC calls, either core or vendor-extended (`<platform>_name`)
//! - **Events**: asynchronous occurrences broadcast to every transport
//! - **Transports**: HTTP (polling), WebSocket (duplex) and outbound webhooks
//! - **Encodings**: JSON and MessagePack, answered in kind
//!
//! ## Example
//!
//! ```ignore
//! use libonebot::{actions, ActionMux, BotSelf, Config, OneBot};
//!
//! let mut mux = ActionMux::new();
//! mux.register_fn(actions::GET_VERSION, |w, _r| {
//!     w.write_data(json!({"impl": "walle", "version": "1.0.0", "onebot_version": "12"}));
//! });
//!
//! let mut ob = OneBot::new("walle", BotSelf::new("myplat", "10001"), Config::from_json(cfg)?);
//! ob.handle(mux);
//!
//! let ob = Arc::new(ob);
//! tokio::spawn(Arc::clone(&ob).run());
//!
//! // Push an event to every connected transport
//! ob.push(MessageEvent::make_private_message_event("1", Message::from(vec![Segment::text("hi")]), "42"));
//! ```

pub mod action;
mod codec;
pub mod comm;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod onebot;
pub mod types;

// Re-exports
pub use action::{
    actions, retcode, Action, ActionMux, Handler, HandlerFn, ParamError, ParamGetter, Params,
    Request, Response, ResponseWriter, Status,
};
pub use config::{CommConfig, Config, HeartbeatConfig, HttpConfig, WebhookConfig, WsConfig};
pub use error::{OneBotError, Result};
pub use event::{
    AnyEvent, Broadcaster, CustomEvent, EncodedEvent, Event, EventSubscription, EventType,
    HeartbeatEvent, MessageEvent, NoticeEvent, SubscriptionId,
};
pub use message::{Message, Segment};
pub use onebot::OneBot;
pub use types::*;
