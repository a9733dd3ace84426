//! Events and their broadcast to transports.
//!
//! Applications build one of the event types, hand it to
//! [`OneBot::push`](crate::OneBot::push), and the [`Broadcaster`] delivers the
//! serialized form to every transport subscription.

mod broadcaster;
mod types;

pub use broadcaster::{
    Broadcaster, EncodedEvent, EventSubscription, SubscriptionId, DEFAULT_EVENT_BUFFER_SIZE,
};
pub use types::{
    AnyEvent, CustomEvent, Event, EventType, HeartbeatEvent, MessageEvent, NoticeEvent,
};
