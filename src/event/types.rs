//! Event model: the common base every event carries plus the standard kinds.

use crate::message::Message;
use crate::types::{BotSelf, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Top-level event category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Message,
    Notice,
    Request,
    Meta,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Message => "message",
            EventType::Notice => "notice",
            EventType::Request => "request",
            EventType::Meta => "meta",
        };
        f.write_str(name)
    }
}

/// Fields shared by every event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub time: Timestamp,
    #[serde(rename = "type")]
    pub type_: EventType,
    pub detail_type: String,
    #[serde(default)]
    pub sub_type: String,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_: Option<BotSelf>,
}

impl Event {
    /// A base with no id and no time; both are filled in on broadcast.
    pub fn new(type_: EventType, detail_type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            time: Timestamp::default(),
            type_,
            detail_type: detail_type.into(),
            sub_type: String::new(),
            self_: None,
        }
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = sub_type.into();
        self
    }

    /// Generate a missing id, stamp a missing time and check the rest.
    ///
    /// Returns `false` when the event cannot be made valid: `detail_type`
    /// is empty, or a non-meta event has no `self`.
    pub fn try_fix_up(&mut self) -> bool {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        if self.time.is_unset() {
            self.time = Timestamp::now();
        }
        if self.detail_type.is_empty() {
            return false;
        }
        self.type_ == EventType::Meta || self.self_.is_some()
    }
}

/// Anything the broadcaster can push.
pub trait AnyEvent: Serialize + Send + Sync {
    fn base(&self) -> &Event;

    fn base_mut(&mut self) -> &mut Event;

    fn try_fix_up(&mut self) -> bool {
        self.base_mut().try_fix_up()
    }
}

impl AnyEvent for Event {
    fn base(&self) -> &Event {
        self
    }

    fn base_mut(&mut self) -> &mut Event {
        self
    }
}

macro_rules! impl_any_event {
    ($($ty:ty),* $(,)?) => {
        $(
            impl AnyEvent for $ty {
                fn base(&self) -> &Event {
                    &self.event
                }

                fn base_mut(&mut self) -> &mut Event {
                    &mut self.event
                }
            }
        )*
    };
}

impl_any_event!(MessageEvent, NoticeEvent, HeartbeatEvent, CustomEvent);

/// A chat message, private or in a group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(flatten)]
    pub event: Event,
    pub message_id: String,
    pub message: Message,
    /// Plain-text rendering of `message`.
    pub alt_message: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl MessageEvent {
    pub fn make_private_message_event(
        message_id: impl Into<String>,
        message: Message,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            event: Event::new(EventType::Message, "private"),
            message_id: message_id.into(),
            alt_message: message.extract_text(),
            message,
            user_id: user_id.into(),
            group_id: None,
        }
    }

    pub fn make_group_message_event(
        message_id: impl Into<String>,
        message: Message,
        user_id: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            event: Event::new(EventType::Message, "group"),
            message_id: message_id.into(),
            alt_message: message.extract_text(),
            message,
            user_id: user_id.into(),
            group_id: Some(group_id.into()),
        }
    }
}

/// A notice with free-form detail fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NoticeEvent {
    #[serde(flatten)]
    pub event: Event,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NoticeEvent {
    pub fn new(detail_type: impl Into<String>) -> Self {
        Self {
            event: Event::new(EventType::Notice, detail_type),
            fields: Map::new(),
        }
    }

    pub fn make_friend_increase_notice_event(user_id: impl Into<String>) -> Self {
        Self::new("friend_increase").with_field("user_id", Value::String(user_id.into()))
    }

    pub fn make_friend_decrease_notice_event(user_id: impl Into<String>) -> Self {
        Self::new("friend_decrease").with_field("user_id", Value::String(user_id.into()))
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Periodic liveness signal from the runtime itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    #[serde(flatten)]
    pub event: Event,
    /// Milliseconds until the next heartbeat.
    pub interval: u64,
}

impl HeartbeatEvent {
    pub fn make_heartbeat_event(interval_ms: u64) -> Self {
        Self {
            event: Event::new(EventType::Meta, "heartbeat"),
            interval: interval_ms,
        }
    }
}

/// Any other event, typically a vendor extension.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomEvent {
    #[serde(flatten)]
    pub event: Event,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CustomEvent {
    pub fn new(type_: EventType, detail_type: impl Into<String>) -> Self {
        Self {
            event: Event::new(type_, detail_type),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}
