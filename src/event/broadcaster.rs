//! Fans serialized events out to every open subscriber channel.

use crate::event::types::AnyEvent;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, warn};

/// Default per-subscriber buffer, in events.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;

/// Unique identifier for a subscriber channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An event serialized once, shared by every subscriber.
#[derive(Debug, PartialEq)]
pub struct EncodedEvent {
    /// Generic form, used where events are embedded in other payloads.
    pub value: Value,
    /// JSON text, used where events are sent on their own.
    pub json: String,
}

/// Receiving half of a subscriber channel.
///
/// The channel yields `None` once the subscriber is closed, either by
/// [`Broadcaster::close_listen_chan`] or because its buffer overflowed.
pub struct EventSubscription {
    pub id: SubscriptionId,
    pub receiver: mpsc::Receiver<Arc<EncodedEvent>>,
}

impl EventSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Arc<EncodedEvent>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Arc<EncodedEvent>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Blocking receive, for use outside the async runtime.
    pub fn blocking_recv(&mut self) -> Option<Arc<EncodedEvent>> {
        self.receiver.blocking_recv()
    }
}

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<Arc<EncodedEvent>>,
}

/// Registry of subscriber channels.
///
/// Each subscriber gets a bounded buffer of `buffer_size` events. Sending
/// never blocks: a subscriber whose buffer is full is removed and its channel
/// closed, exactly as if it had disconnected.
pub struct Broadcaster {
    /// Open subscribers, in registration order.
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl Broadcaster {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Open a new subscriber channel.
    pub fn open_listen_chan(&self) -> EventSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::channel(self.buffer_size);

        self.subscribers.write().push(Subscriber { id, sender });
        debug!(subscription = %id, "listen channel opened");

        EventSubscription { id, receiver }
    }

    /// Remove a subscriber and close its channel. Unknown ids are ignored.
    pub fn close_listen_chan(&self, id: SubscriptionId) {
        let mut subs = self.subscribers.write();
        if let Some(pos) = subs.iter().position(|s| s.id == id) {
            // dropping the sender closes the channel
            subs.remove(pos);
            debug!(subscription = %id, "listen channel closed");
        }
    }

    /// Number of open subscriber channels.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Fix up, serialize once and send to every subscriber.
    ///
    /// Returns `false` if the event could not be fixed up or serialized, in
    /// which case nothing is sent.
    pub fn broadcast<E: AnyEvent>(&self, event: &mut E) -> bool {
        if !event.try_fix_up() {
            warn!(
                detail_type = %event.base().detail_type,
                event_type = %event.base().type_,
                "event fields are invalid, dropping"
            );
            return false;
        }

        let encoded = match encode(event) {
            Ok(encoded) => Arc::new(encoded),
            Err(e) => {
                warn!(error = %e, "event serialization failed, dropping");
                return false;
            }
        };
        debug!(event_id = %event.base().id, "broadcasting event");

        let mut overflowed = Vec::new();
        {
            let subs = self.subscribers.read();
            for sub in subs.iter() {
                match sub.sender.try_send(Arc::clone(&encoded)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(subscription = %sub.id, "subscriber buffer full, dropping subscriber");
                        overflowed.push(sub.id);
                    }
                    Err(TrySendError::Closed(_)) => overflowed.push(sub.id),
                }
            }
        }

        if !overflowed.is_empty() {
            self.subscribers
                .write()
                .retain(|s| !overflowed.contains(&s.id));
        }

        true
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

fn encode<E: AnyEvent>(event: &E) -> serde_json::Result<EncodedEvent> {
    let value = serde_json::to_value(event)?;
    let json = serde_json::to_string(&value)?;
    Ok(EncodedEvent { value, json })
}
