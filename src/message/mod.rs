//! Message content model.
//!
//! A [`Message`] is an ordered list of [`Segment`]s. Order is significant:
//! it is rendered content, not a set. Adjacent text segments can be merged
//! with [`Message::reduce`] so that producers emitting text incrementally do
//! not fragment it.

mod segment;

pub use segment::{Message, Segment, SEG_TYPE_MENTION, SEG_TYPE_MENTION_ALL, SEG_TYPE_TEXT};
