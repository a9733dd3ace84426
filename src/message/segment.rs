//! Message segments and the ordered message they compose.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SEG_TYPE_TEXT: &str = "text";
pub const SEG_TYPE_MENTION: &str = "mention";
pub const SEG_TYPE_MENTION_ALL: &str = "mention_all";

/// One typed unit of message content.
///
/// Unknown segment types are carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSegment")]
pub struct Segment {
    #[serde(rename = "type")]
    pub type_: String,
    pub data: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(rename = "type", default)]
    type_: String,
    #[serde(default)]
    data: Map<String, Value>,
}

impl TryFrom<RawSegment> for Segment {
    type Error = String;

    fn try_from(raw: RawSegment) -> Result<Self, Self::Error> {
        if raw.type_.is_empty() {
            return Err("segment `type` is missing or empty".to_string());
        }
        Ok(Segment {
            type_: raw.type_,
            data: raw.data,
        })
    }
}

impl Segment {
    /// Build a segment of any type.
    pub fn custom(type_: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            type_: type_.into(),
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("text".to_string(), Value::String(text.into()));
        Self::custom(SEG_TYPE_TEXT, data)
    }

    pub fn mention(user_id: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("user_id".to_string(), Value::String(user_id.into()));
        Self::custom(SEG_TYPE_MENTION, data)
    }

    pub fn mention_all() -> Self {
        Self::custom(SEG_TYPE_MENTION_ALL, Map::new())
    }

    fn text_field(&self) -> Option<&str> {
        self.data.get("text").and_then(Value::as_str)
    }

    /// Try to merge `next` into `self`.
    ///
    /// Only adjacent `text` segments merge. Returns `false` when no merge was
    /// performed, in which case both segments must be kept in order.
    pub fn try_merge(&mut self, next: &Segment) -> bool {
        if self.type_ != SEG_TYPE_TEXT || next.type_ != SEG_TYPE_TEXT {
            return false;
        }

        let merged = match (self.text_field(), next.text_field()) {
            (Some(a), Some(b)) => format!("{a}{b}"),
            (Some(a), None) => a.to_string(),
            (None, Some(b)) => b.to_string(),
            (None, None) => String::new(),
        };
        self.data.insert("text".to_string(), Value::String(merged));
        true
    }
}

/// Ordered sequence of segments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Vec<Segment>);

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    /// Builder-style append.
    pub fn with(mut self, segment: Segment) -> Self {
        self.0.push(segment);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.0.iter()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Merge adjacent mergeable segments in place, preserving order.
    pub fn reduce(&mut self) {
        let mut reduced: Vec<Segment> = Vec::with_capacity(self.0.len());
        for segment in self.0.drain(..) {
            if let Some(last) = reduced.last_mut() {
                if last.try_merge(&segment) {
                    continue;
                }
            }
            reduced.push(segment);
        }
        self.0 = reduced;
    }

    /// Plain text rendering, used as the alternative message of events.
    pub fn extract_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            match segment.type_.as_str() {
                SEG_TYPE_TEXT => out.push_str(segment.text_field().unwrap_or("")),
                SEG_TYPE_MENTION => {
                    let user = segment
                        .data
                        .get("user_id")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    out.push('@');
                    out.push_str(user);
                }
                SEG_TYPE_MENTION_ALL => out.push_str("@all"),
                other => {
                    out.push('[');
                    out.push_str(other);
                    out.push(']');
                }
            }
        }
        out
    }

    /// Parse a message from a loosely typed value.
    ///
    /// Accepts an array of segments or a bare string (a single text segment).
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(Message(vec![Segment::text(s.clone())])),
            Value::Array(_) => {
                serde_json::from_value(value.clone()).map_err(|e| e.to_string())
            }
            _ => Err("message must be an array of segments or a string".to_string()),
        }
    }
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Message(segments)
    }
}

impl FromIterator<Segment> for Message {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Message(iter.into_iter().collect())
    }
}

impl IntoIterator for Message {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
