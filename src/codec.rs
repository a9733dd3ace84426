//! Generic MessagePack decoding into the JSON value model.
//!
//! MessagePack carries shapes a JSON value cannot: `bin` and `ext` payloads
//! and non-string map keys. They are folded in as follows:
//!
//! - `bin` becomes an array of byte integers
//! - `ext` becomes `{"type": <tag>, "data": [bytes]}`
//! - non-string map keys are written as their JSON text
//! - strings that are not UTF-8 are decoded lossily
//! - non-finite floats become `null`

use rmpv::Value as MsgValue;
use serde_json::{Map, Number, Value};

/// Decode one MessagePack value from `bytes`.
pub(crate) fn decode_msgpack(bytes: &[u8]) -> Result<Value, rmpv::decode::Error> {
    let mut rd = bytes;
    rmpv::decode::read_value(&mut rd).map(into_json)
}

fn into_json(value: MsgValue) -> Value {
    match value {
        MsgValue::Nil => Value::Null,
        MsgValue::Boolean(b) => Value::Bool(b),
        MsgValue::Integer(n) => match (n.as_u64(), n.as_i64()) {
            (Some(u), _) => Value::from(u),
            (None, Some(i)) => Value::from(i),
            (None, None) => Value::Null,
        },
        MsgValue::F32(f) => float(f64::from(f)),
        MsgValue::F64(f) => float(f),
        MsgValue::String(s) => Value::String(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        MsgValue::Binary(bytes) => bytes_array(bytes),
        MsgValue::Array(items) => Value::Array(items.into_iter().map(into_json).collect()),
        MsgValue::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(map_key(k), into_json(v));
            }
            Value::Object(map)
        }
        MsgValue::Ext(tag, data) => {
            let mut map = Map::with_capacity(2);
            map.insert("type".to_string(), Value::from(tag));
            map.insert("data".to_string(), bytes_array(data));
            Value::Object(map)
        }
    }
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn bytes_array(bytes: Vec<u8>) -> Value {
    Value::Array(bytes.into_iter().map(Value::from).collect())
}

fn map_key(key: MsgValue) -> String {
    match key {
        MsgValue::String(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
        other => into_json(other).to_string(),
    }
}
