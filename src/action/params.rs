//! Typed access to action parameters.

use crate::action::response::ResponseWriter;
use crate::action::request::Request;
use crate::action::retcode;
use crate::message::Message;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a parameter could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("parameter `{0}` is missing")]
    Missing(String),

    #[error("parameter `{key}` is not {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("parameter `{key}` is invalid: {reason}")]
    Invalid { key: String, reason: String },
}

impl ParamError {
    pub fn is_missing(&self) -> bool {
        matches!(self, ParamError::Missing(_))
    }
}

/// Ordered parameter map of a request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn typed<'a, T>(
        &'a self,
        key: &str,
        expected: &'static str,
        convert: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, ParamError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ParamError::Missing(key.to_string()))?;
        convert(value).ok_or_else(|| ParamError::WrongType {
            key: key.to_string(),
            expected,
        })
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ParamError> {
        self.typed(key, "a string", Value::as_str)
    }

    pub fn get_string(&self, key: &str) -> Result<String, ParamError> {
        self.get_str(key).map(str::to_string)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ParamError> {
        self.typed(key, "a boolean", Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ParamError> {
        self.typed(key, "an integer", Value::as_i64)
    }

    pub fn get_u64(&self, key: &str) -> Result<u64, ParamError> {
        self.typed(key, "a non-negative integer", Value::as_u64)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ParamError> {
        self.typed(key, "a number", Value::as_f64)
    }

    pub fn get_map(&self, key: &str) -> Result<&Map<String, Value>, ParamError> {
        self.typed(key, "an object", Value::as_object)
    }

    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>, ParamError> {
        self.typed(key, "an array", Value::as_array)
    }

    /// Binary parameter: an array of byte integers (MessagePack `bin`) or a
    /// base64 string (JSON clients).
    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>, ParamError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ParamError::Missing(key.to_string()))?;
        let invalid = |reason: String| ParamError::Invalid {
            key: key.to_string(),
            reason,
        };
        match value {
            Value::String(encoded) => STANDARD
                .decode(encoded)
                .map_err(|e| invalid(format!("not valid base64: {e}"))),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| invalid(format!("`{item}` is not a byte")))
                })
                .collect(),
            _ => Err(ParamError::WrongType {
                key: key.to_string(),
                expected: "bytes",
            }),
        }
    }

    pub fn get_message(&self, key: &str) -> Result<Message, ParamError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ParamError::Missing(key.to_string()))?;
        Message::from_value(value).map_err(|reason| ParamError::Invalid {
            key: key.to_string(),
            reason,
        })
    }

    /// Deserialize a parameter into any serde type.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, ParamError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ParamError::Missing(key.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| ParamError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params(map)
    }
}

/// Reads parameters for a handler and reports failures on its response.
///
/// Every getter returns `None` after writing a `BAD_PARAM` failure, so a
/// handler can simply return:
///
/// ```ignore
/// let mut p = ParamGetter::new(w, r);
/// let Some(user_id) = p.get_string("user_id") else { return };
/// ```
pub struct ParamGetter<'a> {
    w: &'a mut ResponseWriter,
    params: &'a Params,
}

impl<'a> ParamGetter<'a> {
    pub fn new(w: &'a mut ResponseWriter, r: &'a Request) -> Self {
        Self {
            w,
            params: &r.params,
        }
    }

    fn check<T>(&mut self, result: Result<T, ParamError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.w.write_failed(retcode::BAD_PARAM, e);
                None
            }
        }
    }

    /// Treat a missing parameter as `Some(None)`; only a wrong type fails.
    fn check_optional<T>(&mut self, result: Result<T, ParamError>) -> Option<Option<T>> {
        match result {
            Err(e) if e.is_missing() => Some(None),
            other => self.check(other).map(Some),
        }
    }

    pub fn get_string(&mut self, key: &str) -> Option<String> {
        let result = self.params.get_string(key);
        self.check(result)
    }

    pub fn get_bool(&mut self, key: &str) -> Option<bool> {
        let result = self.params.get_bool(key);
        self.check(result)
    }

    pub fn get_i64(&mut self, key: &str) -> Option<i64> {
        let result = self.params.get_i64(key);
        self.check(result)
    }

    pub fn get_u64(&mut self, key: &str) -> Option<u64> {
        let result = self.params.get_u64(key);
        self.check(result)
    }

    pub fn get_f64(&mut self, key: &str) -> Option<f64> {
        let result = self.params.get_f64(key);
        self.check(result)
    }

    pub fn get_map(&mut self, key: &str) -> Option<&'a Map<String, Value>> {
        let result = self.params.get_map(key);
        self.check(result)
    }

    pub fn get_bytes(&mut self, key: &str) -> Option<Vec<u8>> {
        let result = self.params.get_bytes(key);
        self.check(result)
    }

    pub fn get_message(&mut self, key: &str) -> Option<Message> {
        let result = self.params.get_message(key);
        self.check(result)
    }

    pub fn get_optional_string(&mut self, key: &str) -> Option<Option<String>> {
        let result = self.params.get_string(key);
        self.check_optional(result)
    }

    pub fn get_optional_bool(&mut self, key: &str) -> Option<Option<bool>> {
        let result = self.params.get_bool(key);
        self.check_optional(result)
    }
}
