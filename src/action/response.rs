//! Action responses and the writer handlers fill them through.

use crate::action::retcode;
use crate::codec::decode_msgpack;
use crate::error::{OneBotError, Result};
use crate::types::Encoding;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Logical outcome of an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
}

/// Response envelope, identical on every transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    /// `0` exactly when `status` is `Ok`.
    pub retcode: i64,
    pub data: Option<Value>,
    #[serde(default)]
    pub message: String,
    /// Mirrors the request's echo, `Null` when it had none.
    #[serde(default)]
    pub echo: Value,
}

impl Response {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            status: Status::Ok,
            retcode: retcode::OK,
            data,
            message: String::new(),
            echo: Value::Null,
        }
    }

    pub fn failed(retcode: i64, err: impl fmt::Display) -> Self {
        let mut w = ResponseWriter::new();
        w.write_failed(retcode, err);
        w.into_response(Value::Null)
    }

    pub fn with_echo(mut self, echo: Value) -> Self {
        self.echo = echo;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>> {
        match encoding {
            Encoding::Json => Ok(serde_json::to_vec(self)?),
            Encoding::MessagePack => Ok(rmp_serde::to_vec_named(self)?),
        }
    }

    pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<Self> {
        match encoding {
            Encoding::Json => serde_json::from_slice(bytes)
                .map_err(|e| OneBotError::Deserialization(e.to_string())),
            Encoding::MessagePack => {
                let value = decode_msgpack(bytes)
                    .map_err(|e| OneBotError::Deserialization(e.to_string()))?;
                serde_json::from_value(value)
                    .map_err(|e| OneBotError::Deserialization(e.to_string()))
            }
        }
    }
}

/// Sink for exactly one in-flight response.
///
/// Writes are last-write-wins: the dispatcher sets "ok" before the handler
/// runs and whatever the handler writes afterwards replaces it. The echo is
/// not reachable from here; the dispatcher threads it through.
#[derive(Debug)]
pub struct ResponseWriter {
    resp: Response,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            resp: Response::ok(None),
        }
    }

    /// Reset to a bare success without data.
    pub fn write_ok(&mut self) {
        self.resp.status = Status::Ok;
        self.resp.retcode = retcode::OK;
        self.resp.data = None;
        self.resp.message.clear();
    }

    /// Succeed with `data`.
    ///
    /// A payload that cannot be serialized turns into an
    /// `INTERNAL_HANDLER_ERROR` failure.
    pub fn write_data(&mut self, data: impl Serialize) {
        match serde_json::to_value(data) {
            Ok(value) => {
                self.resp.status = Status::Ok;
                self.resp.retcode = retcode::OK;
                self.resp.data = Some(value);
                self.resp.message.clear();
            }
            Err(e) => self.write_failed(
                retcode::INTERNAL_HANDLER_ERROR,
                format!("failed to serialize response data: {e}"),
            ),
        }
    }

    /// Fail with `retcode` and the error's message. Clears any data.
    pub fn write_failed(&mut self, retcode: i64, err: impl fmt::Display) {
        let retcode = if retcode == retcode::OK {
            warn!("handler wrote a failure with retcode 0, reporting BAD_HANDLER");
            retcode::BAD_HANDLER
        } else {
            retcode
        };
        self.resp.status = Status::Failed;
        self.resp.retcode = retcode;
        self.resp.data = None;
        self.resp.message = err.to_string();
    }

    /// Current state of the response.
    pub fn response(&self) -> &Response {
        &self.resp
    }

    /// Finish the response, attaching the request's echo.
    pub fn into_response(self, echo: Value) -> Response {
        Response { echo, ..self.resp }
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_data_scenario() {
        let mut w = ResponseWriter::new();
        w.write_data(json!({"version": "1.0.0"}));
        let response = w.into_response(Value::Null);

        let encoded = response.encode(Encoding::Json).unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            r#"{"status":"ok","retcode":0,"data":{"version":"1.0.0"},"message":"","echo":null}"#
        );
    }

    #[test]
    fn test_last_write_wins() {
        let mut w = ResponseWriter::new();
        w.write_data("first");
        w.write_failed(retcode::BAD_PARAM, "nope");
        assert_eq!(w.response().status, Status::Failed);
        assert_eq!(w.response().data, None);
        assert_eq!(w.response().message, "nope");

        w.write_data(json!([1, 2]));
        let response = w.into_response(json!("e"));
        assert!(response.is_ok());
        assert_eq!(response.retcode, 0);
        assert_eq!(response.message, "");
        assert_eq!(response.data, Some(json!([1, 2])));
        assert_eq!(response.echo, json!("e"));
    }

    #[test]
    fn test_failed_with_zero_retcode_is_corrected() {
        let response = Response::failed(retcode::OK, "oops");
        assert_eq!(response.status, Status::Failed);
        assert_eq!(response.retcode, retcode::BAD_HANDLER);
    }

    #[test]
    fn test_msgpack_encoding_uses_field_names() {
        let response = Response::ok(Some(json!({"good": true}))).with_echo(json!(3));
        let bytes = response.encode(Encoding::MessagePack).unwrap();
        let generic: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(generic["status"], "ok");
        assert_eq!(generic["data"]["good"], true);
        assert_eq!(generic["echo"], 3);
    }

    #[test]
    fn test_decode_both_encodings() {
        let response = Response::failed(retcode::UNSUPPORTED_ACTION, "action `x` not found")
            .with_echo(json!({"id": "abc"}));
        for encoding in [Encoding::Json, Encoding::MessagePack] {
            let bytes = response.encode(encoding).unwrap();
            assert_eq!(Response::decode(&bytes, encoding).unwrap(), response);
        }
    }
}
