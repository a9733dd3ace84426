//! Action requests and their wire decoding.

use crate::action::params::Params;
use crate::codec::decode_msgpack;
use crate::error::{OneBotError, Result};
use crate::types::{BotSelf, Encoding};
use serde_json::{Map, Value};
use std::fmt;

/// Name of a requested action, decided once at parse time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Standard action defined by the protocol.
    Core(String),
    /// Vendor action; `name` has the `<prefix>_` wire prefix stripped.
    Extended { prefix: String, name: String },
}

impl Action {
    /// Classify a wire action name against the vendor prefix.
    pub fn parse(full_name: &str, prefix: &str) -> Action {
        let prefix_ul = format!("{prefix}_");
        match full_name.strip_prefix(&prefix_ul) {
            Some(name) => Action::Extended {
                prefix: prefix.to_string(),
                name: name.to_string(),
            },
            None => Action::Core(full_name.to_string()),
        }
    }

    pub fn core(name: impl Into<String>) -> Self {
        Action::Core(name.into())
    }

    pub fn extended(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Action::Extended {
            prefix: prefix.into(),
            name: name.into(),
        }
    }

    /// Unprefixed name, the key used by handler tables.
    pub fn name(&self) -> &str {
        match self {
            Action::Core(name) => name,
            Action::Extended { name, .. } => name,
        }
    }

    pub fn is_extended(&self) -> bool {
        matches!(self, Action::Extended { .. })
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            Action::Core(_) => None,
            Action::Extended { prefix, .. } => Some(prefix),
        }
    }

    /// Full name as it appears on the wire.
    pub fn wire_name(&self) -> String {
        match self {
            Action::Core(name) => name.clone(),
            Action::Extended { prefix, name } => format!("{prefix}_{name}"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Core(name) => write!(f, "{name}"),
            Action::Extended { prefix, name } => write!(f, "{prefix}_{name}"),
        }
    }
}

/// A decoded action request.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub action: Action,
    pub params: Params,
    /// Opaque client token, `Null` when the client sent none.
    pub echo: Value,
    /// Bot the request is addressed to, on multi-account runtimes.
    pub bot_self: Option<BotSelf>,
}

impl Request {
    pub fn new(action: Action, params: Params) -> Self {
        Self {
            action,
            params,
            echo: Value::Null,
            bot_self: None,
        }
    }

    pub fn with_echo(mut self, echo: Value) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_self(mut self, bot_self: BotSelf) -> Self {
        self.bot_self = Some(bot_self);
        self
    }

    /// Decode raw bytes in the given encoding.
    ///
    /// Malformed bytes or a non-map top-level value yield
    /// [`OneBotError::Parse`]; schema violations yield
    /// [`OneBotError::Validation`].
    pub fn decode(bytes: &[u8], encoding: Encoding, prefix: &str) -> Result<Request> {
        let value: Value = match encoding {
            Encoding::Json => serde_json::from_slice(bytes)
                .map_err(|e| OneBotError::Parse(format!("request body is not valid JSON: {e}")))?,
            Encoding::MessagePack => decode_msgpack(bytes).map_err(|e| {
                OneBotError::Parse(format!("request body is not valid MessagePack: {e}"))
            })?,
        };

        match value {
            Value::Object(map) => Self::from_map(map, prefix),
            _ => Err(OneBotError::Parse(match encoding {
                Encoding::Json => "action request is not a JSON object".to_string(),
                Encoding::MessagePack => "action request is not a MessagePack map".to_string(),
            })),
        }
    }

    /// Validate a generic map and build a request from it.
    pub fn from_map(mut map: Map<String, Value>, prefix: &str) -> Result<Request> {
        let full_name = match map.remove("action") {
            Some(Value::String(name)) => name,
            _ => {
                return Err(OneBotError::Validation(
                    "`action` field is missing or not a string".to_string(),
                ))
            }
        };
        if full_name.is_empty() {
            return Err(OneBotError::Validation("`action` field is empty".to_string()));
        }

        let params = match map.remove("params") {
            Some(Value::Object(params)) => Params::from(params),
            _ => {
                return Err(OneBotError::Validation(
                    "`params` field is missing or not an object".to_string(),
                ))
            }
        };

        let bot_self = match map.remove("self") {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value::<BotSelf>(value).map_err(|e| {
                OneBotError::Validation(format!("`self` field is invalid: {e}"))
            })?),
        };

        let action = Action::parse(&full_name, prefix);
        if action.name().is_empty() {
            return Err(OneBotError::Validation(format!(
                "`action` field `{full_name}` has an empty name after its prefix"
            )));
        }

        Ok(Request {
            action,
            params,
            echo: map.remove("echo").unwrap_or(Value::Null),
            bot_self,
        })
    }

    /// Generic map form, as a client would send it.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("action".to_string(), Value::String(self.action.wire_name()));
        map.insert("params".to_string(), Value::Object(self.params.as_map().clone()));
        if !self.echo.is_null() {
            map.insert("echo".to_string(), self.echo.clone());
        }
        if let Some(bot_self) = &self.bot_self {
            map.insert(
                "self".to_string(),
                serde_json::json!({
                    "platform": bot_self.platform,
                    "user_id": bot_self.user_id,
                }),
            );
        }
        Value::Object(map)
    }

    /// Encode the request in the given encoding.
    pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>> {
        let value = self.to_value();
        match encoding {
            Encoding::Json => Ok(serde_json::to_vec(&value)?),
            Encoding::MessagePack => Ok(rmp_serde::to_vec_named(&value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_json(value: Value, prefix: &str) -> Result<Request> {
        Request::decode(&serde_json::to_vec(&value).unwrap(), Encoding::Json, prefix)
    }

    #[test]
    fn test_parse_core_action() {
        let request = decode_json(json!({"action": "get_version", "params": {}}), "myplat").unwrap();
        assert_eq!(request.action, Action::Core("get_version".to_string()));
        assert!(request.params.is_empty());
        assert_eq!(request.echo, Value::Null);
        assert!(request.bot_self.is_none());
    }

    #[test]
    fn test_parse_extended_action() {
        let request =
            decode_json(json!({"action": "myplat_some_action", "params": {}}), "myplat").unwrap();
        assert!(request.action.is_extended());
        assert_eq!(request.action.name(), "some_action");
        assert_eq!(request.action.prefix(), Some("myplat"));
        assert_eq!(request.action.to_string(), "myplat_some_action");
    }

    #[test]
    fn test_other_vendor_prefix_is_core() {
        let request =
            decode_json(json!({"action": "otherplat_some_action", "params": {}}), "myplat").unwrap();
        assert_eq!(request.action, Action::core("otherplat_some_action"));
    }

    #[test]
    fn test_echo_and_self_copied() {
        let request = decode_json(
            json!({
                "action": "send_message",
                "params": {"user_id": "1"},
                "echo": {"seq": 12},
                "self": {"platform": "qq", "user_id": "bot"}
            }),
            "qq",
        )
        .unwrap();
        assert_eq!(request.echo, json!({"seq": 12}));
        assert_eq!(request.bot_self, Some(BotSelf::new("qq", "bot")));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = Request::decode(b"{not json", Encoding::Json, "p").unwrap_err();
        assert!(matches!(err, OneBotError::Parse(_)));

        let err = Request::decode(b"[1, 2]", Encoding::Json, "p").unwrap_err();
        assert!(matches!(err, OneBotError::Parse(_)));
    }

    #[test]
    fn test_invalid_msgpack_is_parse_error() {
        let err = Request::decode(&[0xc1], Encoding::MessagePack, "p").unwrap_err();
        assert!(matches!(err, OneBotError::Parse(_)));

        let not_a_map = rmp_serde::to_vec(&42).unwrap();
        let err = Request::decode(&not_a_map, Encoding::MessagePack, "p").unwrap_err();
        assert!(matches!(err, OneBotError::Parse(_)));
    }

    #[test]
    fn test_missing_fields_are_validation_errors() {
        let cases = vec![
            json!({"params": {}}),
            json!({"action": 5, "params": {}}),
            json!({"action": "", "params": {}}),
            json!({"action": "get_version"}),
            json!({"action": "get_version", "params": []}),
            json!({"action": "get_version", "params": {}, "self": "bot"}),
            json!({"action": "myplat_", "params": {}}),
        ];
        for case in cases {
            let err = decode_json(case.clone(), "myplat").unwrap_err();
            assert!(
                matches!(err, OneBotError::Validation(_)),
                "expected validation error for {case}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_msgpack_request_decodes() {
        let bytes = rmp_serde::to_vec_named(&json!({
            "action": "get_status",
            "params": {"verbose": true},
            "echo": "abc"
        }))
        .unwrap();
        let request = Request::decode(&bytes, Encoding::MessagePack, "p").unwrap();
        assert_eq!(request.action.name(), "get_status");
        assert_eq!(request.params.get_bool("verbose"), Ok(true));
        assert_eq!(request.echo, json!("abc"));
    }

    #[test]
    fn test_msgpack_binary_param_is_accepted() {
        // {"action": "upload_file", "params": {"data": bin[1, 2, 3], 1: "one"}}
        let mut bytes = vec![0x82, 0xa6];
        bytes.extend_from_slice(b"action");
        bytes.push(0xab);
        bytes.extend_from_slice(b"upload_file");
        bytes.push(0xa6);
        bytes.extend_from_slice(b"params");
        bytes.extend_from_slice(&[0x82, 0xa4]);
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&[0xc4, 0x03, 0x01, 0x02, 0x03]);
        bytes.extend_from_slice(&[0x01, 0xa3]);
        bytes.extend_from_slice(b"one");

        let request = Request::decode(&bytes, Encoding::MessagePack, "myplat").unwrap();
        assert_eq!(request.action, Action::core("upload_file"));
        assert_eq!(request.params.get_bytes("data"), Ok(vec![1, 2, 3]));
        assert_eq!(request.params.get_str("1"), Ok("one"));
    }

    #[test]
    fn test_encode_decode_roundtrip_both_encodings() {
        let mut params = Params::new();
        params.insert("user_id", json!("42"));
        params.insert("message", json!([{"type": "text", "data": {"text": "hi"}}]));
        let request = Request::new(Action::extended("myplat", "do_it"), params)
            .with_echo(json!(7))
            .with_self(BotSelf::new("myplat", "bot"));

        for encoding in [Encoding::Json, Encoding::MessagePack] {
            let bytes = request.encode(encoding).unwrap();
            let decoded = Request::decode(&bytes, encoding, "myplat").unwrap();
            assert_eq!(decoded, request);
        }
    }
}
