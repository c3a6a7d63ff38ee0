//! # Wire Messages
//!
//! The realtime protocol speaks JSON envelopes `{op, data}` in both
//! directions. Operation codes are stable integers; `Update` is reserved
//! and currently rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OpCode {
    Auth = 0,
    Insert = 1,
    Delete = 2,
    /// Reserved, unimplemented
    Update = 3,
    Get = 4,
}

impl TryFrom<u8> for OpCode {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Auth),
            1 => Ok(Self::Insert),
            2 => Ok(Self::Delete),
            3 => Ok(Self::Update),
            4 => Ok(Self::Get),
            other => Err(format!("unknown op code {}", other)),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

/// The message envelope, both client-to-server and server-to-client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub op: OpCode,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(op: OpCode, data: Value) -> Self {
        Self { op, data }
    }

    /// Authorization acknowledgment.
    pub fn auth_ack(authorized: bool, client_id: &str) -> Self {
        Self::new(
            OpCode::Auth,
            serde_json::json!({ "authorized": authorized, "client_id": client_id }),
        )
    }

    /// Error reply carried on the envelope of the failing operation.
    pub fn error(op: OpCode, title: &str, message: &str) -> Self {
        Self::new(
            op,
            serde_json::json!({ "error": ErrorBody::new(title, message) }),
        )
    }

    /// Serialize for the wire.
    pub fn to_text(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Auth operation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
}

/// Payload shared by the crud operations: a base path and (for inserts)
/// a nested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrudPayload {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

/// Error shape embedded in error replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub title: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn op_codes_serialize_as_integers() {
        let envelope = Envelope::new(OpCode::Insert, json!({"path": "a"}));
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains("\"op\":1"));

        let parsed: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.op, OpCode::Insert);
    }

    #[test]
    fn unknown_op_codes_fail_to_decode() {
        let result = serde_json::from_str::<Envelope>(r#"{"op": 9, "data": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let parsed: Envelope = serde_json::from_str(r#"{"op": 0}"#).unwrap();
        assert_eq!(parsed.data, Value::Null);
    }

    #[test]
    fn crud_payload_decodes_from_envelope_data() {
        let parsed: Envelope =
            serde_json::from_str(r#"{"op": 1, "data": {"path": "posts", "data": {"a": 1}}}"#)
                .unwrap();
        let payload: CrudPayload = serde_json::from_value(parsed.data).unwrap();
        assert_eq!(payload.path, "posts");
        assert_eq!(payload.data, json!({"a": 1}));
    }
}
