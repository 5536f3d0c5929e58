//! Wire envelope.
//!
//! Every frame is one JSON object:
//!
//! ```text
//! { "id": "…", "type": "channel.message", "data": { … }, "timestamp": 1700000000000, "user_id": "42" }
//! ```
//!
//! Decoding is deliberately structural rather than a plain serde derive: each
//! field is checked individually so a rejected frame reports exactly which
//! field was wrong, and nothing past the check ever sees a half-valid
//! envelope.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{MessageType, Payload, ProtocolError, Result};

/// A single wire message.
///
/// # Invariants
///
/// - `kind` is always a known [`MessageType`]; unknown tags fail to decode.
/// - `data` is always present (it may be JSON `null`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Client-generated id, unique per send.
    pub id: String,
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Type-specific payload.
    pub data: Value,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
    /// Id of the user that produced the frame.
    pub user_id: String,
}

impl Envelope {
    /// Largest frame accepted by [`Envelope::decode`] (1 MiB).
    pub const MAX_FRAME_SIZE: usize = 1 << 20;

    /// Create an envelope.
    pub fn new(
        id: impl Into<String>,
        kind: MessageType,
        data: Value,
        timestamp: u64,
        user_id: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), kind, data, timestamp, user_id: user_id.into() }
    }

    /// Encode as a single JSON text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if serialization fails
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode and validate a JSON text frame.
    ///
    /// # Security
    ///
    /// The size check runs before JSON parsing so oversized frames are
    /// rejected without being parsed.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooLarge` if the frame exceeds `MAX_FRAME_SIZE`
    /// - `ProtocolError::Json` if the frame is not JSON
    /// - `ProtocolError::NotAnObject` if the frame is not a JSON object
    /// - `ProtocolError::MissingField` / `InvalidField` for structural errors
    /// - `ProtocolError::UnknownType` if `type` is outside the vocabulary
    pub fn decode(text: &str) -> Result<Self> {
        if text.len() > Self::MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: text.len(),
                max: Self::MAX_FRAME_SIZE,
            });
        }

        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let id = take_string(&mut object, "id")?;
        let raw_kind = take_string(&mut object, "type")?;
        let kind = MessageType::from_wire(&raw_kind)
            .ok_or_else(|| ProtocolError::UnknownType(raw_kind.clone()))?;
        let timestamp = take_timestamp(&mut object)?;
        let user_id = take_string(&mut object, "user_id")?;
        let data = object.remove("data").ok_or(ProtocolError::MissingField("data"))?;

        Ok(Self { id, kind, data, timestamp, user_id })
    }

    /// Typed view of `data` according to `kind`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidPayload` if `data` does not match `kind`
    pub fn payload(&self) -> Result<Payload> {
        Payload::decode(self.kind, &self.data)
    }
}

fn take_string(object: &mut Map<String, Value>, field: &'static str) -> Result<String> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ProtocolError::InvalidField { field, expected: "string" }),
        None => Err(ProtocolError::MissingField(field)),
    }
}

fn take_timestamp(object: &mut Map<String, Value>) -> Result<u64> {
    let invalid = ProtocolError::InvalidField { field: "timestamp", expected: "non-negative number" };
    match object.remove("timestamp") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .ok_or(invalid),
        Some(_) => Err(invalid),
        None => Err(ProtocolError::MissingField("timestamp")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn valid_frame() -> Value {
        json!({
            "id": "abc",
            "type": "channel.message",
            "data": { "channel_id": "7", "text": "hi" },
            "timestamp": 1_700_000_000_000_u64,
            "user_id": "42",
        })
    }

    fn without(field: &str) -> String {
        let mut frame = valid_frame();
        if let Value::Object(ref mut map) = frame {
            map.remove(field);
        }
        frame.to_string()
    }

    #[test]
    fn decodes_valid_frame() {
        let envelope = Envelope::decode(&valid_frame().to_string()).unwrap();
        assert_eq!(envelope.id, "abc");
        assert_eq!(envelope.kind, MessageType::ChannelMessage);
        assert_eq!(envelope.timestamp, 1_700_000_000_000);
        assert_eq!(envelope.user_id, "42");
    }

    #[test]
    fn every_required_field_is_enforced() {
        for field in ["id", "type", "timestamp", "user_id", "data"] {
            assert!(
                matches!(Envelope::decode(&without(field)), Err(ProtocolError::MissingField(f)) if f == field),
                "missing {field} should be rejected"
            );
        }
    }

    #[test]
    fn null_data_counts_as_present() {
        let mut frame = valid_frame();
        frame["data"] = Value::Null;
        assert!(Envelope::decode(&frame.to_string()).is_ok());
    }

    #[test]
    fn wrong_field_types_are_rejected() {
        let mut frame = valid_frame();
        frame["user_id"] = json!(42);
        assert!(matches!(
            Envelope::decode(&frame.to_string()),
            Err(ProtocolError::InvalidField { field: "user_id", .. })
        ));

        let mut frame = valid_frame();
        frame["timestamp"] = json!("yesterday");
        assert!(matches!(
            Envelope::decode(&frame.to_string()),
            Err(ProtocolError::InvalidField { field: "timestamp", .. })
        ));
    }

    #[test]
    fn fractional_timestamp_is_truncated() {
        let mut frame = valid_frame();
        frame["timestamp"] = json!(1234.9);
        assert_eq!(Envelope::decode(&frame.to_string()).unwrap().timestamp, 1234);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut frame = valid_frame();
        frame["type"] = json!("channel.explode");
        assert!(matches!(
            Envelope::decode(&frame.to_string()),
            Err(ProtocolError::UnknownType(t)) if t == "channel.explode"
        ));
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(matches!(Envelope::decode("[1,2,3]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(Envelope::decode("not json"), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn oversized_frame_is_rejected_before_parsing() {
        let text = "x".repeat(Envelope::MAX_FRAME_SIZE + 1);
        assert!(matches!(Envelope::decode(&text), Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn encode_uses_wire_field_names() {
        let envelope =
            Envelope::new("1", MessageType::ConnectionPing, json!({}), 5, "42");
        let encoded: Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();
        assert_eq!(encoded["type"], "connection.ping");
        assert_eq!(encoded["user_id"], "42");
        assert!(encoded.get("kind").is_none());
    }
}
