//! Session-level payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error payload carried by `error` envelopes.
///
/// Servers disagree on whether `code` is a number or a string, so it is kept
/// as raw JSON and rendered through [`ErrorPayload::code_string`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Server error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Additional structured context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorPayload {
    /// Error code as a string. `None` if the server sent no code.
    pub fn code_string(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}
