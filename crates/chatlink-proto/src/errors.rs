//! Protocol error types.

use thiserror::Error;

use crate::MessageType;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire envelopes.
///
/// Decoding errors are never fatal to a connection: the caller logs the
/// offending frame and drops it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is not valid JSON, or JSON (de)serialization failed
    #[error("invalid JSON: {0}")]
    Json(String),

    /// Frame decoded to something other than a JSON object
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// Required envelope field is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Envelope field has the wrong JSON type
    #[error("invalid field `{field}`: expected {expected}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Expected JSON shape
        expected: &'static str,
    },

    /// `type` is not part of the vocabulary
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// `data` does not match the shape required by `type`
    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload {
        /// Envelope type the payload was decoded for
        kind: MessageType,
        /// Decoder error
        reason: String,
    },

    /// Frame exceeds [`crate::Envelope::MAX_FRAME_SIZE`]
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the frame in bytes
        size: usize,
        /// Maximum accepted size
        max: usize,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
