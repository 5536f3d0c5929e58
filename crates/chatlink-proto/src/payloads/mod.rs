//! Typed envelope payloads.
//!
//! The envelope's `type` decides how `data` is interpreted. [`Payload`] gives
//! each type its own variant so consumers match exhaustively instead of
//! poking at untyped JSON.
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one [`MessageType`] (enforced by match
//! exhaustiveness in [`Payload::message_type`] and [`Payload::decode`]).

pub mod channel;
pub mod session;
pub mod user;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{Envelope, MessageType, ProtocolError, Result};

/// All envelope payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    // Connection control
    /// Connection announcement
    Connect,
    /// Graceful disconnect notice
    Disconnect,
    /// Keepalive request
    Ping,
    /// Keepalive response
    Pong,

    // Channel membership
    /// Join command or server echo of a join
    Join(channel::ChannelRef),
    /// Leave command or server acknowledgment of a leave
    Leave(channel::ChannelRef),

    // Channel traffic
    /// Chat message
    Message(channel::ChatMessage),
    /// Typing started (or updated)
    Typing(channel::Typing),
    /// Typing stopped
    StopTyping(channel::Typing),
    /// Another member joined a channel
    MemberJoin(channel::MemberChange),
    /// Another member left a channel
    MemberLeave(channel::MemberChange),

    // User-level events
    /// Presence update
    UserStatus(user::UserStatus),
    /// Notification to display
    Notification(user::UserNotification),

    /// Server-reported error
    Error(session::ErrorPayload),
}

impl Payload {
    /// Message type corresponding to this payload.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Connect => MessageType::ConnectionConnect,
            Self::Disconnect => MessageType::ConnectionDisconnect,
            Self::Ping => MessageType::ConnectionPing,
            Self::Pong => MessageType::ConnectionPong,
            Self::Join(_) => MessageType::ChannelJoin,
            Self::Leave(_) => MessageType::ChannelLeave,
            Self::Message(_) => MessageType::ChannelMessage,
            Self::Typing(_) => MessageType::ChannelTyping,
            Self::StopTyping(_) => MessageType::ChannelStopTyping,
            Self::MemberJoin(_) => MessageType::ChannelMemberJoin,
            Self::MemberLeave(_) => MessageType::ChannelMemberLeave,
            Self::UserStatus(_) => MessageType::UserStatus,
            Self::Notification(_) => MessageType::UserNotification,
            Self::Error(_) => MessageType::Error,
        }
    }

    /// Serialize the payload into an envelope `data` value.
    ///
    /// Control payloads carry an empty object.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if serialization fails
    pub fn to_data(&self) -> Result<Value> {
        match self {
            Self::Connect | Self::Disconnect | Self::Ping | Self::Pong => {
                Ok(Value::Object(Map::new()))
            },
            Self::Join(inner) | Self::Leave(inner) => to_value(inner),
            Self::Message(inner) => to_value(inner),
            Self::Typing(inner) | Self::StopTyping(inner) => to_value(inner),
            Self::MemberJoin(inner) | Self::MemberLeave(inner) => to_value(inner),
            Self::UserStatus(inner) => to_value(inner),
            Self::Notification(inner) => to_value(inner),
            Self::Error(inner) => to_value(inner),
        }
    }

    /// Decode `data` according to `kind`.
    ///
    /// Control payloads ignore `data` entirely.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidPayload` if `data` does not match `kind`
    pub fn decode(kind: MessageType, data: &Value) -> Result<Self> {
        let payload = match kind {
            MessageType::ConnectionConnect => Self::Connect,
            MessageType::ConnectionDisconnect => Self::Disconnect,
            MessageType::ConnectionPing => Self::Ping,
            MessageType::ConnectionPong => Self::Pong,
            MessageType::ChannelJoin => Self::Join(from_value(kind, data)?),
            MessageType::ChannelLeave => Self::Leave(from_value(kind, data)?),
            MessageType::ChannelMessage => Self::Message(from_value(kind, data)?),
            MessageType::ChannelTyping => Self::Typing(from_value(kind, data)?),
            MessageType::ChannelStopTyping => Self::StopTyping(from_value(kind, data)?),
            MessageType::ChannelMemberJoin => Self::MemberJoin(from_value(kind, data)?),
            MessageType::ChannelMemberLeave => Self::MemberLeave(from_value(kind, data)?),
            MessageType::UserStatus => Self::UserStatus(from_value(kind, data)?),
            MessageType::UserNotification => Self::Notification(from_value(kind, data)?),
            MessageType::Error => Self::Error(from_value(kind, data)?),
        };

        Ok(payload)
    }

    /// Typed view of an envelope's `data`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidPayload` if `data` does not match the type
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        Self::decode(envelope.kind, &envelope.data)
    }
}

fn to_value<T: Serialize>(inner: &T) -> Result<Value> {
    Ok(serde_json::to_value(inner)?)
}

fn from_value<T: DeserializeOwned>(kind: MessageType, data: &Value) -> Result<T> {
    T::deserialize(data)
        .map_err(|e| ProtocolError::InvalidPayload { kind, reason: e.to_string() })
}
