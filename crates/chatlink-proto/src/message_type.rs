//! Message-type vocabulary.
//!
//! The `type` field of an envelope must be one of these values. Anything else
//! is a protocol error and the frame is discarded.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::ProtocolError;

/// Envelope type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `connection.connect`
    ConnectionConnect,
    /// `connection.disconnect`
    ConnectionDisconnect,
    /// `connection.ping`
    ConnectionPing,
    /// `connection.pong`
    ConnectionPong,
    /// `channel.join`
    ChannelJoin,
    /// `channel.leave`
    ChannelLeave,
    /// `channel.message`
    ChannelMessage,
    /// `channel.typing`
    ChannelTyping,
    /// `channel.stop_typing`
    ChannelStopTyping,
    /// `channel.member.join`
    ChannelMemberJoin,
    /// `channel.member.leave`
    ChannelMemberLeave,
    /// `user.status`
    UserStatus,
    /// `user.notification`
    UserNotification,
    /// `error`
    Error,
}

impl MessageType {
    /// Every known type, in wire-vocabulary order.
    pub const ALL: [Self; 14] = [
        Self::ConnectionConnect,
        Self::ConnectionDisconnect,
        Self::ConnectionPing,
        Self::ConnectionPong,
        Self::ChannelJoin,
        Self::ChannelLeave,
        Self::ChannelMessage,
        Self::ChannelTyping,
        Self::ChannelStopTyping,
        Self::ChannelMemberJoin,
        Self::ChannelMemberLeave,
        Self::UserStatus,
        Self::UserNotification,
        Self::Error,
    ];

    /// Wire spelling of this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionConnect => "connection.connect",
            Self::ConnectionDisconnect => "connection.disconnect",
            Self::ConnectionPing => "connection.ping",
            Self::ConnectionPong => "connection.pong",
            Self::ChannelJoin => "channel.join",
            Self::ChannelLeave => "channel.leave",
            Self::ChannelMessage => "channel.message",
            Self::ChannelTyping => "channel.typing",
            Self::ChannelStopTyping => "channel.stop_typing",
            Self::ChannelMemberJoin => "channel.member.join",
            Self::ChannelMemberLeave => "channel.member.leave",
            Self::UserStatus => "user.status",
            Self::UserNotification => "user.notification",
            Self::Error => "error",
        }
    }

    /// Parse a wire spelling. `None` for anything outside the vocabulary.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Connection-level control traffic (handled by the connection manager,
    /// never routed to channel state).
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(
            self,
            Self::ConnectionConnect
                | Self::ConnectionDisconnect
                | Self::ConnectionPing
                | Self::ConnectionPong
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s).ok_or_else(|| ProtocolError::UnknownType(s.to_string()))
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw)
            .ok_or_else(|| de::Error::custom(format!("unknown message type: {raw}")))
    }
}
