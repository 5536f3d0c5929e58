//! Channel-scoped payloads.
//!
//! Field names are snake_case on the wire; camelCase aliases are accepted on
//! decode for backends that emit the browser-side spelling.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, UserId};

/// Reference to a channel (`channel.join`, `channel.leave`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Target channel.
    #[serde(alias = "channelId")]
    pub channel_id: ChannelId,
}

/// Chat message (`channel.message`).
///
/// Outbound messages only fill `id`, `channel_id`, `text`, `url` and
/// `file_name`; the server stamps the sender fields on the broadcast copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id. Outbound messages reuse the envelope id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Channel the message belongs to.
    #[serde(alias = "channelId")]
    pub channel_id: ChannelId,

    /// Sender id.
    #[serde(default, alias = "senderId", skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,

    /// Sender display name.
    #[serde(default, alias = "senderName", skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// Sender avatar URL.
    #[serde(default, alias = "senderAvatar", skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,

    /// Message text.
    #[serde(default)]
    pub text: String,

    /// Attachment URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Attachment file name.
    #[serde(default, alias = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Creation time in Unix milliseconds.
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,

    /// Application-level message kind (text, image, file, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
}

impl ChatMessage {
    /// Outbound text message.
    pub fn outbound(id: impl Into<String>, channel_id: ChannelId, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            channel_id,
            sender_id: None,
            sender_name: None,
            sender_avatar: None,
            text: text.into(),
            url: None,
            file_name: None,
            created_at: None,
            message_type: None,
        }
    }
}

/// Typing indicator (`channel.typing`, `channel.stop_typing`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typing {
    /// Channel the user is typing in.
    #[serde(alias = "channelId")]
    pub channel_id: ChannelId,

    /// Typing user.
    #[serde(alias = "userId")]
    pub user_id: UserId,

    /// Explicit flag. `None` means "typing" for `channel.typing` and is
    /// ignored for `channel.stop_typing`.
    #[serde(default, alias = "isTyping", skip_serializing_if = "Option::is_none")]
    pub is_typing: Option<bool>,
}

/// Membership change of another user (`channel.member.join`,
/// `channel.member.leave`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberChange {
    /// Channel whose membership changed.
    #[serde(alias = "channelId")]
    pub channel_id: ChannelId,

    /// User that joined or left.
    #[serde(alias = "userId")]
    pub user_id: UserId,
}
