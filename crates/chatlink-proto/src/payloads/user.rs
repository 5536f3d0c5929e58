//! User-level payloads: presence and notifications.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, UserId};

/// Presence status carried by `user.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Connected and active
    Online,
    /// Connected but idle
    Away,
    /// Do not disturb
    Busy,
    /// Not connected
    Offline,
    /// Status the client does not recognize
    #[serde(other)]
    Unknown,
}

/// Presence update (`user.status`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    /// User whose status changed.
    #[serde(alias = "userId")]
    pub user_id: UserId,

    /// New status.
    pub status: PresenceStatus,
}

/// Notification for display (`user.notification`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotification {
    /// Optional title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Notification body.
    #[serde(default)]
    pub message: String,

    /// Channel the notification refers to, if any.
    #[serde(default, alias = "channelId", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<ChannelId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_does_not_fail_decode() {
        let status: UserStatus =
            serde_json::from_str(r#"{"user_id":"1","status":"invisible"}"#).unwrap();
        assert_eq!(status.status, PresenceStatus::Unknown);
    }

    #[test]
    fn known_status_is_lowercase_on_wire() {
        let encoded = serde_json::to_string(&PresenceStatus::Away).unwrap();
        assert_eq!(encoded, "\"away\"");
    }
}
