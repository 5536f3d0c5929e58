//! Inbound message router.
//!
//! Dispatches delivered envelopes by type into per-channel state (message
//! logs, typing indicators) and the connected-user presence table, and reports
//! what changed as [`RouterOutput`]s.

use std::collections::{BTreeSet, HashMap, HashSet};

use chatlink_core::{ErrorCode, ErrorInfo};
use chatlink_proto::{
    ChannelId, Envelope, Payload, UserId,
    payloads::{
        channel::{ChatMessage, Typing},
        user::{PresenceStatus, UserNotification},
    },
};
use tracing::{debug, warn};

/// Router configuration
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    /// Also log messages for joined channels that are not active
    pub log_inactive_channels: bool,
}

/// One message in a channel log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLogEntry {
    /// Message id
    pub id: String,
    /// Channel the message belongs to
    pub channel_id: ChannelId,
    /// Sender id
    pub sender_id: Option<UserId>,
    /// Sender display name
    pub sender_name: Option<String>,
    /// Sender avatar URL
    pub sender_avatar: Option<String>,
    /// Message text
    pub text: String,
    /// Attachment URL
    pub url: Option<String>,
    /// Attachment file name
    pub file_name: Option<String>,
    /// Creation time in Unix milliseconds
    pub created_at: u64,
    /// Application-level message kind
    pub message_type: Option<String>,
}

impl MessageLogEntry {
    /// Normalize a chat payload. Missing id, sender and creation time fall
    /// back to the envelope's.
    pub fn from_message(message: ChatMessage, envelope: &Envelope) -> Self {
        let sender_id = message.sender_id.or_else(|| {
            (!envelope.user_id.is_empty()).then(|| UserId::from(envelope.user_id.as_str()))
        });

        Self {
            id: message.id.unwrap_or_else(|| envelope.id.clone()),
            channel_id: message.channel_id,
            sender_id,
            sender_name: message.sender_name,
            sender_avatar: message.sender_avatar,
            text: message.text,
            url: message.url,
            file_name: message.file_name,
            created_at: message.created_at.unwrap_or(envelope.timestamp),
            message_type: message.message_type,
        }
    }
}

/// A user currently typing in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEntry {
    /// Channel
    pub channel_id: ChannelId,
    /// Typing user
    pub user_id: UserId,
    /// Always true while the entry exists
    pub is_typing: bool,
    /// Envelope timestamp of the latest typing event
    pub timestamp: u64,
}

/// What a dispatched envelope changed.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterOutput {
    /// Message appended to a channel log
    MessageAppended(MessageLogEntry),
    /// Typing entries of a channel changed
    TypingChanged {
        /// Channel
        channel_id: ChannelId,
    },
    /// Presence table updated
    PresenceChanged {
        /// User
        user_id: UserId,
        /// New status
        status: PresenceStatus,
    },
    /// Another member joined a channel
    MemberJoined {
        /// Channel
        channel_id: ChannelId,
        /// Member
        user_id: UserId,
    },
    /// A member left a channel
    MemberLeft {
        /// Channel
        channel_id: ChannelId,
        /// Member
        user_id: UserId,
    },
    /// Server confirmed our join
    ChannelJoined {
        /// Channel
        channel_id: ChannelId,
    },
    /// Server acknowledged our leave
    LeaveAcknowledged {
        /// Channel
        channel_id: ChannelId,
    },
    /// Notification for display
    Notification(UserNotification),
    /// Server-reported error
    ServerError(ErrorInfo),
}

/// Membership view the router needs to decide what to log.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    /// Active channel
    pub active: Option<&'a ChannelId>,
    /// Joined channels
    pub joined: &'a BTreeSet<ChannelId>,
    /// Local user
    pub self_id: Option<&'a UserId>,
}

/// Per-session inbound state.
#[derive(Debug, Clone, Default)]
pub struct MessageRouter {
    config: RouterConfig,
    logs: HashMap<ChannelId, Vec<MessageLogEntry>>,
    typing: HashMap<ChannelId, Vec<TypingEntry>>,
    users: HashMap<UserId, PresenceStatus>,
    /// Ids of local messages the server has not echoed yet
    unconfirmed: HashSet<String>,
}

impl MessageRouter {
    /// Create an empty router.
    pub fn new(config: RouterConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Message log of a channel, oldest first.
    pub fn messages(&self, channel_id: &ChannelId) -> &[MessageLogEntry] {
        self.logs.get(channel_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Users typing in a channel.
    pub fn typing(&self, channel_id: &ChannelId) -> &[TypingEntry] {
        self.typing.get(channel_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Channels with at least one typing entry.
    pub fn typing_channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.typing.keys()
    }

    /// Presence table.
    pub fn connected_users(&self) -> &HashMap<UserId, PresenceStatus> {
        &self.users
    }

    /// Dispatch one delivered envelope.
    ///
    /// Envelopes whose `data` does not match their type are logged and
    /// dropped without touching any state.
    pub fn dispatch(&mut self, envelope: &Envelope, ctx: RouteContext<'_>) -> Vec<RouterOutput> {
        let payload = match envelope.payload() {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, kind = %envelope.kind, id = %envelope.id, "dropping invalid payload");
                return Vec::new();
            },
        };

        match payload {
            Payload::Message(message) => {
                let entry = MessageLogEntry::from_message(message, envelope);
                self.append_remote(entry, ctx)
                    .map(RouterOutput::MessageAppended)
                    .into_iter()
                    .collect()
            },
            Payload::Typing(typing) => self.on_typing(typing, envelope.timestamp),
            Payload::StopTyping(typing) => {
                self.remove_typing(&typing.channel_id, &typing.user_id).into_iter().collect()
            },
            Payload::MemberJoin(change) => vec![RouterOutput::MemberJoined {
                channel_id: change.channel_id,
                user_id: change.user_id,
            }],
            Payload::MemberLeave(change) => {
                let is_self = ctx.self_id == Some(&change.user_id);
                let mut outputs = Vec::new();
                if is_self {
                    outputs.push(RouterOutput::LeaveAcknowledged {
                        channel_id: change.channel_id.clone(),
                    });
                }
                outputs.push(RouterOutput::MemberLeft {
                    channel_id: change.channel_id,
                    user_id: change.user_id,
                });
                outputs
            },
            Payload::Join(channel) => {
                vec![RouterOutput::ChannelJoined { channel_id: channel.channel_id }]
            },
            Payload::Leave(channel) => {
                vec![RouterOutput::LeaveAcknowledged { channel_id: channel.channel_id }]
            },
            Payload::UserStatus(status) => {
                self.users.insert(status.user_id.clone(), status.status);
                vec![RouterOutput::PresenceChanged {
                    user_id: status.user_id,
                    status: status.status,
                }]
            },
            Payload::Notification(notification) => vec![RouterOutput::Notification(notification)],
            Payload::Error(error) => {
                let mut info = ErrorInfo::new(ErrorCode::Server(error.code_string()), error.message);
                info.details = error.details;
                vec![RouterOutput::ServerError(info)]
            },
            Payload::Connect | Payload::Disconnect | Payload::Ping | Payload::Pong => {
                debug!(kind = %envelope.kind, "control envelope ignored");
                Vec::new()
            },
        }
    }

    /// Append a locally sent message (optimistic echo).
    ///
    /// The entry stays unconfirmed until the server echoes it, either under
    /// the same id or, for backends that assign their own ids, as a message
    /// in the same channel with the same sender and text.
    ///
    /// Returns the entry if it was logged.
    pub fn append_local(
        &mut self,
        entry: MessageLogEntry,
        ctx: RouteContext<'_>,
    ) -> Option<MessageLogEntry> {
        let entry = self.append(entry, ctx)?;
        self.unconfirmed.insert(entry.id.clone());
        Some(entry)
    }

    /// Drop typing entries of a channel. Returns true if any were removed.
    pub fn clear_typing(&mut self, channel_id: &ChannelId) -> bool {
        self.typing.remove(channel_id).is_some_and(|entries| !entries.is_empty())
    }

    /// Drop every typing entry.
    pub fn clear_all_typing(&mut self) {
        self.typing.clear();
    }

    /// Drop all session state.
    pub fn clear(&mut self) {
        self.logs.clear();
        self.typing.clear();
        self.users.clear();
        self.unconfirmed.clear();
    }

    fn should_log(&self, channel_id: &ChannelId, ctx: RouteContext<'_>) -> bool {
        ctx.active == Some(channel_id)
            || (self.config.log_inactive_channels && ctx.joined.contains(channel_id))
    }

    /// Append a message from the server, folding the echo of an unconfirmed
    /// local message into the local entry.
    fn append_remote(
        &mut self,
        entry: MessageLogEntry,
        ctx: RouteContext<'_>,
    ) -> Option<MessageLogEntry> {
        if self.unconfirmed.remove(&entry.id) {
            debug!(id = %entry.id, "own message confirmed");
            return None;
        }

        if let Some(log) = self.logs.get_mut(&entry.channel_id)
            && !log.iter().any(|e| e.id == entry.id)
            && let Some(local) = log.iter_mut().find(|e| {
                self.unconfirmed.contains(&e.id)
                    && e.sender_id == entry.sender_id
                    && e.text == entry.text
            })
        {
            debug!(local = %local.id, server = %entry.id, "own message confirmed under server id");
            self.unconfirmed.remove(&local.id);
            local.id = entry.id;
            local.created_at = entry.created_at;
            return None;
        }

        self.append(entry, ctx)
    }

    fn append(&mut self, entry: MessageLogEntry, ctx: RouteContext<'_>) -> Option<MessageLogEntry> {
        if !self.should_log(&entry.channel_id, ctx) {
            debug!(channel_id = %entry.channel_id, "message for inactive channel not logged");
            return None;
        }

        let log = self.logs.entry(entry.channel_id.clone()).or_default();
        if log.iter().any(|existing| existing.id == entry.id) {
            debug!(id = %entry.id, "duplicate message skipped");
            return None;
        }

        log.push(entry.clone());
        Some(entry)
    }

    fn on_typing(&mut self, typing: Typing, timestamp: u64) -> Vec<RouterOutput> {
        if typing.is_typing == Some(false) {
            return self.remove_typing(&typing.channel_id, &typing.user_id).into_iter().collect();
        }

        let entries = self.typing.entry(typing.channel_id.clone()).or_default();
        match entries.iter_mut().find(|e| e.user_id == typing.user_id) {
            Some(existing) => existing.timestamp = timestamp,
            None => entries.push(TypingEntry {
                channel_id: typing.channel_id.clone(),
                user_id: typing.user_id,
                is_typing: true,
                timestamp,
            }),
        }

        vec![RouterOutput::TypingChanged { channel_id: typing.channel_id }]
    }

    fn remove_typing(&mut self, channel_id: &ChannelId, user_id: &UserId) -> Option<RouterOutput> {
        let entries = self.typing.get_mut(channel_id)?;
        let before = entries.len();
        entries.retain(|e| &e.user_id != user_id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            self.typing.remove(channel_id);
        }

        removed.then(|| RouterOutput::TypingChanged { channel_id: channel_id.clone() })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn envelope(kind: &str, data: Value) -> Envelope {
        let text = json!({
            "id": "env-1",
            "type": kind,
            "data": data,
            "timestamp": 1_000,
            "user_id": "3",
        })
        .to_string();
        Envelope::decode(&text).unwrap()
    }

    fn joined(ids: &[&str]) -> BTreeSet<ChannelId> {
        ids.iter().map(|id| ChannelId::from(*id)).collect()
    }

    #[test]
    fn messages_for_active_channel_are_logged() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&["7"]);
        let active = ChannelId::from("7");
        let ctx = RouteContext { active: Some(&active), joined: &joined, self_id: None };

        let outputs = router.dispatch(
            &envelope("channel.message", json!({ "channel_id": 7, "text": "hi" })),
            ctx,
        );

        assert_eq!(outputs.len(), 1);
        let log = router.messages(&active);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, "env-1");
        assert_eq!(log[0].sender_id, Some(UserId::from("3")));
        assert_eq!(log[0].created_at, 1_000);
    }

    #[test]
    fn background_messages_follow_config() {
        let joined = joined(&["7", "8"]);
        let active = ChannelId::from("7");
        let ctx = RouteContext { active: Some(&active), joined: &joined, self_id: None };
        let frame = envelope("channel.message", json!({ "channel_id": "8", "text": "bg" }));

        let mut filtered = MessageRouter::new(RouterConfig::default());
        assert!(filtered.dispatch(&frame, ctx).is_empty());
        assert!(filtered.messages(&ChannelId::from("8")).is_empty());

        let mut logging = MessageRouter::new(RouterConfig { log_inactive_channels: true });
        assert_eq!(logging.dispatch(&frame, ctx).len(), 1);
        assert_eq!(logging.messages(&ChannelId::from("8")).len(), 1);
    }

    #[test]
    fn duplicate_ids_are_skipped() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&["7"]);
        let active = ChannelId::from("7");
        let ctx = RouteContext { active: Some(&active), joined: &joined, self_id: None };
        let frame = envelope("channel.message", json!({ "id": "m1", "channel_id": "7" }));

        router.dispatch(&frame, ctx);
        assert!(router.dispatch(&frame, ctx).is_empty());
        assert_eq!(router.messages(&active).len(), 1);
    }

    fn local(id: &str, text: &str) -> MessageLogEntry {
        MessageLogEntry {
            id: id.into(),
            channel_id: ChannelId::from("7"),
            sender_id: Some(UserId::from("3")),
            sender_name: None,
            sender_avatar: None,
            text: text.into(),
            url: None,
            file_name: None,
            created_at: 900,
            message_type: None,
        }
    }

    #[test]
    fn echo_under_server_assigned_id_is_folded_in() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&["7"]);
        let active = ChannelId::from("7");
        let ctx = RouteContext { active: Some(&active), joined: &joined, self_id: None };

        router.append_local(local("local-1", "hi"), ctx).unwrap();
        router.append_local(local("local-2", "hi"), ctx).unwrap();

        let echo = envelope("channel.message", json!({ "id": "srv-9", "channel_id": "7", "text": "hi" }));
        assert!(router.dispatch(&echo, ctx).is_empty());

        let ids: Vec<_> = router.messages(&active).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["srv-9", "local-2"]);
        assert_eq!(router.messages(&active)[0].created_at, 1_000);

        // The same text from someone else is a new message.
        let other = json!({ "id": "srv-10", "channel_id": "7", "sender_id": "5", "text": "hi" });
        assert_eq!(router.dispatch(&envelope("channel.message", other), ctx).len(), 1);
        assert_eq!(router.messages(&active).len(), 3);
    }

    #[test]
    fn confirmed_message_is_not_matched_again() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&["7"]);
        let active = ChannelId::from("7");
        let ctx = RouteContext { active: Some(&active), joined: &joined, self_id: None };

        router.append_local(local("local-1", "hi"), ctx).unwrap();
        let echo = envelope("channel.message", json!({ "id": "local-1", "channel_id": "7", "text": "hi" }));
        assert!(router.dispatch(&echo, ctx).is_empty());

        let repeat = envelope("channel.message", json!({ "id": "srv-2", "channel_id": "7", "text": "hi" }));
        assert_eq!(router.dispatch(&repeat, ctx).len(), 1);
        assert_eq!(router.messages(&active).len(), 2);
    }

    #[test]
    fn stop_typing_removes_exact_entry() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&["7"]);
        let ctx = RouteContext { active: None, joined: &joined, self_id: None };
        let channel = ChannelId::from("7");

        router.dispatch(&envelope("channel.typing", json!({ "channel_id": "7", "user_id": "1" })), ctx);
        router.dispatch(&envelope("channel.typing", json!({ "channel_id": "7", "user_id": "2" })), ctx);
        assert_eq!(router.typing(&channel).len(), 2);

        router.dispatch(
            &envelope("channel.stop_typing", json!({ "channel_id": "7", "user_id": "1" })),
            ctx,
        );

        let remaining = router.typing(&channel);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, UserId::from("2"));
    }

    #[test]
    fn typing_false_removes_entry() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&[]);
        let ctx = RouteContext { active: None, joined: &joined, self_id: None };

        router.dispatch(&envelope("channel.typing", json!({ "channel_id": "7", "user_id": "1" })), ctx);
        router.dispatch(
            &envelope("channel.typing", json!({ "channel_id": "7", "user_id": "1", "is_typing": false })),
            ctx,
        );

        assert!(router.typing(&ChannelId::from("7")).is_empty());
    }

    #[test]
    fn status_overwrites_presence() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&[]);
        let ctx = RouteContext { active: None, joined: &joined, self_id: None };

        router.dispatch(&envelope("user.status", json!({ "user_id": "5", "status": "online" })), ctx);
        router.dispatch(&envelope("user.status", json!({ "user_id": "5", "status": "away" })), ctx);

        assert_eq!(router.connected_users().get(&UserId::from("5")), Some(&PresenceStatus::Away));
    }

    #[test]
    fn leave_acks_are_recognized() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&[]);
        let me = UserId::from("42");
        let ctx = RouteContext { active: None, joined: &joined, self_id: Some(&me) };

        let outputs = router.dispatch(&envelope("channel.leave", json!({ "channel_id": "7" })), ctx);
        assert_eq!(outputs, vec![RouterOutput::LeaveAcknowledged { channel_id: ChannelId::from("7") }]);

        let outputs = router.dispatch(
            &envelope("channel.member.leave", json!({ "channel_id": "7", "user_id": "42" })),
            ctx,
        );
        assert!(outputs.contains(&RouterOutput::LeaveAcknowledged { channel_id: ChannelId::from("7") }));

        let outputs = router.dispatch(
            &envelope("channel.member.leave", json!({ "channel_id": "7", "user_id": "9" })),
            ctx,
        );
        assert!(!outputs.iter().any(|o| matches!(o, RouterOutput::LeaveAcknowledged { .. })));
    }

    #[test]
    fn server_errors_become_error_info() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&[]);
        let ctx = RouteContext { active: None, joined: &joined, self_id: None };

        let outputs = router.dispatch(
            &envelope("error", json!({ "code": 403, "message": "forbidden", "details": { "channel_id": "7" } })),
            ctx,
        );

        let [RouterOutput::ServerError(info)] = &outputs[..] else {
            panic!("expected server error");
        };
        assert_eq!(info.code, ErrorCode::Server(Some("403".into())));
        assert_eq!(info.message, "forbidden");
        assert!(info.details.is_some());
    }

    #[test]
    fn invalid_payload_mutates_nothing() {
        let mut router = MessageRouter::new(RouterConfig::default());
        let joined = joined(&["7"]);
        let active = ChannelId::from("7");
        let ctx = RouteContext { active: Some(&active), joined: &joined, self_id: None };

        assert!(router.dispatch(&envelope("channel.message", json!("oops")), ctx).is_empty());
        assert!(router.messages(&active).is_empty());
    }
}
