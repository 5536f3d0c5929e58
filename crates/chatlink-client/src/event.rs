//! Client events, actions and notifications.

use std::time::Duration;

use chatlink_core::{ConnectionState, ErrorInfo};
use chatlink_proto::{
    ChannelId, Envelope, UserId,
    payloads::user::{PresenceStatus, UserNotification},
};
use url::Url;

use crate::router::MessageLogEntry;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Forwarding user intents (connect, join, switch, send)
/// - Forwarding transport events (opened, text, error, closed)
/// - Driving time forward via ticks
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (`tokio::time::Instant`).
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Open the connection for `user_id`.
    Connect {
        /// Local user
        user_id: UserId,
    },

    /// Leave all channels and close the connection.
    Disconnect,

    /// Join a channel and make it active.
    Join {
        /// Channel
        channel_id: ChannelId,
    },

    /// Leave a channel.
    Leave {
        /// Channel
        channel_id: ChannelId,
    },

    /// Leave every joined channel.
    LeaveAll,

    /// Switch the active channel (`None` clears it).
    SwitchChannel {
        /// Target channel
        channel_id: Option<ChannelId>,
    },

    /// The UI navigated to `route`.
    Navigate {
        /// Route path or URL
        route: String,
    },

    /// Send a chat message.
    SendMessage {
        /// Channel
        channel_id: ChannelId,
        /// Message text
        text: String,
        /// Attachment URL
        url: Option<String>,
        /// Attachment file name
        file_name: Option<String>,
    },

    /// Send a typing indicator.
    SendTyping {
        /// Channel
        channel_id: ChannelId,
        /// Started (true) or stopped (false) typing
        is_typing: bool,
    },

    /// Transport opened.
    TransportOpened,

    /// Transport received a text frame.
    TransportText(String),

    /// Transport reported an error.
    TransportError {
        /// Transport-reported reason
        reason: String,
    },

    /// Transport closed.
    TransportClosed {
        /// Transport-reported reason
        reason: String,
    },

    /// Transport failed to send an envelope the client produced.
    SendFailed {
        /// Envelope that was not sent
        envelope: Envelope,
        /// Transport-reported reason
        reason: String,
    },

    /// Time tick for timers.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Open the transport.
    Open {
        /// Socket URL
        url: Url,
    },

    /// Send an envelope as one text frame.
    Send(Envelope),

    /// Close the transport.
    Close {
        /// Reason for closing
        reason: String,
    },

    /// Publish a notification to observers.
    Notify(Notification),
}

/// Observable changes, published to UI subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Connection state changed.
    StateChanged {
        /// Previous state
        from: ConnectionState,
        /// New state
        to: ConnectionState,
    },

    /// Connection established.
    Connected,

    /// Initial connect failed.
    ConnectFailed(ErrorInfo),

    /// Established connection lost.
    Disconnected {
        /// Transport-reported reason
        reason: String,
    },

    /// Reconnect attempt scheduled.
    ReconnectScheduled {
        /// Attempt number (1-based)
        attempt: u32,
        /// Delay before the attempt
        delay: Duration,
    },

    /// Message appended to a channel log.
    MessageAppended(MessageLogEntry),

    /// Typing entries of a channel changed.
    TypingChanged {
        /// Channel
        channel_id: ChannelId,
    },

    /// Presence changed.
    PresenceChanged {
        /// User
        user_id: UserId,
        /// New status
        status: PresenceStatus,
    },

    /// Another member joined a channel.
    MemberJoined {
        /// Channel
        channel_id: ChannelId,
        /// Member
        user_id: UserId,
    },

    /// A member left a channel.
    MemberLeft {
        /// Channel
        channel_id: ChannelId,
        /// Member
        user_id: UserId,
    },

    /// Server confirmed our join.
    ChannelJoined {
        /// Channel
        channel_id: ChannelId,
    },

    /// Server acknowledged our leave.
    ChannelLeft {
        /// Channel
        channel_id: ChannelId,
    },

    /// Notification for display.
    UserNotification(UserNotification),

    /// Error recorded as the client's last error.
    Error(ErrorInfo),
}
