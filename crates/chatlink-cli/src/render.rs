//! Plain-text rendering of session output.

use std::fmt::Write as _;

use chatlink_app::SessionSnapshot;
use chatlink_client::{Notification, router::MessageLogEntry};

/// Render a notification as one line, or `None` for notifications that
/// are only visible through `/status`.
pub fn notification(notification: &Notification) -> Option<String> {
    let line = match notification {
        Notification::Connected => "* connected".to_string(),
        Notification::ConnectFailed(info) => format!("! connect failed: {info}"),
        Notification::Disconnected { reason } => format!("* connection lost: {reason}"),
        Notification::ReconnectScheduled { attempt, delay } => {
            format!("* reconnecting in {}ms (attempt {attempt})", delay.as_millis())
        },
        Notification::MessageAppended(entry) => message(entry),
        Notification::MemberJoined { channel_id, user_id } => {
            format!("* {user_id} joined #{channel_id}")
        },
        Notification::MemberLeft { channel_id, user_id } => {
            format!("* {user_id} left #{channel_id}")
        },
        Notification::ChannelJoined { channel_id } => format!("* now in #{channel_id}"),
        Notification::ChannelLeft { channel_id } => format!("* left #{channel_id}"),
        Notification::UserNotification(note) => match &note.title {
            Some(title) => format!("! {title}: {}", note.message),
            None => format!("! {}", note.message),
        },
        Notification::Error(info) => format!("! {info}"),
        Notification::StateChanged { .. }
        | Notification::TypingChanged { .. }
        | Notification::PresenceChanged { .. } => return None,
    };

    Some(line)
}

/// Render a chat message.
pub fn message(entry: &MessageLogEntry) -> String {
    let sender = entry
        .sender_name
        .clone()
        .or_else(|| entry.sender_id.as_ref().map(ToString::to_string))
        .unwrap_or_else(|| "?".to_string());

    let mut line = format!("[#{}] <{sender}> {}", entry.channel_id, entry.text);
    if let Some(file_name) = &entry.file_name {
        let _ = write!(line, " [{file_name}]");
    }
    line
}

/// Multi-line status summary.
pub fn status(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let user = snapshot.user_id.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
    let _ = writeln!(out, "state:    {} as {user}", snapshot.state);

    let joined: Vec<_> = snapshot.joined.iter().map(|c| format!("#{c}")).collect();
    let _ = writeln!(out, "joined:   {}", if joined.is_empty() { "-".into() } else { joined.join(" ") });

    let active = snapshot.active.as_ref().map_or_else(|| "-".to_string(), |c| format!("#{c}"));
    let suffix = if snapshot.switching { " (switching)" } else { "" };
    let _ = writeln!(out, "active:   {active}{suffix}");

    if !snapshot.typing.is_empty() {
        let typing: Vec<_> = snapshot.typing.iter().map(|t| t.user_id.to_string()).collect();
        let _ = writeln!(out, "typing:   {}", typing.join(", "));
    }

    if !snapshot.connected_users.is_empty() {
        let users: Vec<_> = snapshot
            .connected_users
            .iter()
            .map(|(user, status)| format!("{user} ({status:?})"))
            .collect();
        let _ = writeln!(out, "users:    {}", users.join(", "));
    }

    if let Some(error) = &snapshot.last_error {
        let _ = writeln!(out, "error:    {error}");
    }

    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{collections::BTreeSet, time::Duration};

    use chatlink_client::{ChannelId, ConnectionState, ErrorCode, ErrorInfo, UserId};

    use super::*;

    fn entry(text: &str) -> MessageLogEntry {
        MessageLogEntry {
            id: "m1".into(),
            channel_id: ChannelId::from("general"),
            sender_id: Some(UserId::from("7")),
            sender_name: None,
            sender_avatar: None,
            text: text.into(),
            url: None,
            file_name: None,
            created_at: 0,
            message_type: None,
        }
    }

    #[test]
    fn message_falls_back_to_sender_id() {
        insta::assert_snapshot!(message(&entry("hi")), @"[#general] <7> hi");

        let mut named = entry("see attached");
        named.sender_name = Some("ada".into());
        named.file_name = Some("plan.pdf".into());
        insta::assert_snapshot!(message(&named), @"[#general] <ada> see attached [plan.pdf]");
    }

    #[test]
    fn quiet_notifications_render_nothing() {
        let changed = Notification::StateChanged {
            from: ConnectionState::Connecting,
            to: ConnectionState::Connected,
        };
        assert_eq!(notification(&changed), None);

        let scheduled =
            Notification::ReconnectScheduled { attempt: 2, delay: Duration::from_millis(2000) };
        assert_eq!(
            notification(&scheduled).unwrap(),
            "* reconnecting in 2000ms (attempt 2)"
        );
    }

    #[test]
    fn status_summary() {
        let snapshot = SessionSnapshot {
            state: ConnectionState::Connected,
            user_id: Some(UserId::from("42")),
            joined: BTreeSet::from([ChannelId::from("general"), ChannelId::from("random")]),
            active: None,
            switching: true,
            messages: Vec::new(),
            typing: Vec::new(),
            connected_users: Default::default(),
            last_error: Some(ErrorInfo::new(ErrorCode::SendFailed, "socket closed")),
        };

        let rendered = status(&snapshot);
        assert!(rendered.starts_with("state:    connected as 42"));
        assert!(rendered.contains("joined:   #general #random"));
        assert!(rendered.contains("active:   - (switching)"));
        assert!(rendered.lines().last().unwrap().starts_with("error:"));
    }
}
