//! Fuzz target for the client state machine
//!
//! Drives a client through arbitrary interleavings of user intents, transport
//! events, server frames and elapsed time.
//!
//! # Invariants
//!
//! - NEVER panic on any event sequence
//! - The active channel is always a joined channel
//! - Membership is empty unless connected
//! - Every reported state transition is allowed

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use chatlink_client::{
    ChannelId, Client, ClientAction, ClientConfig, ClientEvent, ConnectionState, Notification,
    UserId, env::test_utils::MockEnv,
};
use libfuzzer_sys::fuzz_target;
use serde_json::json;

const CHANNELS: [&str; 3] = ["1", "2", "3"];

const SERVER_TYPES: [&str; 8] = [
    "channel.join",
    "channel.leave",
    "channel.message",
    "channel.typing",
    "channel.member.leave",
    "user.status",
    "connection.ping",
    "error",
];

#[derive(Debug, Arbitrary)]
enum Step {
    Connect,
    Disconnect,
    Join(u8),
    Leave(u8),
    LeaveAll,
    Switch(Option<u8>),
    Send(u8),
    Opened,
    TransportError,
    Closed,
    ServerFrame { kind: u8, channel: u8, sender: u8 },
    RawText(String),
    Advance(u16),
}

fn channel(index: u8) -> ChannelId {
    ChannelId::from(CHANNELS[usize::from(index) % CHANNELS.len()])
}

fn frame(kind: u8, channel: &ChannelId, sender: u8) -> String {
    let kind = SERVER_TYPES[usize::from(kind) % SERVER_TYPES.len()];
    json!({
        "id": format!("srv-{kind}-{sender}"),
        "type": kind,
        "data": {
            "channel_id": channel.as_str(),
            "user_id": sender.to_string(),
            "sender_id": sender.to_string(),
            "text": "x",
            "status": "online",
            "message": "m",
        },
        "timestamp": 1_700_000_000_000u64,
        "user_id": sender.to_string(),
    })
    .to_string()
}

fuzz_target!(|steps: Vec<Step>| {
    let mut client = Client::new(MockEnv::new(), ClientConfig::default());
    let mut now = Instant::now();
    let mut state = ConnectionState::Disconnected;

    for step in steps {
        let event = match step {
            Step::Connect => ClientEvent::Connect { user_id: UserId::from("1") },
            Step::Disconnect => ClientEvent::Disconnect,
            Step::Join(c) => ClientEvent::Join { channel_id: channel(c) },
            Step::Leave(c) => ClientEvent::Leave { channel_id: channel(c) },
            Step::LeaveAll => ClientEvent::LeaveAll,
            Step::Switch(c) => ClientEvent::SwitchChannel { channel_id: c.map(channel) },
            Step::Send(c) => ClientEvent::SendMessage {
                channel_id: channel(c),
                text: "hi".into(),
                url: None,
                file_name: None,
            },
            Step::Opened => ClientEvent::TransportOpened,
            Step::TransportError => ClientEvent::TransportError { reason: "fuzz".into() },
            Step::Closed => ClientEvent::TransportClosed { reason: "fuzz".into() },
            Step::ServerFrame { kind, channel: c, sender } => {
                ClientEvent::TransportText(frame(kind, &channel(c), sender))
            },
            Step::RawText(text) => ClientEvent::TransportText(text),
            Step::Advance(ms) => {
                now += Duration::from_millis(u64::from(ms) * 10);
                ClientEvent::Tick { now }
            },
        };

        // Guard rejections are expected; panics are not.
        let Ok(actions) = client.handle(event) else {
            continue;
        };

        for action in &actions {
            if let ClientAction::Notify(Notification::StateChanged { from, to }) = action {
                assert_eq!(*from, state, "transition chain broken");
                assert!(from.can_transition_to(*to), "invalid transition {from} -> {to}");
                state = *to;
            }
        }

        if let Some(active) = client.active_channel() {
            assert!(client.joined_channels().contains(active), "active channel not joined");
        }
        if client.state() != ConnectionState::Connected {
            assert!(client.joined_channels().is_empty(), "membership without connection");
        }
    }
});
