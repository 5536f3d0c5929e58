//! Scripted in-memory backend.
//!
//! `SimServer` plays the messaging backend for one client connection. It
//! tracks the channels the client joined, answers pings, confirms joins,
//! acknowledges leaves and echoes messages back, each of which can be turned
//! off to exercise the client's timeouts. Tests can also push arbitrary
//! frames, refuse connection attempts and drop the socket.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chatlink_app::TransportEvent;
use chatlink_proto::{ChannelId, Envelope, MessageType, UserId};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::{SimDriver, sim_driver::SimDriverError, sim_env::SIM_EPOCH_MS};

/// How the scripted backend responds.
#[derive(Debug, Clone, Copy)]
pub struct ServerBehavior {
    /// Answer `channel.join` with a confirming `channel.join`
    pub confirm_joins: bool,
    /// Answer `channel.leave` with an acknowledging `channel.leave`
    pub ack_leaves: bool,
    /// Broadcast `channel.message` back to the sender
    pub echo_messages: bool,
}

impl Default for ServerBehavior {
    fn default() -> Self {
        Self { confirm_joins: true, ack_leaves: true, echo_messages: true }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    behavior: ServerBehavior,
    /// Event queue of the attached driver
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    /// User of the open connection
    connected: Option<UserId>,
    /// Channels the connected user is a member of
    channels: BTreeSet<ChannelId>,
    /// Connection attempts still to refuse
    refuse: u32,
    /// Successful opens so far
    opens: u32,
    /// Every envelope received from the client
    received: Vec<Envelope>,
    next_frame: u64,
}

impl ServerState {
    fn emit(&self, event: TransportEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn reply(&mut self, kind: MessageType, data: Value) {
        self.next_frame += 1;
        let envelope = Envelope::new(
            format!("srv-{}", self.next_frame),
            kind,
            data,
            SIM_EPOCH_MS + self.next_frame,
            "0",
        );

        match envelope.encode() {
            Ok(text) => self.emit(TransportEvent::Text(text)),
            Err(error) => warn!(%error, "server frame not encodable"),
        }
    }
}

/// Handle to the scripted backend. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct SimServer {
    state: Arc<Mutex<ServerState>>,
}

impl SimServer {
    /// Backend with the given behavior.
    pub fn new(behavior: ServerBehavior) -> Self {
        let state = ServerState { behavior, ..ServerState::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Create the driver a client runtime uses to reach this server.
    ///
    /// Attaching a new driver detaches the previous one.
    pub fn driver(&self) -> SimDriver {
        let (events, inbox) = mpsc::unbounded_channel();
        self.lock().events = Some(events);
        SimDriver::new(self.clone(), inbox)
    }

    /// Change the behavior mid-simulation.
    pub fn set_behavior(&self, behavior: ServerBehavior) {
        self.lock().behavior = behavior;
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: u32) {
        self.lock().refuse = count;
    }

    /// Whether a client connection is open.
    pub fn is_connected(&self) -> bool {
        self.lock().connected.is_some()
    }

    /// Channels the connected user is a member of, `None` without a
    /// connection.
    pub fn channels(&self) -> Option<BTreeSet<ChannelId>> {
        let state = self.lock();
        state.connected.as_ref().map(|_| state.channels.clone())
    }

    /// Number of successful opens.
    pub fn opens(&self) -> u32 {
        self.lock().opens
    }

    /// Every envelope received from the client, oldest first.
    pub fn received(&self) -> Vec<Envelope> {
        self.lock().received.clone()
    }

    /// Types of the received envelopes, skipping heartbeats.
    pub fn received_kinds(&self) -> Vec<MessageType> {
        self.lock()
            .received
            .iter()
            .map(|e| e.kind)
            .filter(|kind| !matches!(kind, MessageType::ConnectionPing | MessageType::ConnectionPong))
            .collect()
    }

    /// Push a frame to the connected client.
    pub fn push(&self, kind: MessageType, data: Value) {
        let mut state = self.lock();
        if state.connected.is_some() {
            state.reply(kind, data);
        }
    }

    /// Push raw text to the connected client.
    pub fn push_raw(&self, text: impl Into<String>) {
        let state = self.lock();
        if state.connected.is_some() {
            state.emit(TransportEvent::Text(text.into()));
        }
    }

    /// Drop the connection from the server side.
    pub fn drop_connection(&self, reason: &str) {
        let mut state = self.lock();
        if state.connected.take().is_some() {
            state.channels.clear();
            state.emit(TransportEvent::Closed { reason: reason.to_string() });
        }
    }

    pub(crate) fn open(&self, url: &Url) {
        let mut state = self.lock();
        if state.refuse > 0 {
            state.refuse -= 1;
            state.emit(TransportEvent::Error { reason: "connection refused".to_string() });
            return;
        }

        let user_id = url
            .query_pairs()
            .find(|(key, _)| key == "user_id")
            .map(|(_, value)| UserId::from(value.as_ref()))
            .unwrap_or_else(|| UserId::from(""));

        debug!(%user_id, "sim server accepted connection");
        state.connected = Some(user_id);
        state.channels.clear();
        state.opens += 1;
        state.emit(TransportEvent::Opened);
    }

    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.connected = None;
        state.channels.clear();
    }

    pub(crate) fn receive(&self, text: &str) -> Result<(), SimDriverError> {
        let mut state = self.lock();
        let Some(user_id) = state.connected.clone() else {
            return Err(SimDriverError("not connected".to_string()));
        };

        let envelope = Envelope::decode(text).map_err(|e| SimDriverError(e.to_string()))?;
        state.received.push(envelope.clone());

        let channel_id =
            envelope.data.get("channel_id").cloned().unwrap_or(Value::Null);
        let channel = channel_id.as_str().map(ChannelId::from);

        match envelope.kind {
            MessageType::ConnectionPing => state.reply(MessageType::ConnectionPong, json!({})),
            MessageType::ChannelJoin => {
                if let Some(channel) = channel {
                    state.channels.insert(channel);
                }
                if state.behavior.confirm_joins {
                    state.reply(MessageType::ChannelJoin, json!({ "channel_id": channel_id }));
                }
            },
            MessageType::ChannelLeave => {
                if let Some(channel) = channel {
                    state.channels.remove(&channel);
                }
                if state.behavior.ack_leaves {
                    state.reply(MessageType::ChannelLeave, json!({ "channel_id": channel_id }));
                }
            },
            MessageType::ChannelMessage if state.behavior.echo_messages => {
                let mut data = envelope.data;
                if let Some(object) = data.as_object_mut() {
                    object.insert("sender_id".to_string(), json!(user_id.as_str()));
                }
                state.reply(MessageType::ChannelMessage, data);
            },
            _ => {},
        }

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
