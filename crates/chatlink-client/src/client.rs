//! Client state machine.
//!
//! The `Client` composes the connection, membership coordinator, navigator
//! and message router into one action-based state machine. Every user intent
//! and transport event enters through [`Client::handle`]; everything the
//! caller must do comes back as [`ClientAction`]s.

use std::collections::{BTreeSet, HashMap};

use chatlink_core::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionError, ConnectionState, Endpoint,
    Environment, ErrorCode, ErrorInfo,
};
use chatlink_proto::{
    ChannelId, Envelope, MessageType, Payload, UserId,
    payloads::{
        channel::{ChannelRef, ChatMessage, Typing},
        user::PresenceStatus,
    },
};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    error::ClientError,
    event::{ClientAction, ClientEvent, Notification},
    membership::{Membership, MembershipCommand, MembershipConfig},
    navigation::Navigator,
    router::{MessageLogEntry, MessageRouter, RouteContext, RouterConfig, RouterOutput, TypingEntry},
};

/// Server used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the messaging backend
    pub server_url: String,
    /// Connection lifecycle settings
    pub connection: ConnectionConfig,
    /// Channel switch settings
    pub membership: MembershipConfig,
    /// Inbound routing settings
    pub router: RouterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            connection: ConnectionConfig::default(),
            membership: MembershipConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

/// Channel client.
///
/// Owns the single connection and all per-session state. State is cleared on
/// [`ClientEvent::Disconnect`].
pub struct Client<E: Environment> {
    /// Environment for ids, timestamps and time
    env: E,
    /// Configuration
    config: ClientConfig,
    /// Local user, set on connect
    user_id: Option<UserId>,
    /// Connection lifecycle
    connection: Connection<E::Instant>,
    /// Joined/active channels and switch handshake
    membership: Membership<E::Instant>,
    /// Route deduplication
    navigator: Navigator,
    /// Inbound per-channel state
    router: MessageRouter,
    /// Most recent error surfaced to the user
    last_error: Option<ErrorInfo>,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client.
    pub fn new(env: E, config: ClientConfig) -> Self {
        Self {
            env,
            connection: Connection::new(config.connection.clone()),
            membership: Membership::new(config.membership.clone()),
            navigator: Navigator::new(),
            router: MessageRouter::new(config.router.clone()),
            config,
            user_id: None,
            last_error: None,
        }
    }

    /// Connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Local user. `None` before the first connect.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Joined channels.
    pub fn joined_channels(&self) -> &BTreeSet<ChannelId> {
        self.membership.joined()
    }

    /// Active channel.
    pub fn active_channel(&self) -> Option<&ChannelId> {
        self.membership.active()
    }

    /// Whether a channel switch is waiting for its leave acknowledgment.
    pub fn is_switching(&self) -> bool {
        self.membership.is_switching()
    }

    /// Message log of a channel.
    pub fn messages(&self, channel_id: &ChannelId) -> &[MessageLogEntry] {
        self.router.messages(channel_id)
    }

    /// Users typing in a channel.
    pub fn typing(&self, channel_id: &ChannelId) -> &[TypingEntry] {
        self.router.typing(channel_id)
    }

    /// Presence table.
    pub fn connected_users(&self) -> &HashMap<UserId, PresenceStatus> {
        self.router.connected_users()
    }

    /// Most recent error.
    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// Connection state machine.
    pub fn connection(&self) -> &Connection<E::Instant> {
        &self.connection
    }

    /// Membership state machine.
    pub fn membership(&self) -> &Membership<E::Instant> {
        &self.membership
    }

    /// Message router.
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connection(NotConnected)` for sends while not connected
    /// - `ClientError::Connection(InvalidEndpoint)` if the server URL is bad
    /// - `ClientError::JoinChannelFailed` / `LeaveChannelFailed` if a
    ///   membership envelope could not be built
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let mut out = Vec::new();

        match event {
            ClientEvent::Connect { user_id } => self.handle_connect(user_id, &mut out)?,
            ClientEvent::Disconnect => self.handle_disconnect(&mut out)?,
            ClientEvent::Join { channel_id } => {
                let commands = self.membership.join(channel_id);
                self.issue(commands, &mut out)?;
            },
            ClientEvent::Leave { channel_id } => {
                let commands = self.membership.leave(&channel_id);
                self.issue(commands, &mut out)?;
            },
            ClientEvent::LeaveAll => {
                let commands = self.membership.leave_all();
                self.issue(commands, &mut out)?;
            },
            ClientEvent::SwitchChannel { channel_id } => {
                let commands = self.membership.switch_channel(channel_id, self.env.now());
                self.issue(commands, &mut out)?;
            },
            ClientEvent::Navigate { route } => {
                let intended = self.membership.intended();
                if let Some(target) = self.navigator.navigate(&route, intended) {
                    debug!(route, ?target, "navigation");
                    let commands = self.membership.switch_channel(target, self.env.now());
                    self.issue(commands, &mut out)?;
                }
            },
            ClientEvent::SendMessage { channel_id, text, url, file_name } => {
                self.handle_send_message(channel_id, text, url, file_name, &mut out)?;
            },
            ClientEvent::SendTyping { channel_id, is_typing } => {
                self.handle_send_typing(channel_id, is_typing, &mut out)?;
            },
            ClientEvent::TransportOpened => {
                let actions = self.connection.handle_open(self.env.now());
                self.apply(actions, &mut out)?;
            },
            ClientEvent::TransportText(text) => {
                let actions = self.connection.handle_text(&self.env, &text);
                self.apply(actions, &mut out)?;
            },
            ClientEvent::TransportError { reason } => {
                let actions = self.connection.handle_transport_error(&reason, self.env.now());
                self.apply(actions, &mut out)?;
            },
            ClientEvent::TransportClosed { reason } => {
                let actions = self.connection.handle_close(&reason, self.env.now());
                self.apply(actions, &mut out)?;
            },
            ClientEvent::SendFailed { envelope, reason } => {
                self.handle_send_failed(&envelope, &reason, &mut out);
            },
            ClientEvent::Tick { now } => {
                let actions = self.connection.tick(&self.env, now);
                self.apply(actions, &mut out)?;
                let commands = self.membership.tick(now);
                self.issue(commands, &mut out)?;
            },
        }

        Ok(out)
    }

    fn handle_connect(
        &mut self,
        user_id: UserId,
        out: &mut Vec<ClientAction>,
    ) -> Result<(), ClientError> {
        let state = self.connection.state();
        if matches!(state, ConnectionState::Connecting | ConnectionState::Connected) {
            debug!(%state, %user_id, current = ?self.user_id, "connect ignored");
            return Ok(());
        }

        let endpoint = Endpoint::new(&self.config.server_url, user_id.clone())?;
        info!(url = %endpoint.url(), "connecting");

        self.user_id = Some(user_id);
        let actions = self.connection.connect(endpoint, self.env.now());
        self.apply(actions, out)
    }

    /// Leaves every channel while the socket is still open, then tears down
    /// all session state.
    fn handle_disconnect(&mut self, out: &mut Vec<ClientAction>) -> Result<(), ClientError> {
        if self.connection.is_connected() {
            let commands = self.membership.leave_all();
            self.issue(commands, out)?;
        }

        let actions = self.connection.disconnect();
        self.apply(actions, out)?;

        self.membership.reset();
        self.router.clear();
        self.navigator.reset();
        self.user_id = None;
        self.last_error = None;
        Ok(())
    }

    fn handle_send_message(
        &mut self,
        channel_id: ChannelId,
        text: String,
        url: Option<String>,
        file_name: Option<String>,
        out: &mut Vec<ClientAction>,
    ) -> Result<(), ClientError> {
        self.ensure_connected()?;

        let mut envelope =
            self.connection.envelope(&self.env, MessageType::ChannelMessage, json!({}));

        let mut message = ChatMessage::outbound(envelope.id.clone(), channel_id, text);
        message.url = url;
        message.file_name = file_name;
        envelope.data = Payload::Message(message.clone()).to_data().map_err(ConnectionError::from)?;

        let action = self.connection.transmit(envelope.clone())?;
        self.push_connection_action(action, out);

        // Optimistic local echo; the server copy is deduplicated by id.
        message.sender_id = self.user_id.clone();
        let entry = MessageLogEntry::from_message(message, &envelope);
        let ctx = RouteContext {
            active: self.membership.active(),
            joined: self.membership.joined(),
            self_id: self.user_id.as_ref(),
        };
        if let Some(entry) = self.router.append_local(entry, ctx) {
            out.push(ClientAction::Notify(Notification::MessageAppended(entry)));
        }

        Ok(())
    }

    fn handle_send_typing(
        &mut self,
        channel_id: ChannelId,
        is_typing: bool,
        out: &mut Vec<ClientAction>,
    ) -> Result<(), ClientError> {
        self.ensure_connected()?;

        let user_id = self.user_id.clone().unwrap_or_else(|| UserId::from(""));
        let typing = Typing { channel_id, user_id, is_typing: Some(is_typing) };
        let payload =
            if is_typing { Payload::Typing(typing) } else { Payload::StopTyping(typing) };

        let data = payload.to_data().map_err(ConnectionError::from)?;
        let action = self.connection.send(&self.env, payload.message_type(), data)?;
        self.push_connection_action(action, out);
        Ok(())
    }

    fn handle_send_failed(&mut self, envelope: &Envelope, reason: &str, out: &mut Vec<ClientAction>) {
        let error = self.connection.record_send_failure(reason);
        let code = match envelope.kind {
            MessageType::ChannelJoin => ErrorCode::JoinChannelFailed,
            MessageType::ChannelLeave => ErrorCode::LeaveChannelFailed,
            _ => ErrorCode::SendFailed,
        };

        let info = ErrorInfo::new(code, error.to_string())
            .with_details(json!({ "envelope_id": envelope.id, "type": envelope.kind }));
        self.report(info, out);
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected { state: self.connection.state() }.into())
        }
    }

    /// Turn membership commands into envelopes.
    fn issue(
        &mut self,
        commands: Vec<MembershipCommand>,
        out: &mut Vec<ClientAction>,
    ) -> Result<(), ClientError> {
        for command in commands {
            let (payload, channel_id) = match command {
                MembershipCommand::Join(channel_id) => {
                    (Payload::Join(ChannelRef { channel_id: channel_id.clone() }), channel_id)
                },
                MembershipCommand::Leave(channel_id) => {
                    if self.router.clear_typing(&channel_id) {
                        out.push(ClientAction::Notify(Notification::TypingChanged {
                            channel_id: channel_id.clone(),
                        }));
                    }
                    (Payload::Leave(ChannelRef { channel_id: channel_id.clone() }), channel_id)
                },
            };

            let kind = payload.message_type();
            let action = payload
                .to_data()
                .map_err(ConnectionError::from)
                .and_then(|data| self.connection.send(&self.env, kind, data))
                .map_err(|e| membership_error(kind, channel_id, &e))?;

            self.push_connection_action(action, out);
        }

        Ok(())
    }

    /// Execute connection actions, feeding lifecycle changes into membership
    /// and routing delivered envelopes.
    fn apply(
        &mut self,
        actions: Vec<ConnectionAction>,
        out: &mut Vec<ClientAction>,
    ) -> Result<(), ClientError> {
        for action in actions {
            match action {
                ConnectionAction::Established => {
                    out.push(ClientAction::Notify(Notification::Connected));
                    let commands = self.membership.on_connected();
                    self.issue(commands, out)?;
                },
                ConnectionAction::Disconnected { reason } => {
                    self.membership.on_connection_lost();
                    self.router.clear_all_typing();
                    out.push(ClientAction::Notify(Notification::Disconnected { reason }));
                },
                ConnectionAction::Deliver(envelope) => self.route(&envelope, out)?,
                other => self.push_connection_action(other, out),
            }
        }

        Ok(())
    }

    fn push_connection_action(&mut self, action: ConnectionAction, out: &mut Vec<ClientAction>) {
        match action {
            ConnectionAction::Open { url } => out.push(ClientAction::Open { url }),
            ConnectionAction::Send(envelope) => out.push(ClientAction::Send(envelope)),
            ConnectionAction::Close { reason } => out.push(ClientAction::Close { reason }),
            ConnectionAction::StateChanged { from, to } => {
                out.push(ClientAction::Notify(Notification::StateChanged { from, to }));
            },
            ConnectionAction::ConnectFailed(error) => {
                let info = ErrorInfo::from(&error);
                self.last_error = Some(info.clone());
                out.push(ClientAction::Notify(Notification::ConnectFailed(info)));
            },
            ConnectionAction::ReconnectScheduled { attempt, delay } => {
                out.push(ClientAction::Notify(Notification::ReconnectScheduled { attempt, delay }));
            },
            ConnectionAction::Failed(error) => self.report(ErrorInfo::from(&error), out),
            ConnectionAction::Established
            | ConnectionAction::Disconnected { .. }
            | ConnectionAction::Deliver(_) => {
                debug!(?action, "lifecycle action outside apply");
            },
        }
    }

    fn route(&mut self, envelope: &Envelope, out: &mut Vec<ClientAction>) -> Result<(), ClientError> {
        let ctx = RouteContext {
            active: self.membership.active(),
            joined: self.membership.joined(),
            self_id: self.user_id.as_ref(),
        };
        let outputs = self.router.dispatch(envelope, ctx);

        for output in outputs {
            let notification = match output {
                RouterOutput::LeaveAcknowledged { channel_id } => {
                    let commands = self.membership.on_leave_ack(&channel_id);
                    self.issue(commands, out)?;
                    Notification::ChannelLeft { channel_id }
                },
                RouterOutput::ServerError(info) => {
                    if let ErrorCode::Server(code) = &info.code {
                        self.connection.record_server_error(code.clone(), &info.message);
                    }
                    self.report(info, out);
                    continue;
                },
                RouterOutput::MessageAppended(entry) => Notification::MessageAppended(entry),
                RouterOutput::TypingChanged { channel_id } => {
                    Notification::TypingChanged { channel_id }
                },
                RouterOutput::PresenceChanged { user_id, status } => {
                    Notification::PresenceChanged { user_id, status }
                },
                RouterOutput::MemberJoined { channel_id, user_id } => {
                    Notification::MemberJoined { channel_id, user_id }
                },
                RouterOutput::MemberLeft { channel_id, user_id } => {
                    Notification::MemberLeft { channel_id, user_id }
                },
                RouterOutput::ChannelJoined { channel_id } => {
                    Notification::ChannelJoined { channel_id }
                },
                RouterOutput::Notification(notification) => {
                    Notification::UserNotification(notification)
                },
            };

            out.push(ClientAction::Notify(notification));
        }

        Ok(())
    }

    fn report(&mut self, info: ErrorInfo, out: &mut Vec<ClientAction>) {
        self.last_error = Some(info.clone());
        out.push(ClientAction::Notify(Notification::Error(info)));
    }
}

fn membership_error(kind: MessageType, channel_id: ChannelId, err: &ConnectionError) -> ClientError {
    let reason = err.to_string();
    match kind {
        MessageType::ChannelLeave => ClientError::LeaveChannelFailed { channel_id, reason },
        _ => ClientError::JoinChannelFailed { channel_id, reason },
    }
}
