//! Session handle.
//!
//! A [`Session`] is the single owned client instance of an application. It
//! runs on its own task; UI code talks to it through a cloneable
//! [`SessionHandle`] that sends commands, reads state snapshots and subscribes
//! to notifications.

use std::collections::{BTreeMap, BTreeSet};

use chatlink_client::{
    ChannelId, Client, ClientEvent, ConnectionState, Environment, ErrorInfo, Notification, UserId,
    router::{MessageLogEntry, TypingEntry},
};
use chatlink_proto::payloads::user::PresenceStatus;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{Driver, Runtime, RuntimeConfig, RuntimeError};

/// Reply channel for a command.
pub(crate) type Reply = oneshot::Sender<Result<(), RuntimeError>>;

/// User intent forwarded to the client.
#[derive(Debug, Clone)]
pub(crate) enum Intent {
    Connect { user_id: UserId },
    Disconnect,
    Join { channel_id: ChannelId },
    Leave { channel_id: ChannelId },
    LeaveAll,
    SwitchChannel { channel_id: Option<ChannelId> },
    Navigate { route: String },
    SendMessage { channel_id: ChannelId, text: String, url: Option<String>, file_name: Option<String> },
    SendTyping { channel_id: ChannelId, is_typing: bool },
}

impl Intent {
    pub(crate) fn into_event<I>(self) -> ClientEvent<I> {
        match self {
            Self::Connect { user_id } => ClientEvent::Connect { user_id },
            Self::Disconnect => ClientEvent::Disconnect,
            Self::Join { channel_id } => ClientEvent::Join { channel_id },
            Self::Leave { channel_id } => ClientEvent::Leave { channel_id },
            Self::LeaveAll => ClientEvent::LeaveAll,
            Self::SwitchChannel { channel_id } => ClientEvent::SwitchChannel { channel_id },
            Self::Navigate { route } => ClientEvent::Navigate { route },
            Self::SendMessage { channel_id, text, url, file_name } => {
                ClientEvent::SendMessage { channel_id, text, url, file_name }
            },
            Self::SendTyping { channel_id, is_typing } => {
                ClientEvent::SendTyping { channel_id, is_typing }
            },
        }
    }
}

/// Command sent from a [`SessionHandle`] to the runtime task.
#[derive(Debug)]
pub(crate) enum Command {
    Client { intent: Intent, reply: Reply },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Point-in-time view of the client, published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Connection state
    pub state: ConnectionState,
    /// Local user
    pub user_id: Option<UserId>,
    /// Joined channels
    pub joined: BTreeSet<ChannelId>,
    /// Active channel
    pub active: Option<ChannelId>,
    /// Whether a channel switch awaits its leave acknowledgment
    pub switching: bool,
    /// Message log of the active channel
    pub messages: Vec<MessageLogEntry>,
    /// Users typing in the active channel
    pub typing: Vec<TypingEntry>,
    /// Presence table
    pub connected_users: BTreeMap<UserId, PresenceStatus>,
    /// Most recent error
    pub last_error: Option<ErrorInfo>,
}

impl SessionSnapshot {
    /// Capture the current state of `client`.
    pub fn capture<E: Environment>(client: &Client<E>) -> Self {
        let active = client.active_channel().cloned();
        let (messages, typing) = match &active {
            Some(channel_id) => {
                (client.messages(channel_id).to_vec(), client.typing(channel_id).to_vec())
            },
            None => (Vec::new(), Vec::new()),
        };

        Self {
            state: client.state(),
            user_id: client.user_id().cloned(),
            joined: client.joined_channels().clone(),
            active,
            switching: client.is_switching(),
            messages,
            typing,
            connected_users: client
                .connected_users()
                .iter()
                .map(|(user, status)| (user.clone(), *status))
                .collect(),
            last_error: client.last_error().cloned(),
        }
    }
}

/// Cloneable handle to a running session.
///
/// Every call is serialized through the session task. Guard violations (for
/// example sending while disconnected) return an error immediately; transport
/// failures arrive as [`Notification`]s.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    notifications: broadcast::Sender<Notification>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<SessionSnapshot>,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self { commands, snapshots, notifications }
    }

    /// Connect as `user_id`.
    ///
    /// Resolves once the socket is open.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::ConnectFailed` if the attempt fails or times out
    /// - `RuntimeError::ConnectCancelled` if a disconnect supersedes it
    /// - `RuntimeError::Client` if the server URL is invalid
    pub async fn connect(&self, user_id: impl Into<UserId>) -> Result<(), RuntimeError> {
        self.request(Intent::Connect { user_id: user_id.into() }).await
    }

    /// Leave every channel, close the socket and clear all state.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::SessionClosed` if the session has stopped
    pub async fn disconnect(&self) -> Result<(), RuntimeError> {
        self.request(Intent::Disconnect).await
    }

    /// Join a channel and make it active. No-op while disconnected.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::SessionClosed` if the session has stopped
    pub async fn join(&self, channel_id: impl Into<ChannelId>) -> Result<(), RuntimeError> {
        self.request(Intent::Join { channel_id: channel_id.into() }).await
    }

    /// Leave a channel.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::SessionClosed` if the session has stopped
    pub async fn leave(&self, channel_id: impl Into<ChannelId>) -> Result<(), RuntimeError> {
        self.request(Intent::Leave { channel_id: channel_id.into() }).await
    }

    /// Leave every joined channel.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::SessionClosed` if the session has stopped
    pub async fn leave_all(&self) -> Result<(), RuntimeError> {
        self.request(Intent::LeaveAll).await
    }

    /// Switch the active channel (`None` clears it).
    ///
    /// # Errors
    ///
    /// - `RuntimeError::SessionClosed` if the session has stopped
    pub async fn switch_channel(&self, channel_id: Option<ChannelId>) -> Result<(), RuntimeError> {
        self.request(Intent::SwitchChannel { channel_id }).await
    }

    /// Report a route change.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::SessionClosed` if the session has stopped
    pub async fn navigate(&self, route: impl Into<String>) -> Result<(), RuntimeError> {
        self.request(Intent::Navigate { route: route.into() }).await
    }

    /// Send a text message.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if not connected
    pub async fn send_message(
        &self,
        channel_id: impl Into<ChannelId>,
        text: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.request(Intent::SendMessage {
            channel_id: channel_id.into(),
            text: text.into(),
            url: None,
            file_name: None,
        })
        .await
    }

    /// Send a message with an attachment.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if not connected
    pub async fn send_attachment(
        &self,
        channel_id: impl Into<ChannelId>,
        text: impl Into<String>,
        url: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        self.request(Intent::SendMessage {
            channel_id: channel_id.into(),
            text: text.into(),
            url: Some(url.into()),
            file_name: Some(file_name.into()),
        })
        .await
    }

    /// Send a typing indicator.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if not connected
    pub async fn send_typing(
        &self,
        channel_id: impl Into<ChannelId>,
        is_typing: bool,
    ) -> Result<(), RuntimeError> {
        self.request(Intent::SendTyping { channel_id: channel_id.into(), is_typing }).await
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Watch snapshots as they change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Subscribe to notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Disconnect and stop the session task.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::SessionClosed` if the session already stopped
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        done.await.map_err(|_| RuntimeError::SessionClosed)
    }

    async fn request(&self, intent: Intent) -> Result<(), RuntimeError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Client { intent, reply })
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        done.await.map_err(|_| RuntimeError::SessionClosed)?
    }
}

/// Entry point for starting a session.
pub struct Session;

impl Session {
    /// Spawn the runtime for `driver` on the current tokio runtime.
    ///
    /// Returns the handle and the task's join handle. The task ends after
    /// [`SessionHandle::shutdown`] or once every handle is dropped.
    pub fn start<D, E>(config: RuntimeConfig, driver: D, env: E) -> (SessionHandle, JoinHandle<()>)
    where
        D: Driver<Instant = E::Instant> + 'static,
        E: Environment,
    {
        let (runtime, handle) = Runtime::new(config, driver, env);
        let task = tokio::spawn(runtime.run());
        (handle, task)
    }
}
