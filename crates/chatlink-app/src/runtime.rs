//! Generic runtime for session orchestration.
//!
//! The Runtime drives the session event loop, coordinating between:
//! - [`SessionHandle`] commands from the UI
//! - [`Client`]: the sans-IO state machine
//! - [`Driver`]: platform-specific transport I/O
//! - a tick interval feeding the client's timers

use std::{collections::VecDeque, time::Duration};

use chatlink_client::{
    Client, ClientAction, ClientConfig, ClientEvent, ConnectionState, Environment, Notification,
};
use tokio::{
    sync::{broadcast, mpsc, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use crate::{
    Driver, RuntimeError, SessionHandle, SessionSnapshot, TransportEvent,
    session::{Command, Intent, Reply},
};

/// Default interval between timer ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(25);

/// Default capacity of the command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Default capacity of the notification broadcast.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Client configuration
    pub client: ClientConfig,
    /// Interval between timer ticks
    pub tick_interval: Duration,
    /// Capacity of the command channel
    pub command_capacity: usize,
    /// Capacity of the notification broadcast; slow subscribers lag
    pub notification_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

/// Generic runtime that orchestrates Client and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific transport driver
/// - `E`: Environment for ids, timestamps and time
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    client: Client<E>,
    tick_interval: Duration,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    notifications: broadcast::Sender<Notification>,
    /// Pending `connect` calls, resolved when the socket opens or fails
    connect_waiters: Vec<Reply>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a runtime and the handle that controls it.
    ///
    /// Nothing happens until [`Runtime::run`] is awaited.
    pub fn new(config: RuntimeConfig, driver: D, env: E) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::channel(config.command_capacity);
        let (notifications, _) = broadcast::channel(config.notification_capacity);

        let client = Client::new(env, config.client);
        let (snapshots, snapshots_rx) = watch::channel(SessionSnapshot::capture(&client));

        let handle = SessionHandle::new(commands_tx, snapshots_rx, notifications.clone());
        let runtime = Self {
            driver,
            client,
            tick_interval: config.tick_interval,
            commands,
            snapshots,
            notifications,
            connect_waiters: Vec::new(),
        };

        (runtime, handle)
    }

    /// Get a reference to the Client
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Run the event loop until shutdown or until every handle is dropped.
    ///
    /// Each cycle handles exactly one of: a UI command, a transport event, or
    /// a timer tick; then publishes a snapshot if anything changed.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Client { intent, reply }) => self.handle_intent(intent, reply).await,
                    Some(Command::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    },
                    None => {
                        self.stop().await;
                        break;
                    },
                },
                event = self.driver.recv() => self.handle_transport(event).await,
                _ = ticker.tick() => {
                    let now = self.driver.now();
                    self.feed(ClientEvent::Tick { now }).await;
                },
            }

            self.publish_snapshot();
        }

        self.publish_snapshot();
        debug!("session stopped");
    }

    async fn handle_intent(&mut self, intent: Intent, reply: Reply) {
        match intent {
            Intent::Connect { user_id } => {
                let actions = match self.client.handle(ClientEvent::Connect { user_id }) {
                    Ok(actions) => actions,
                    Err(err) => {
                        let _ = reply.send(Err(err.into()));
                        return;
                    },
                };

                if self.client.state() == ConnectionState::Connected {
                    let _ = reply.send(Ok(()));
                } else {
                    self.connect_waiters.push(reply);
                }
                self.execute(actions).await;
            },
            Intent::Disconnect => {
                let result = self.dispatch(ClientEvent::Disconnect).await;
                self.resolve_connect(&Err(RuntimeError::ConnectCancelled));
                let _ = reply.send(result);
            },
            other => {
                let result = self.dispatch(other.into_event()).await;
                let _ = reply.send(result);
            },
        }
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        let event = match event {
            TransportEvent::Opened => ClientEvent::TransportOpened,
            TransportEvent::Text(text) => ClientEvent::TransportText(text),
            TransportEvent::Error { reason } => ClientEvent::TransportError { reason },
            TransportEvent::Closed { reason } => ClientEvent::TransportClosed { reason },
        };

        self.feed(event).await;
    }

    /// Disconnect if needed and cancel pending connects.
    async fn stop(&mut self) {
        if self.client.state() != ConnectionState::Disconnected {
            self.feed(ClientEvent::Disconnect).await;
        }
        self.resolve_connect(&Err(RuntimeError::ConnectCancelled));
    }

    async fn dispatch(&mut self, event: ClientEvent<E::Instant>) -> Result<(), RuntimeError> {
        let actions = self.client.handle(event)?;
        self.execute(actions).await;
        Ok(())
    }

    /// Dispatch an event whose errors have no caller to return to.
    async fn feed(&mut self, event: ClientEvent<E::Instant>) {
        if let Err(error) = self.dispatch(event).await {
            warn!(%error, "client rejected event");
        }
    }

    /// Execute client actions. Driver failures are fed back into the client,
    /// and the actions that produces are executed in turn.
    async fn execute(&mut self, actions: Vec<ClientAction>) {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            let feedback = match action {
                ClientAction::Open { url } => match self.driver.open(&url).await {
                    Ok(()) => None,
                    Err(error) => Some(ClientEvent::TransportError { reason: error.to_string() }),
                },
                ClientAction::Send(envelope) => {
                    let sent = match envelope.encode() {
                        Ok(text) => self.driver.send_text(text).await.map_err(|e| e.to_string()),
                        Err(error) => Err(error.to_string()),
                    };
                    sent.err().map(|reason| ClientEvent::SendFailed { envelope, reason })
                },
                ClientAction::Close { reason } => {
                    self.driver.close(&reason).await;
                    None
                },
                ClientAction::Notify(notification) => {
                    self.publish(notification);
                    None
                },
            };

            if let Some(event) = feedback {
                match self.client.handle(event) {
                    Ok(more) => queue.extend(more),
                    Err(error) => warn!(%error, "client rejected transport feedback"),
                }
            }
        }
    }

    fn publish(&mut self, notification: Notification) {
        match &notification {
            Notification::Connected => self.resolve_connect(&Ok(())),
            Notification::ConnectFailed(info) => {
                self.resolve_connect(&Err(RuntimeError::ConnectFailed(info.clone())));
            },
            Notification::Error(info) if self.client.state() == ConnectionState::Error => {
                self.resolve_connect(&Err(RuntimeError::ConnectFailed(info.clone())));
            },
            _ => {},
        }

        // No subscribers is not an error.
        let _ = self.notifications.send(notification);
    }

    fn resolve_connect(&mut self, result: &Result<(), RuntimeError>) {
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }

    fn publish_snapshot(&self) {
        let next = SessionSnapshot::capture(&self.client);
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::convert::Infallible;

    use chatlink_client::{ChannelId, MessageType, env::test_utils::MockEnv};
    use url::Url;

    use super::*;

    /// Driver that opens instantly (or refuses) and records sent frames.
    struct LoopbackDriver {
        refuse: bool,
        events: mpsc::UnboundedSender<TransportEvent>,
        inbox: mpsc::UnboundedReceiver<TransportEvent>,
        sent: mpsc::UnboundedSender<String>,
    }

    impl LoopbackDriver {
        fn new(refuse: bool) -> (Self, mpsc::UnboundedReceiver<String>) {
            let (events, inbox) = mpsc::unbounded_channel();
            let (sent, sent_rx) = mpsc::unbounded_channel();
            (Self { refuse, events, inbox, sent }, sent_rx)
        }
    }

    impl Driver for LoopbackDriver {
        type Error = Infallible;
        type Instant = std::time::Instant;

        async fn open(&mut self, _url: &Url) -> Result<(), Infallible> {
            let event = if self.refuse {
                TransportEvent::Error { reason: "refused".into() }
            } else {
                TransportEvent::Opened
            };
            let _ = self.events.send(event);
            Ok(())
        }

        async fn send_text(&mut self, text: String) -> Result<(), Infallible> {
            let _ = self.sent.send(text);
            Ok(())
        }

        async fn recv(&mut self) -> TransportEvent {
            match self.inbox.recv().await {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self, _reason: &str) {}

        fn now(&self) -> std::time::Instant {
            std::time::Instant::now()
        }
    }

    #[tokio::test]
    async fn connect_resolves_on_open() {
        let (driver, mut sent) = LoopbackDriver::new(false);
        let (runtime, handle) = Runtime::new(RuntimeConfig::default(), driver, MockEnv::new());
        let task = tokio::spawn(runtime.run());

        handle.connect("42").await.unwrap();
        handle.join("7").await.unwrap();

        let frame: serde_json::Value = serde_json::from_str(&sent.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], MessageType::ChannelJoin.as_str());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert_eq!(snapshot.active, Some(ChannelId::from("7")));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn connect_rejects_on_failure() {
        let (driver, _sent) = LoopbackDriver::new(true);
        let (runtime, handle) = Runtime::new(RuntimeConfig::default(), driver, MockEnv::new());
        tokio::spawn(runtime.run());

        let result = handle.connect("42").await;
        assert!(matches!(result, Err(RuntimeError::ConnectFailed(_))));
        assert_eq!(handle.snapshot().state, ConnectionState::Error);
    }

    #[tokio::test]
    async fn send_while_disconnected_fails_immediately() {
        let (driver, _sent) = LoopbackDriver::new(false);
        let (runtime, handle) = Runtime::new(RuntimeConfig::default(), driver, MockEnv::new());
        tokio::spawn(runtime.run());

        let result = handle.send_message("7", "hi").await;
        assert!(matches!(result, Err(RuntimeError::Client(_))));
    }

    #[tokio::test]
    async fn dropped_runtime_closes_handle() {
        let (driver, _sent) = LoopbackDriver::new(false);
        let (runtime, handle) = Runtime::new(RuntimeConfig::default(), driver, MockEnv::new());
        drop(runtime);

        assert_eq!(handle.join("7").await, Err(RuntimeError::SessionClosed));
    }
}
