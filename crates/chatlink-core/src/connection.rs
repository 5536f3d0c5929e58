//! Connection lifecycle state machine.
//!
//! Manages the single persistent connection: connect timeout, heartbeat,
//! reconnection with exponential backoff, and inbound frame validation. Uses
//! the action pattern: methods take time as input and return actions for the
//! driver to execute. This keeps the state machine pure (no I/O).
//!
//! # State Machine
//!
//! ```text
//!                 connect            open
//! ┌──────────────┐───────>┌────────────┐────────>┌───────────┐
//! │ Disconnected │        │ Connecting │         │ Connected │
//! └──────────────┘<───────└────────────┘         └───────────┘
//!        ↑ │    disconnect     │  ↑  │ failure         │ close
//!        │ │                   │  │  ↓ (initial)       ↓
//!        │ │         failure   │  │ ┌───────┐   ┌──────────────┐
//!        │ │     (reconnect)   ↓  │ │ Error │   │ Disconnected │
//!        │ │         ┌──────────────┐└───────┘   └──────────────┘
//!        │ └────────>│ Reconnecting │<───────────────────┘
//!        └───────────└──────────────┘  backoff timer -> Connecting
//! ```
//!
//! Reconnect delays double per attempt (`base * 2^(attempt-1)`); once the
//! attempt counter exceeds the configured maximum the connection parks in
//! `Error` with no timer.

use std::{fmt, ops::Sub, time::Duration};

use chatlink_proto::{Envelope, MessageType};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::{endpoint::Endpoint, env::Environment, error::ConnectionError, timer::Timer};

/// Maximum reconnect attempts before the connection gives up.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Base reconnect delay, doubled per attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Interval between `connection.ping` frames while connected.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Time allowed for the transport to open.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Actions returned by the connection state machine.
///
/// The driver executes the transport actions (`Open`, `Send`, `Close`); the
/// rest are notifications for the layer above.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    /// Open the transport to this URL
    Open {
        /// Socket URL
        url: Url,
    },

    /// Send this envelope as one text frame
    Send(Envelope),

    /// Close the transport
    Close {
        /// Reason for closing
        reason: String,
    },

    /// Lifecycle state changed
    StateChanged {
        /// Previous state
        from: ConnectionState,
        /// New state
        to: ConnectionState,
    },

    /// Transport opened; resolves a pending connect
    Established,

    /// Initial connect failed; rejects a pending connect
    ConnectFailed(ConnectionError),

    /// An established connection was lost
    Disconnected {
        /// Transport-reported reason
        reason: String,
    },

    /// A reconnect attempt is scheduled
    ReconnectScheduled {
        /// Attempt number (1-based)
        attempt: u32,
        /// Delay before the attempt
        delay: Duration,
    },

    /// Error to record and surface (post-connect transport failure or
    /// exhausted reconnect budget)
    Failed(ConnectionError),

    /// Valid inbound envelope for the layer above
    Deliver(Envelope),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport, nothing scheduled
    Disconnected,
    /// Transport opening
    Connecting,
    /// Transport open
    Connected,
    /// Waiting for the backoff timer before the next attempt
    Reconnecting,
    /// Initial connect failed or reconnect budget exhausted
    Error,
}

impl ConnectionState {
    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Error, Reconnecting};

        matches!(
            (self, next),
            (Disconnected, Connecting | Reconnecting | Error)
                | (Connecting, Connected | Error | Disconnected | Reconnecting)
                | (Connected, Disconnected | Reconnecting)
                | (Reconnecting, Connecting | Error | Disconnected)
                | (Error, Connecting | Disconnected)
        )
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Reconnect attempts before entering `Error`
    pub reconnect_attempts: u32,
    /// Base reconnect delay, doubled per attempt
    pub reconnect_delay: Duration,
    /// Heartbeat interval while connected
    pub heartbeat_interval: Duration,
    /// Time allowed for the transport to open
    pub connection_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Backoff delay before reconnect `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.reconnect_delay.saturating_mul(factor)
    }
}

/// Connection state machine
///
/// Manages lifecycle, timeouts, heartbeats and reconnection for the single
/// client connection.
///
/// This is a pure state machine: no I/O, no stored environment. Time is passed
/// to methods that need it; an [`Environment`] is passed where envelope ids
/// and timestamps are generated.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Current state
    state: ConnectionState,
    /// Configuration
    config: ConnectionConfig,
    /// Endpoint of the last `connect`, reused by reconnect attempts
    endpoint: Option<Endpoint>,
    /// Reconnect attempts since the last successful open
    attempts: u32,
    /// Whether the current `Connecting` phase belongs to a reconnect cycle
    reconnecting: bool,
    /// Deadline for the transport to open
    connect_timer: Option<Timer<I>>,
    /// Last heartbeat sent (or the open instant)
    last_heartbeat: Option<I>,
    /// Pending reconnect attempt
    reconnect_timer: Option<Timer<I>>,
    /// Most recent failure
    last_error: Option<ConnectionError>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a connection in [`ConnectionState::Disconnected`].
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            endpoint: None,
            attempts: 0,
            reconnecting: false,
            connect_timer: None,
            last_heartbeat: None,
            reconnect_timer: None,
            last_error: None,
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Endpoint of the last `connect`. `None` before the first connect.
    #[must_use]
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Most recent failure. `None` if nothing failed since the last connect.
    #[must_use]
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    /// Whether a reconnect attempt is scheduled.
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Start connecting to `endpoint`.
    ///
    /// No-op while already connecting or connected. Otherwise resets the
    /// reconnect budget, cancels any scheduled attempt and returns `Open`.
    pub fn connect(&mut self, endpoint: Endpoint, now: I) -> Vec<ConnectionAction> {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            debug!(state = %self.state, "connect ignored");
            return Vec::new();
        }

        self.endpoint = Some(endpoint);
        self.attempts = 0;
        self.reconnecting = false;
        self.reconnect_timer = None;
        self.last_error = None;

        let mut actions = Vec::new();
        self.begin_connect(now, &mut actions);
        actions
    }

    /// Transport opened.
    pub fn handle_open(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            debug!(state = %self.state, "open ignored");
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.connect_timer = None;
        self.attempts = 0;
        self.reconnecting = false;
        self.last_heartbeat = Some(now);
        self.transition(ConnectionState::Connected, &mut actions);

        info!(url = ?self.endpoint.as_ref().map(Endpoint::url), "connection established");
        actions.push(ConnectionAction::Established);
        actions
    }

    /// Transport reported an error.
    ///
    /// While connecting this fails the attempt. On an open connection the
    /// error is recorded; the close that follows drives reconnection.
    pub fn handle_transport_error(&mut self, reason: &str, now: I) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        match self.state {
            ConnectionState::Connecting => {
                let error = ConnectionError::ConnectionFailed { reason: reason.to_string() };
                self.fail_connect(error, now, &mut actions);
            },
            ConnectionState::Connected => {
                let error = ConnectionError::Transport(reason.to_string());
                warn!(%error, "transport error");
                self.last_error = Some(error.clone());
                actions.push(ConnectionAction::Failed(error));
            },
            state => debug!(%state, reason, "transport error ignored"),
        }

        actions
    }

    /// Transport closed without a local `disconnect`.
    pub fn handle_close(&mut self, reason: &str, now: I) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();

        match self.state {
            ConnectionState::Connected => {
                warn!(reason, "connection lost");
                self.last_heartbeat = None;
                self.transition(ConnectionState::Disconnected, &mut actions);
                actions.push(ConnectionAction::Disconnected { reason: reason.to_string() });
                self.schedule_reconnect(now, &mut actions);
            },
            ConnectionState::Connecting => {
                let error = ConnectionError::ConnectionFailed { reason: reason.to_string() };
                self.fail_connect(error, now, &mut actions);
            },
            state => debug!(%state, reason, "close ignored"),
        }

        actions
    }

    /// Close the connection and cancel every timer.
    ///
    /// Suppresses auto-reconnect: the transport close that follows is
    /// ignored.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        let was_open =
            matches!(self.state, ConnectionState::Connected | ConnectionState::Connecting);

        self.connect_timer = None;
        self.last_heartbeat = None;
        self.reconnect_timer = None;
        self.reconnecting = false;
        self.attempts = 0;

        self.transition(ConnectionState::Disconnected, &mut actions);
        if was_open {
            actions.push(ConnectionAction::Close { reason: "client disconnect".to_string() });
        }

        actions
    }

    /// Build an envelope stamped with a fresh id, the wall clock and the
    /// connection's user.
    pub fn envelope<E>(&self, env: &E, kind: MessageType, data: Value) -> Envelope
    where
        E: Environment<Instant = I>,
    {
        let user_id = self.endpoint.as_ref().map(|e| e.user_id().to_string()).unwrap_or_default();
        Envelope::new(
            format!("{:032x}", env.random_u128()),
            kind,
            data,
            env.wall_clock_ms(),
            user_id,
        )
    }

    /// Queue an already built envelope for transmission.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` unless connected
    pub fn transmit(&self, envelope: Envelope) -> Result<ConnectionAction, ConnectionError> {
        if self.state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected { state: self.state });
        }

        Ok(ConnectionAction::Send(envelope))
    }

    /// Wrap `data` in an envelope and queue it.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` unless connected
    pub fn send<E>(
        &self,
        env: &E,
        kind: MessageType,
        data: Value,
    ) -> Result<ConnectionAction, ConnectionError>
    where
        E: Environment<Instant = I>,
    {
        if self.state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected { state: self.state });
        }

        self.transmit(self.envelope(env, kind, data))
    }

    /// Record a frame the transport failed to send.
    pub fn record_send_failure(&mut self, reason: &str) -> ConnectionError {
        let error = ConnectionError::SendFailed { reason: reason.to_string() };
        warn!(%error, "send failed");
        self.last_error = Some(error.clone());
        error
    }

    /// Record an `error` envelope from the server.
    ///
    /// The connection state is unaffected.
    pub fn record_server_error(&mut self, code: Option<String>, message: &str) {
        let error = ConnectionError::Server { code, message: message.to_string() };
        warn!(%error, "server reported error");
        self.last_error = Some(error);
    }

    /// Process an inbound text frame.
    ///
    /// Malformed frames are logged and dropped. Pongs are consumed, pings are
    /// answered, everything else is delivered.
    pub fn handle_text<E>(&mut self, env: &E, text: &str) -> Vec<ConnectionAction>
    where
        E: Environment<Instant = I>,
    {
        if self.state != ConnectionState::Connected {
            debug!(state = %self.state, "frame outside connected state dropped");
            return Vec::new();
        }

        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, len = text.len(), "dropping malformed frame");
                return Vec::new();
            },
        };

        match envelope.kind {
            MessageType::ConnectionPong => Vec::new(),
            MessageType::ConnectionPing => {
                let pong = self.envelope(env, MessageType::ConnectionPong, empty_object());
                vec![ConnectionAction::Send(pong)]
            },
            _ => vec![ConnectionAction::Deliver(envelope)],
        }
    }

    /// Process periodic maintenance (connect timeout, heartbeat, reconnect).
    pub fn tick<E>(&mut self, env: &E, now: I) -> Vec<ConnectionAction>
    where
        E: Environment<Instant = I>,
    {
        let mut actions = Vec::new();

        match self.state {
            ConnectionState::Connecting => {
                if let Some(timer) = self.connect_timer
                    && timer.is_due(now)
                {
                    let elapsed = timer.elapsed(now);
                    actions.push(ConnectionAction::Close {
                        reason: format!("connection timeout after {elapsed:?}"),
                    });
                    self.fail_connect(ConnectionError::ConnectionTimeout { elapsed }, now, &mut actions);
                }
            },
            ConnectionState::Connected => {
                let due = match self.last_heartbeat {
                    None => true,
                    Some(last) => now - last >= self.config.heartbeat_interval,
                };

                if due {
                    let ping = self.envelope(env, MessageType::ConnectionPing, empty_object());
                    actions.push(ConnectionAction::Send(ping));
                    self.last_heartbeat = Some(now);
                }
            },
            ConnectionState::Reconnecting => {
                if let Some(timer) = self.reconnect_timer
                    && timer.is_due(now)
                {
                    self.reconnect_timer = None;
                    self.reconnecting = true;
                    info!(attempt = self.attempts, "reconnecting");
                    self.begin_connect(now, &mut actions);
                }
            },
            ConnectionState::Disconnected | ConnectionState::Error => {},
        }

        actions
    }

    fn begin_connect(&mut self, now: I, actions: &mut Vec<ConnectionAction>) {
        let Some(url) = self.endpoint.as_ref().map(|e| e.url().clone()) else {
            return;
        };

        self.transition(ConnectionState::Connecting, actions);
        self.connect_timer = Some(Timer::new(now, self.config.connection_timeout));
        actions.push(ConnectionAction::Open { url });
    }

    fn fail_connect(&mut self, error: ConnectionError, now: I, actions: &mut Vec<ConnectionAction>) {
        self.connect_timer = None;

        if self.reconnecting {
            warn!(%error, attempt = self.attempts, "reconnect attempt failed");
            self.last_error = Some(error);
            self.schedule_reconnect(now, actions);
        } else {
            warn!(%error, "connect failed");
            self.transition(ConnectionState::Error, actions);
            self.last_error = Some(error.clone());
            actions.push(ConnectionAction::ConnectFailed(error));
        }
    }

    fn schedule_reconnect(&mut self, now: I, actions: &mut Vec<ConnectionAction>) {
        self.attempts += 1;
        self.reconnecting = false;

        if self.attempts > self.config.reconnect_attempts {
            let error = ConnectionError::MaxReconnectAttemptsExceeded {
                attempts: self.config.reconnect_attempts,
            };
            warn!(%error, "giving up");
            self.reconnect_timer = None;
            self.transition(ConnectionState::Error, actions);
            self.last_error = Some(error.clone());
            actions.push(ConnectionAction::Failed(error));
            return;
        }

        let delay = self.config.backoff(self.attempts);
        debug!(attempt = self.attempts, ?delay, "reconnect scheduled");
        self.transition(ConnectionState::Reconnecting, actions);
        self.reconnect_timer = Some(Timer::new(now, delay));
        actions.push(ConnectionAction::ReconnectScheduled { attempt: self.attempts, delay });
    }

    fn transition(&mut self, to: ConnectionState, actions: &mut Vec<ConnectionAction>) {
        let from = self.state;
        if from == to {
            return;
        }

        debug_assert!(from.can_transition_to(to), "invalid transition {from} -> {to}");
        debug!(%from, %to, "connection state changed");
        self.state = to;
        actions.push(ConnectionAction::StateChanged { from, to });
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Instant;

    use chatlink_proto::UserId;
    use serde_json::json;

    use super::*;
    use crate::env::test_utils::MockEnv;

    fn endpoint() -> Endpoint {
        Endpoint::new("http://localhost:8080", UserId::from("42")).unwrap()
    }

    fn connected(env: &MockEnv) -> (Connection<Instant>, Instant) {
        let t0 = env.now();
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(endpoint(), t0);
        conn.handle_open(t0);
        (conn, t0)
    }

    fn frame(kind: &str) -> String {
        json!({ "id": "s1", "type": kind, "data": {}, "timestamp": 1, "user_id": "0" })
            .to_string()
    }

    #[test]
    fn connect_opens_endpoint_url() {
        let env = MockEnv::new();
        let mut conn = Connection::new(ConnectionConfig::default());

        let actions = conn.connect(endpoint(), env.now());

        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(actions.iter().any(|a| matches!(
            a,
            ConnectionAction::Open { url } if url.as_str() == "ws://localhost:8080/ws?user_id=42"
        )));
    }

    #[test]
    fn connect_is_idempotent_while_connecting() {
        let env = MockEnv::new();
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(endpoint(), env.now());

        assert!(conn.connect(endpoint(), env.now()).is_empty());
    }

    #[test]
    fn open_establishes_and_resets_attempts() {
        let env = MockEnv::new();
        let (conn, _) = connected(&env);
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn initial_failure_is_terminal_error() {
        let env = MockEnv::new();
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(endpoint(), env.now());

        let actions = conn.handle_transport_error("refused", env.now());

        assert_eq!(conn.state(), ConnectionState::Error);
        assert!(!conn.reconnect_pending());
        assert!(actions.iter().any(|a| matches!(a, ConnectionAction::ConnectFailed(_))));

        // The close that follows the error must not count again.
        assert!(conn.handle_close("closed", env.now()).is_empty());
    }

    #[test]
    fn connect_timeout_force_closes() {
        let env = MockEnv::new();
        let t0 = env.now();
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(endpoint(), t0);

        assert!(conn.tick(&env, t0 + Duration::from_millis(9_999)).is_empty());

        let actions = conn.tick(&env, t0 + DEFAULT_CONNECTION_TIMEOUT);
        assert!(matches!(actions[0], ConnectionAction::Close { .. }));
        assert!(actions.iter().any(|a| matches!(
            a,
            ConnectionAction::ConnectFailed(ConnectionError::ConnectionTimeout { .. })
        )));
        assert_eq!(conn.state(), ConnectionState::Error);
    }

    #[test]
    fn send_requires_connection() {
        let env = MockEnv::new();
        let conn: Connection<Instant> = Connection::new(ConnectionConfig::default());

        let result = conn.send(&env, MessageType::ChannelJoin, json!({ "channel_id": "7" }));
        assert_eq!(
            result,
            Err(ConnectionError::NotConnected { state: ConnectionState::Disconnected })
        );
    }

    #[test]
    fn send_stamps_envelope() {
        let env = MockEnv::new();
        let (conn, _) = connected(&env);

        let action = conn.send(&env, MessageType::ChannelJoin, json!({ "channel_id": "7" })).unwrap();
        let ConnectionAction::Send(envelope) = action else {
            panic!("expected send action");
        };

        assert_eq!(envelope.kind, MessageType::ChannelJoin);
        assert_eq!(envelope.user_id, "42");
        assert_eq!(envelope.id.len(), 32);
        assert_eq!(envelope.timestamp, crate::env::test_utils::MOCK_WALL_CLOCK_MS);
    }

    #[test]
    fn heartbeat_pings_on_interval() {
        let env = MockEnv::new();
        let (mut conn, t0) = connected(&env);

        assert!(conn.tick(&env, t0 + Duration::from_secs(29)).is_empty());

        let actions = conn.tick(&env, t0 + DEFAULT_HEARTBEAT_INTERVAL);
        assert!(matches!(
            &actions[..],
            [ConnectionAction::Send(e)] if e.kind == MessageType::ConnectionPing
        ));

        assert!(conn.tick(&env, t0 + DEFAULT_HEARTBEAT_INTERVAL).is_empty());
    }

    #[test]
    fn pong_is_consumed_and_ping_answered() {
        let env = MockEnv::new();
        let (mut conn, _) = connected(&env);

        assert!(conn.handle_text(&env, &frame("connection.pong")).is_empty());

        let actions = conn.handle_text(&env, &frame("connection.ping"));
        assert!(matches!(
            &actions[..],
            [ConnectionAction::Send(e)] if e.kind == MessageType::ConnectionPong
        ));
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let env = MockEnv::new();
        let (mut conn, _) = connected(&env);

        assert!(conn.handle_text(&env, "{").is_empty());
        assert!(conn.handle_text(&env, r#"{"id":"1","data":{},"timestamp":1,"user_id":"1"}"#).is_empty());
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn valid_frames_are_delivered() {
        let env = MockEnv::new();
        let (mut conn, _) = connected(&env);

        let actions = conn.handle_text(&env, &frame("user.notification"));
        assert!(matches!(&actions[..], [ConnectionAction::Deliver(_)]));
    }

    #[test]
    fn reconnect_backoff_doubles_then_gives_up() {
        let env = MockEnv::new();
        let (mut conn, t0) = connected(&env);
        let mut now = t0;
        let mut delays = Vec::new();

        let mut actions = conn.handle_close("network down", now);
        loop {
            let scheduled = actions.iter().find_map(|a| match a {
                ConnectionAction::ReconnectScheduled { delay, .. } => Some(*delay),
                _ => None,
            });
            let Some(delay) = scheduled else { break };
            delays.push(delay.as_millis());

            now += delay;
            let reopened = conn.tick(&env, now);
            assert!(reopened.iter().any(|a| matches!(a, ConnectionAction::Open { .. })));
            actions = conn.handle_transport_error("refused", now);
        }

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
        assert_eq!(conn.state(), ConnectionState::Error);
        assert!(!conn.reconnect_pending());
        assert!(matches!(
            conn.last_error(),
            Some(ConnectionError::MaxReconnectAttemptsExceeded { attempts: 5 })
        ));
    }

    #[test]
    fn successful_reconnect_resets_budget() {
        let env = MockEnv::new();
        let (mut conn, t0) = connected(&env);

        conn.handle_close("blip", t0);
        let t1 = t0 + DEFAULT_RECONNECT_DELAY;
        conn.tick(&env, t1);
        conn.handle_open(t1);

        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn disconnect_cancels_reconnect() {
        let env = MockEnv::new();
        let (mut conn, t0) = connected(&env);
        conn.handle_close("blip", t0);
        assert!(conn.reconnect_pending());

        let actions = conn.disconnect();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!actions.iter().any(|a| matches!(a, ConnectionAction::Close { .. })));
        assert!(conn.tick(&env, t0 + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn disconnect_suppresses_reconnect_on_close() {
        let env = MockEnv::new();
        let (mut conn, t0) = connected(&env);

        let actions = conn.disconnect();
        assert!(actions.iter().any(|a| matches!(a, ConnectionAction::Close { .. })));
        assert!(conn.handle_close("closed", t0).is_empty());
        assert!(!conn.reconnect_pending());
    }

    #[test]
    fn disconnected_never_jumps_to_connected() {
        assert!(!ConnectionState::Disconnected.can_transition_to(ConnectionState::Connected));
        assert!(!ConnectionState::Reconnecting.can_transition_to(ConnectionState::Connected));
        assert!(!ConnectionState::Error.can_transition_to(ConnectionState::Connected));
    }
}
