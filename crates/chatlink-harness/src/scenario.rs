//! Scenario driver.
//!
//! A [`Simulation`] wires a [`SimServer`] to a real [`chatlink_app::Runtime`]
//! through a [`crate::SimDriver`] and a seeded [`SimEnv`]. Tests drive it
//! through the [`SessionHandle`], let virtual time pass with
//! [`Simulation::settle`] or [`Simulation::advance`], and check invariants
//! against the result.
//!
//! Must run inside a tokio runtime with paused time, usually
//! `#[tokio::test(start_paused = true)]`.

use std::time::Duration;

use chatlink_app::{RuntimeConfig, Session, SessionHandle};
use chatlink_client::{ConnectionState, Notification};
use tokio::{
    sync::broadcast::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::warn;

use crate::{
    InvariantRegistry, ServerBehavior, SimEnv, SimServer,
    invariants::{Report, SystemSnapshot},
};

/// Virtual time [`Simulation::settle`] lets pass.
///
/// Several tick intervals, far below any protocol timeout.
pub const SETTLE_TIME: Duration = Duration::from_millis(50);

/// A running client session against the scripted server.
pub struct Simulation {
    server: SimServer,
    handle: SessionHandle,
    task: JoinHandle<()>,
    notifications: broadcast::Receiver<Notification>,
    transitions: Vec<(ConnectionState, ConnectionState)>,
    seen: Vec<Notification>,
    registry: InvariantRegistry,
}

impl Simulation {
    /// Default configuration and a well-behaved server.
    pub fn start(seed: u64) -> Self {
        Self::with_config(seed, RuntimeConfig::default(), ServerBehavior::default())
    }

    /// Custom runtime configuration and server behavior.
    pub fn with_config(seed: u64, config: RuntimeConfig, behavior: ServerBehavior) -> Self {
        let server = SimServer::new(behavior);
        let (handle, task) = Session::start(config, server.driver(), SimEnv::with_seed(seed));
        let notifications = handle.subscribe();

        Self {
            server,
            handle,
            task,
            notifications,
            transitions: Vec::new(),
            seen: Vec::new(),
            registry: InvariantRegistry::standard(),
        }
    }

    /// The scripted server.
    pub fn server(&self) -> &SimServer {
        &self.server
    }

    /// Handle to the client session.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Let in-flight frames and timers run, then collect notifications.
    pub async fn settle(&mut self) {
        self.advance(SETTLE_TIME).await;
    }

    /// Let `duration` of virtual time pass, then collect notifications.
    pub async fn advance(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
        self.collect();
    }

    /// Every notification observed so far, oldest first.
    pub fn notifications(&self) -> &[Notification] {
        &self.seen
    }

    /// Current observable state of client and server.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            client: self.handle.snapshot(),
            transitions: self.transitions.clone(),
            server_channels: self.server.channels(),
        }
    }

    /// Check the standard invariants.
    ///
    /// # Errors
    ///
    /// Every violated invariant.
    pub fn check(&self) -> Result<(), Report> {
        self.registry.check_all(&self.snapshot())
    }

    /// Check the standard invariants, panicking on violation.
    pub fn assert_invariants(&self, context: &str) {
        self.registry.assert_all(&self.snapshot(), context);
    }

    /// Shut the session down and wait for its task.
    pub async fn shutdown(self) {
        if let Err(error) = self.handle.shutdown().await {
            warn!(%error, "session already stopped");
        }
        if let Err(error) = self.task.await {
            warn!(%error, "session task failed");
        }
    }

    fn collect(&mut self) {
        loop {
            match self.notifications.try_recv() {
                Ok(notification) => {
                    if let Notification::StateChanged { from, to } = &notification {
                        self.transitions.push((*from, *to));
                    }
                    self.seen.push(notification);
                },
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "simulation lagged behind notifications");
                },
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
