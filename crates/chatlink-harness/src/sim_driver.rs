//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the WebSocket driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`chatlink_app::Runtime`] orchestration code runs in both production and
//! simulation.

use chatlink_app::{Driver, TransportEvent};
use thiserror::Error;
use tokio::{sync::mpsc, time::Instant};
use url::Url;

use crate::SimServer;

/// Frame rejected by the scripted server.
#[derive(Debug, Clone, Error)]
#[error("sim server rejected frame: {0}")]
pub struct SimDriverError(pub String);

/// Simulation driver for deterministic testing.
///
/// Created by [`SimServer::driver`]; everything it sends lands in that
/// server synchronously, and everything the server emits is queued here.
pub struct SimDriver {
    server: SimServer,
    inbox: mpsc::UnboundedReceiver<TransportEvent>,
}

impl SimDriver {
    pub(crate) fn new(server: SimServer, inbox: mpsc::UnboundedReceiver<TransportEvent>) -> Self {
        Self { server, inbox }
    }

    /// Discard events queued for a connection that no longer exists.
    fn drain(&mut self) {
        while self.inbox.try_recv().is_ok() {}
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = Instant;

    async fn open(&mut self, url: &Url) -> Result<(), SimDriverError> {
        self.drain();
        self.server.open(url);
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), SimDriverError> {
        self.server.receive(&text)
    }

    async fn recv(&mut self) -> TransportEvent {
        match self.inbox.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, _reason: &str) {
        self.server.close();
        self.drain();
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
