//! WebSocket driver.
//!
//! Bridges the [`Driver`] trait onto `chatlink_client::transport`. The
//! handshake runs on its own task so the runtime keeps ticking (and can time
//! the attempt out) while it is in progress.

use chatlink_client::transport::{self, Inbound, TransportError, WebSocketConnection};
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use crate::{Driver, TransportEvent};

type PendingConnect = oneshot::Receiver<Result<WebSocketConnection, TransportError>>;

/// Production driver over a real WebSocket.
#[derive(Default)]
pub struct WebSocketDriver {
    pending: Option<PendingConnect>,
    connection: Option<WebSocketConnection>,
}

impl WebSocketDriver {
    /// Create an idle driver.
    pub fn new() -> Self {
        Self::default()
    }

    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.stop();
        }
    }
}

impl Driver for WebSocketDriver {
    type Error = TransportError;
    type Instant = std::time::Instant;

    async fn open(&mut self, url: &Url) -> Result<(), TransportError> {
        self.drop_connection();

        let (done, pending) = oneshot::channel();
        let url = url.clone();
        tokio::spawn(async move {
            let _ = done.send(transport::connect(&url).await);
        });

        self.pending = Some(pending);
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| TransportError::Socket("not open".to_string()))?;

        connection
            .to_server
            .send(text)
            .await
            .map_err(|_| TransportError::Socket("connection task stopped".to_string()))
    }

    async fn recv(&mut self) -> TransportEvent {
        if let Some(pending) = self.pending.as_mut() {
            let outcome = pending.await;
            self.pending = None;

            return match outcome {
                Ok(Ok(connection)) => {
                    self.connection = Some(connection);
                    TransportEvent::Opened
                },
                Ok(Err(error)) => TransportEvent::Error { reason: error.to_string() },
                Err(_) => TransportEvent::Error { reason: "connect task aborted".to_string() },
            };
        }

        let Some(connection) = self.connection.as_mut() else {
            return std::future::pending().await;
        };

        match connection.from_server.recv().await {
            Some(Inbound::Text(text)) => TransportEvent::Text(text),
            Some(Inbound::Error(reason)) => TransportEvent::Error { reason },
            Some(Inbound::Closed { reason }) => {
                self.connection = None;
                TransportEvent::Closed { reason }
            },
            None => {
                self.connection = None;
                TransportEvent::Closed { reason: "connection task stopped".to_string() }
            },
        }
    }

    async fn close(&mut self, reason: &str) {
        debug!(reason, "closing socket");
        self.pending = None;
        // Dropping the sender closes the socket gracefully.
        self.connection = None;
    }

    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }
}
