//! Driver trait for abstracting transport I/O.
//!
//! The [`Driver`] trait decouples the runtime from a specific socket
//! implementation. Production uses the WebSocket driver, the simulation
//! harness uses an in-memory driver, while the generic [`crate::Runtime`]
//! handles all orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use url::Url;

/// What the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket opened.
    Opened,
    /// Text frame received.
    Text(String),
    /// Socket error.
    Error {
        /// Transport-reported reason
        reason: String,
    },
    /// Socket closed.
    Closed {
        /// Close reason
        reason: String,
    },
}

/// Abstracts transport operations for the runtime.
///
/// # Implementations
///
/// - **WebSocket**: tokio-tungstenite (feature `websocket`)
/// - **Simulation**: in-memory server under paused tokio time
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Start opening a socket to `url`.
    ///
    /// Completion is reported through [`Driver::recv`] as
    /// [`TransportEvent::Opened`] or [`TransportEvent::Error`]; this call must
    /// not wait for the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt cannot be started at all.
    fn open(&mut self, url: &Url) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if no socket is open or the send fails.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next transport event. Pending while the transport is idle.
    ///
    /// Must be cancel safe: it is polled inside `tokio::select!`.
    fn recv(&mut self) -> impl Future<Output = TransportEvent> + Send;

    /// Close the socket and abandon any attempt in progress. No further
    /// events are reported for it.
    fn close(&mut self, reason: &str) -> impl Future<Output = ()> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;
}
