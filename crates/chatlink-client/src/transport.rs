//! WebSocket transport for the client.
//!
//! Provides [`WebSocketConnection`] which handles socket I/O for text frames.
//! This is a thin layer that just sends/receives frames - protocol logic
//! remains in the Sans-IO [`crate::Client`].

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

/// Capacity of the frame channels in each direction.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Socket error on an open connection.
    #[error("socket error: {0}")]
    Socket(String),
}

/// What the socket task reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text frame received.
    Text(String),
    /// Socket error; a `Closed` follows.
    Error(String),
    /// Socket closed.
    Closed {
        /// Close reason from the peer, or the local cause
        reason: String,
    },
}

/// Handle to an open WebSocket.
///
/// Frames are sent/received via the channels, and an internal task handles
/// the socket I/O. Dropping `to_server` closes the socket gracefully.
pub struct WebSocketConnection {
    /// Send text frames to the server.
    pub to_server: mpsc::Sender<String>,
    /// Receive frames and lifecycle events from the server.
    pub from_server: mpsc::Receiver<Inbound>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl WebSocketConnection {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Open a WebSocket to `url`.
///
/// Returns a [`WebSocketConnection`] with channels for frame transport.
///
/// # Errors
///
/// - `TransportError::Connection` if the handshake fails
pub async fn connect(url: &Url) -> Result<WebSocketConnection, TransportError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (from_server_tx, from_server_rx) = mpsc::channel::<Inbound>(CHANNEL_CAPACITY);

    let handle = tokio::spawn(run_connection(stream, to_server_rx, from_server_tx));

    Ok(WebSocketConnection {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Run the connection, bridging between channels and the socket.
async fn run_connection(
    stream: Socket,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<Inbound>,
) {
    let (mut sink, mut source) = stream.split();

    let reason = loop {
        tokio::select! {
            outbound = to_server.recv() => {
                let Some(text) = outbound else {
                    let _ = sink.close().await;
                    break "client closed".to_string();
                };

                if let Err(e) = sink.send(Message::text(text)).await {
                    let error = TransportError::Socket(e.to_string());
                    warn!(%error, "send failed");
                    let _ = from_server.send(Inbound::Error(error.to_string())).await;
                    break error.to_string();
                }
            }
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if from_server.send(Inbound::Text(text.as_str().to_string())).await.is_err() {
                        break "receiver dropped".to_string();
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| f.reason.as_str().to_string()).unwrap_or_default();
                },
                Some(Ok(other)) => debug!(?other, "non-text frame ignored"),
                Some(Err(e)) => {
                    let error = TransportError::Socket(e.to_string());
                    let _ = from_server.send(Inbound::Error(error.to_string())).await;
                    break error.to_string();
                },
                None => break "stream ended".to_string(),
            },
        }
    };

    let _ = from_server.send(Inbound::Closed { reason }).await;
}
