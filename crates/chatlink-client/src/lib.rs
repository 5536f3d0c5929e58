//! Client
//!
//! Action-based client state machine for the chatlink channel protocol.
//! Manages the connection lifecycle, channel memberships, the ack-gated
//! channel switch and per-channel inbound state.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`chatlink_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine owning the single connection
//! - [`membership`]: Joined/active channels and the switch handshake
//! - [`router`]: Inbound dispatch into message logs, typing and presence
//! - [`navigation`]: Route to channel resolution
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::WebSocketConnection`]: Channel pair bridged to a socket
//! - [`transport::connect`]: Open a WebSocket to the server

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod event;
pub mod membership;
pub mod navigation;
pub mod router;

#[cfg(feature = "transport")]
pub mod transport;

pub use chatlink_core::{ConnectionState, Environment, ErrorCode, ErrorInfo, env};
pub use chatlink_proto::{ChannelId, Envelope, MessageType, UserId};
pub use client::{Client, ClientConfig, DEFAULT_SERVER_URL};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, Notification};
