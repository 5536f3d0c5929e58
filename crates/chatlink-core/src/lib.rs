//! Chatlink connection core
//!
//! Sans-IO connection lifecycle for the chatlink channel client. Nothing in
//! this crate touches a socket or a clock directly: methods take the current
//! instant (and an [`env::Environment`] where ids or wall-clock timestamps are
//! needed) and return [`connection::ConnectionAction`]s for a driver to
//! execute.
//!
//! # Components
//!
//! - [`connection`]: Lifecycle state machine, heartbeat, connect timeout and
//!   reconnect backoff
//! - [`endpoint`]: WebSocket URL construction
//! - [`env`]: Time and randomness abstraction
//! - [`error`]: Connection error taxonomy and the structured `ErrorInfo`
//! - [`timer`]: Elapsed-time deadlines

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod endpoint;
pub mod env;
pub mod error;
pub mod timer;

pub use connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState};
pub use endpoint::Endpoint;
pub use env::Environment;
pub use error::{ConnectionError, ErrorCode, ErrorInfo};
