//! Runtime error types.

use chatlink_client::{ClientError, ErrorInfo};
use thiserror::Error;

/// Errors returned by [`crate::SessionHandle`] calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// The client rejected the call (guard violation, bad endpoint)
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The connection attempt failed or timed out
    #[error("connect failed: {0}")]
    ConnectFailed(ErrorInfo),

    /// A disconnect or a new connect superseded the attempt
    #[error("connect cancelled")]
    ConnectCancelled,

    /// The session task is gone
    #[error("session closed")]
    SessionClosed,
}

impl RuntimeError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Client(err) => err.is_transient(),
            Self::ConnectFailed(_) | Self::ConnectCancelled => true,
            Self::SessionClosed => false,
        }
    }
}
