//! Error types for the connection core.
//!
//! [`ConnectionError`] is the strongly-typed failure of a connection
//! operation. [`ErrorInfo`] is the flattened `{ code, message, details }`
//! record the client stores as its last error and shows to the user;
//! transport and protocol failures travel as `ErrorInfo`, never as `Err`
//! across the async boundary.

use std::{fmt, time::Duration};

use serde_json::Value;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Transport failed before the connection opened
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Transport-reported reason
        reason: String,
    },

    /// Connection did not open within the configured timeout
    #[error("connection timeout after {elapsed:?}")]
    ConnectionTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Socket error after the connection was established
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation requires an open connection
    #[error("not connected (state: {state})")]
    NotConnected {
        /// State when the operation was attempted
        state: ConnectionState,
    },

    /// Transport rejected an outbound frame
    #[error("send failed: {reason}")]
    SendFailed {
        /// Transport-reported reason
        reason: String,
    },

    /// Reconnect budget exhausted; the connection is in terminal `Error`
    #[error("max reconnect attempts exceeded ({attempts})")]
    MaxReconnectAttemptsExceeded {
        /// Configured maximum
        attempts: u32,
    },

    /// Endpoint URL could not be built
    #[error("invalid endpoint: {reason}")]
    InvalidEndpoint {
        /// Parse or validation failure
        reason: String,
    },

    /// Outbound envelope could not be encoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server answered with an `error` envelope
    #[error("server error: {message}")]
    Server {
        /// Server-assigned code, if any
        code: Option<String>,
        /// Server message
        message: String,
    },
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Network failures and timeouts are transient. Guard violations, an
    /// exhausted reconnect budget and malformed endpoints are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::Transport(_)
                | Self::SendFailed { .. }
        )
    }

    /// Code used when this error is surfaced as [`ErrorInfo`].
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Self::ConnectionTimeout { .. } => ErrorCode::ConnectionTimeout,
            Self::Transport(_) => ErrorCode::TransportError,
            Self::NotConnected { .. } => ErrorCode::NotConnected,
            Self::SendFailed { .. } => ErrorCode::SendFailed,
            Self::MaxReconnectAttemptsExceeded { .. } => ErrorCode::MaxReconnectAttemptsExceeded,
            Self::InvalidEndpoint { .. } => ErrorCode::InvalidEndpoint,
            Self::Protocol(_) => ErrorCode::ProtocolError,
            Self::Server { code, .. } => ErrorCode::Server(code.clone()),
        }
    }
}

impl From<chatlink_proto::ProtocolError> for ConnectionError {
    fn from(err: chatlink_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Error code carried by [`ErrorInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Initial connection attempt failed
    ConnectionFailed,
    /// Connection did not open in time
    ConnectionTimeout,
    /// Socket error on an open connection
    TransportError,
    /// Operation attempted while not connected
    NotConnected,
    /// Outbound frame rejected by the transport
    SendFailed,
    /// `channel.join` could not be sent
    JoinChannelFailed,
    /// `channel.leave` could not be sent
    LeaveChannelFailed,
    /// Reconnect budget exhausted
    MaxReconnectAttemptsExceeded,
    /// Endpoint URL invalid
    InvalidEndpoint,
    /// Local encoding failure
    ProtocolError,
    /// Error reported by the server; carries the server's code if any
    Server(Option<String>),
}

impl ErrorCode {
    /// Stable string form of the code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ConnectionTimeout => "CONNECTION_TIMEOUT",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::NotConnected => "NOT_CONNECTED",
            Self::SendFailed => "SEND_FAILED",
            Self::JoinChannelFailed => "JOIN_CHANNEL_FAILED",
            Self::LeaveChannelFailed => "LEAVE_CHANNEL_FAILED",
            Self::MaxReconnectAttemptsExceeded => "MAX_RECONNECT_ATTEMPTS_EXCEEDED",
            Self::InvalidEndpoint => "INVALID_ENDPOINT",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::Server(Some(code)) => code,
            Self::Server(None) => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error record: `{ code, message, details }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional structured context
    pub details: Option<Value>,
}

impl ErrorInfo {
    /// Create an error record without details.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&ConnectionError> for ErrorInfo {
    fn from(err: &ConnectionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<ConnectionError> for ErrorInfo {
    fn from(err: ConnectionError) -> Self {
        Self::from(&err)
    }
}
