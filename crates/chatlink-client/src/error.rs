//! Client error types.

use chatlink_core::{ConnectionError, ErrorCode, ErrorInfo};
use chatlink_proto::ChannelId;
use thiserror::Error;

/// Errors returned by [`crate::Client::handle`].
///
/// Only guard violations and local failures are returned; transport and
/// server failures are reported as [`crate::Notification::Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection-level failure (not connected, invalid endpoint, encoding)
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// `channel.join` could not be built or queued
    #[error("failed to join channel {channel_id}: {reason}")]
    JoinChannelFailed {
        /// Channel
        channel_id: ChannelId,
        /// Cause
        reason: String,
    },

    /// `channel.leave` could not be built or queued
    #[error("failed to leave channel {channel_id}: {reason}")]
    LeaveChannelFailed {
        /// Channel
        channel_id: ChannelId,
        /// Cause
        reason: String,
    },
}

impl ClientError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(err) => err.is_transient(),
            Self::JoinChannelFailed { .. } | Self::LeaveChannelFailed { .. } => false,
        }
    }

    /// Code used when this error is surfaced as [`ErrorInfo`].
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Connection(err) => err.code(),
            Self::JoinChannelFailed { .. } => ErrorCode::JoinChannelFailed,
            Self::LeaveChannelFailed { .. } => ErrorCode::LeaveChannelFailed,
        }
    }
}

impl From<&ClientError> for ErrorInfo {
    fn from(err: &ClientError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}
