//! WebSocket endpoint construction.
//!
//! The socket lives at `{base}/ws?user_id={id}`. HTTP bases are mapped to
//! their WebSocket schemes so the same base URL serves REST and the socket.

use chatlink_proto::UserId;
use url::Url;

use crate::error::ConnectionError;

/// Resolved connection endpoint.
///
/// # Invariants
///
/// - `url` always has a `ws` or `wss` scheme, ends in a `/ws` path segment
///   and carries a `user_id` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    user_id: UserId,
}

impl Endpoint {
    /// Build the endpoint for `user_id` from a base URL.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidEndpoint` if `base` is not an absolute
    ///   `http`, `https`, `ws` or `wss` URL
    pub fn new(base: &str, user_id: UserId) -> Result<Self, ConnectionError> {
        let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(invalid(format!("unsupported scheme `{other}`"))),
        };
        url.set_scheme(scheme).map_err(|()| invalid(format!("cannot use scheme `{scheme}`")))?;

        url.path_segments_mut()
            .map_err(|()| invalid("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("ws");

        url.query_pairs_mut().append_pair("user_id", user_id.as_str());

        Ok(Self { url, user_id })
    }

    /// Append an extra query parameter.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(key, value);
        self
    }

    /// Full socket URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// User the connection is opened for.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

fn invalid(reason: String) -> ConnectionError {
    ConnectionError::InvalidEndpoint { reason }
}
