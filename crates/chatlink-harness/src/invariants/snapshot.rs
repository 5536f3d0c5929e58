//! Observable system state for invariant checks.

use std::collections::{BTreeMap, BTreeSet};

use chatlink_app::SessionSnapshot;
use chatlink_client::{ChannelId, ConnectionState};

/// Everything an invariant may look at.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Client state
    pub client: SessionSnapshot,
    /// Every state transition reported so far, in order
    pub transitions: Vec<(ConnectionState, ConnectionState)>,
    /// Server-side membership of the client, `None` without a connection
    pub server_channels: Option<BTreeSet<ChannelId>>,
}

impl SystemSnapshot {
    /// Snapshot of a fresh, disconnected system.
    pub fn empty() -> Self {
        Self {
            client: SessionSnapshot {
                state: ConnectionState::Disconnected,
                user_id: None,
                joined: BTreeSet::new(),
                active: None,
                switching: false,
                messages: Vec::new(),
                typing: Vec::new(),
                connected_users: BTreeMap::new(),
                last_error: None,
            },
            transitions: Vec::new(),
            server_channels: None,
        }
    }
}
