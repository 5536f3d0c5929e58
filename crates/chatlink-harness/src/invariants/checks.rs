//! Standard invariant checks.

use std::collections::HashSet;

use chatlink_client::ConnectionState;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// The active channel must be a joined channel.
///
/// Prevents the UI from showing a channel the server is not sending.
pub struct ActiveChannelJoined;

impl Invariant for ActiveChannelJoined {
    fn name(&self) -> &'static str {
        "active_channel_joined"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if let Some(active) = &state.client.active
            && !state.client.joined.contains(active)
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!("active {active} not in joined {:?}", state.client.joined),
            });
        }
        Ok(())
    }
}

/// Membership only exists on an open connection.
///
/// The server drops membership with the socket, so a client that is not
/// connected must not believe it is in any channel or mid-switch.
pub struct MembershipRequiresConnection;

impl Invariant for MembershipRequiresConnection {
    fn name(&self) -> &'static str {
        "membership_requires_connection"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let client = &state.client;
        if client.state != ConnectionState::Connected
            && (!client.joined.is_empty() || client.switching)
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "state {} with joined {:?} switching {}",
                    client.state, client.joined, client.switching
                ),
            });
        }
        Ok(())
    }
}

/// Every reported transition is in the allowed table.
pub struct TransitionsFollowTable;

impl Invariant for TransitionsFollowTable {
    fn name(&self) -> &'static str {
        "transitions_follow_table"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if let Some((from, to)) =
            state.transitions.iter().find(|(from, to)| !from.can_transition_to(*to))
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{from} -> {to} in {:?}", state.transitions),
            });
        }

        // Consecutive reports must chain.
        if let Some(pair) = state.transitions.windows(2).find(|w| w[0].1 != w[1].0) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("broken chain {:?} then {:?}", pair[0], pair[1]),
            });
        }
        Ok(())
    }
}

/// A message id appears at most once in a channel log.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        if let Some(duplicate) = state.client.messages.iter().find(|m| !seen.insert(&m.id)) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("message {} logged twice", duplicate.id),
            });
        }
        Ok(())
    }
}

/// Outside a switch, the server's view of membership matches the client's.
///
/// Only meaningful once the system has settled: frames in flight are
/// delivered before snapshots are taken.
pub struct ServerAgreesOnMembership;

impl Invariant for ServerAgreesOnMembership {
    fn name(&self) -> &'static str {
        "server_agrees_on_membership"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(server) = &state.server_channels else {
            return Ok(());
        };

        if state.client.state == ConnectionState::Connected
            && !state.client.switching
            && server != &state.client.joined
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!("client joined {:?}, server has {server:?}", state.client.joined),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chatlink_client::ChannelId;

    use super::*;

    fn connected() -> SystemSnapshot {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.client.state = ConnectionState::Connected;
        snapshot
    }

    #[test]
    fn active_outside_joined_is_violation() {
        let mut snapshot = connected();
        snapshot.client.active = Some(ChannelId::from("7"));
        assert!(ActiveChannelJoined.check(&snapshot).is_err());

        snapshot.client.joined.insert(ChannelId::from("7"));
        assert!(ActiveChannelJoined.check(&snapshot).is_ok());
    }

    #[test]
    fn membership_while_reconnecting_is_violation() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.client.state = ConnectionState::Reconnecting;
        snapshot.client.joined.insert(ChannelId::from("7"));
        assert!(MembershipRequiresConnection.check(&snapshot).is_err());
    }

    #[test]
    fn disconnected_to_connected_is_violation() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.transitions =
            vec![(ConnectionState::Disconnected, ConnectionState::Connected)];
        assert!(TransitionsFollowTable.check(&snapshot).is_err());
    }

    #[test]
    fn unchained_transitions_are_violation() {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.transitions = vec![
            (ConnectionState::Disconnected, ConnectionState::Connecting),
            (ConnectionState::Connected, ConnectionState::Disconnected),
        ];
        assert!(TransitionsFollowTable.check(&snapshot).is_err());
    }

    #[test]
    fn server_disagreement_is_violation() {
        let mut snapshot = connected();
        snapshot.client.joined.insert(ChannelId::from("7"));
        snapshot.server_channels = Some(BTreeSet::new());
        assert!(ServerAgreesOnMembership.check(&snapshot).is_err());

        snapshot.client.switching = true;
        assert!(ServerAgreesOnMembership.check(&snapshot).is_ok());
    }
}
