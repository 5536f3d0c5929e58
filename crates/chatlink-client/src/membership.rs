//! Channel membership coordinator.
//!
//! Tracks which channels the client has joined and which one is active, and
//! serializes channel switches so the server never sees a join for the next
//! channel before the leave of the previous one has been acknowledged.
//!
//! # Switch handshake
//!
//! ```text
//! switch(B) with active A:
//!   Leave(A) ──> [in flight: leaving A, target B] ──ack(A)/timeout──> Join(B)
//!
//! switch(C) while in flight  -> target replaced, still one Leave/Join pair
//! switch(X) < debounce after the last executed switch -> queued, retried
//! ```
//!
//! Pure bookkeeping: methods return [`MembershipCommand`]s and the client turns
//! them into envelopes.

use std::{collections::BTreeSet, ops::Sub, time::Duration};

use chatlink_core::timer::Timer;
use chatlink_proto::ChannelId;
use tracing::{debug, warn};

/// Minimum spacing between executed switches.
pub const DEFAULT_SWITCH_DEBOUNCE: Duration = Duration::from_millis(100);

/// Delay before a debounced switch is retried.
pub const DEFAULT_SWITCH_RETRY: Duration = Duration::from_millis(150);

/// Time to wait for a leave acknowledgment before joining anyway.
pub const DEFAULT_LEAVE_ACK_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Membership configuration
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// Minimum spacing between executed switches
    pub switch_debounce: Duration,
    /// Delay before a debounced switch is retried
    pub switch_retry: Duration,
    /// Time to wait for a leave acknowledgment
    pub leave_ack_timeout: Duration,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            switch_debounce: DEFAULT_SWITCH_DEBOUNCE,
            switch_retry: DEFAULT_SWITCH_RETRY,
            leave_ack_timeout: DEFAULT_LEAVE_ACK_TIMEOUT,
        }
    }
}

/// Commands for the client to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipCommand {
    /// Send `channel.join`
    Join(ChannelId),
    /// Send `channel.leave`
    Leave(ChannelId),
}

/// A switch waiting for its leave acknowledgment.
#[derive(Debug, Clone)]
struct InFlight<I> {
    leaving: ChannelId,
    target: Option<ChannelId>,
    ack: Timer<I>,
}

/// Channel membership state machine.
///
/// # Invariants
///
/// - The active channel, if any, is in the joined set.
/// - At most one switch is in flight.
/// - A channel being left by an in-flight switch is not in the joined set.
#[derive(Debug, Clone)]
pub struct Membership<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    config: MembershipConfig,
    connected: bool,
    joined: BTreeSet<ChannelId>,
    active: Option<ChannelId>,
    /// When the last switch was executed
    last_switch: Option<I>,
    /// Debounced target; `Some(None)` clears the active channel
    pending: Option<Option<ChannelId>>,
    retry: Option<Timer<I>>,
    in_flight: Option<InFlight<I>>,
    /// Channel to join once the connection is (re)established
    resume: Option<ChannelId>,
}

impl<I> Membership<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty, disconnected membership.
    pub fn new(config: MembershipConfig) -> Self {
        Self {
            config,
            connected: false,
            joined: BTreeSet::new(),
            active: None,
            last_switch: None,
            pending: None,
            retry: None,
            in_flight: None,
            resume: None,
        }
    }

    /// Joined channels.
    pub fn joined(&self) -> &BTreeSet<ChannelId> {
        &self.joined
    }

    /// Whether `channel_id` is joined.
    pub fn is_joined(&self, channel_id: &ChannelId) -> bool {
        self.joined.contains(channel_id)
    }

    /// Active channel.
    pub fn active(&self) -> Option<&ChannelId> {
        self.active.as_ref()
    }

    /// Whether a switch is waiting for its leave acknowledgment.
    pub fn is_switching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Channel the in-flight switch is leaving.
    pub fn leaving(&self) -> Option<&ChannelId> {
        self.in_flight.as_ref().map(|f| &f.leaving)
    }

    /// Debounced switch target, if one is queued.
    pub fn pending_target(&self) -> Option<Option<&ChannelId>> {
        self.pending.as_ref().map(Option::as_ref)
    }

    /// Channel membership will settle on: the in-flight or queued switch
    /// target, else the active channel. While disconnected, the resume
    /// target.
    pub fn intended(&self) -> Option<&ChannelId> {
        if !self.connected {
            return self.resume.as_ref();
        }
        if let Some(in_flight) = &self.in_flight {
            return in_flight.target.as_ref();
        }
        match &self.pending {
            Some(pending) => pending.as_ref(),
            None => self.active.as_ref(),
        }
    }

    /// Channel joined automatically on the next connect.
    pub fn resume_target(&self) -> Option<&ChannelId> {
        self.resume.as_ref()
    }

    /// Join a channel and make it active.
    ///
    /// No-op while disconnected or if already joined. While a switch is in
    /// flight the join retargets the switch instead of racing it.
    pub fn join(&mut self, channel_id: ChannelId) -> Vec<MembershipCommand> {
        if !self.connected {
            debug!(%channel_id, "join ignored while disconnected");
            return Vec::new();
        }

        if let Some(in_flight) = &mut self.in_flight {
            debug!(%channel_id, leaving = %in_flight.leaving, "join retargets in-flight switch");
            in_flight.target = Some(channel_id);
            return Vec::new();
        }

        if self.joined.contains(&channel_id) {
            return Vec::new();
        }

        self.joined.insert(channel_id.clone());
        self.active = Some(channel_id.clone());
        vec![MembershipCommand::Join(channel_id)]
    }

    /// Leave a joined channel.
    ///
    /// No-op while disconnected or if not joined.
    pub fn leave(&mut self, channel_id: &ChannelId) -> Vec<MembershipCommand> {
        if !self.connected || !self.joined.remove(channel_id) {
            return Vec::new();
        }

        if self.active.as_ref() == Some(channel_id) {
            self.active = None;
        }

        vec![MembershipCommand::Leave(channel_id.clone())]
    }

    /// Switch the active channel (`None` clears it).
    ///
    /// Leaves the current active channel and joins the target once the leave
    /// is acknowledged. While disconnected the target is remembered and joined
    /// on the next connect.
    pub fn switch_channel(&mut self, target: Option<ChannelId>, now: I) -> Vec<MembershipCommand> {
        if !self.connected {
            debug!(?target, "switch deferred until connected");
            self.resume = target;
            return Vec::new();
        }

        if let Some(in_flight) = &mut self.in_flight {
            debug!(?target, leaving = %in_flight.leaving, "switch retargeted");
            in_flight.target = target;
            return Vec::new();
        }

        if let Some(last) = self.last_switch
            && now - last < self.config.switch_debounce
        {
            debug!(?target, "switch debounced");
            self.pending = Some(target);
            if self.retry.is_none() {
                self.retry = Some(Timer::new(now, self.config.switch_retry));
            }
            return Vec::new();
        }

        self.execute_switch(target, now)
    }

    /// Leave acknowledgment observed for `channel_id`.
    ///
    /// Completes the in-flight switch if it was leaving that channel.
    pub fn on_leave_ack(&mut self, channel_id: &ChannelId) -> Vec<MembershipCommand> {
        match self.in_flight.take() {
            Some(in_flight) if &in_flight.leaving == channel_id => {
                debug!(%channel_id, target = ?in_flight.target, "leave acknowledged");
                self.complete_switch(in_flight.target)
            },
            other => {
                self.in_flight = other;
                Vec::new()
            },
        }
    }

    /// Process periodic maintenance (ack timeout, debounced retry).
    pub fn tick(&mut self, now: I) -> Vec<MembershipCommand> {
        let mut commands = Vec::new();

        if let Some(in_flight) = &self.in_flight
            && in_flight.ack.is_due(now)
        {
            warn!(leaving = %in_flight.leaving, "leave acknowledgment timed out");
            if let Some(in_flight) = self.in_flight.take() {
                commands.extend(self.complete_switch(in_flight.target));
            }
        }

        if let Some(retry) = self.retry
            && retry.is_due(now)
        {
            self.retry = None;
            if let Some(target) = self.pending.take() {
                commands.extend(self.switch_channel(target, now));
            }
        }

        commands
    }

    /// Leave every joined channel.
    pub fn leave_all(&mut self) -> Vec<MembershipCommand> {
        if !self.connected {
            return Vec::new();
        }

        self.active = None;
        self.in_flight = None;
        self.pending = None;
        self.retry = None;
        std::mem::take(&mut self.joined).into_iter().map(MembershipCommand::Leave).collect()
    }

    /// Connection established. Joins the resume target, if any.
    pub fn on_connected(&mut self) -> Vec<MembershipCommand> {
        self.connected = true;
        match self.resume.take() {
            Some(channel_id) => self.join(channel_id),
            None => Vec::new(),
        }
    }

    /// Connection lost. The server drops membership with the socket, so local
    /// membership is cleared. The newest switch target, or else the current
    /// channel, becomes the resume target. A queued clear resumes nothing.
    pub fn on_connection_lost(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            self.resume = in_flight.target;
        } else if let Some(target) = self.pending.take() {
            self.resume = target;
        } else if let Some(active) = self.active.take() {
            self.resume = Some(active);
        }

        self.connected = false;
        self.joined.clear();
        self.active = None;
        self.pending = None;
        self.retry = None;
        self.last_switch = None;
    }

    /// Drop all state, including the resume target.
    pub fn reset(&mut self) {
        self.on_connection_lost();
        self.resume = None;
    }

    fn execute_switch(&mut self, target: Option<ChannelId>, now: I) -> Vec<MembershipCommand> {
        self.pending = None;
        self.retry = None;

        if target == self.active {
            return Vec::new();
        }

        self.last_switch = Some(now);

        match self.active.take() {
            Some(previous) => {
                self.joined.remove(&previous);
                self.in_flight = Some(InFlight {
                    leaving: previous.clone(),
                    target,
                    ack: Timer::new(now, self.config.leave_ack_timeout),
                });
                vec![MembershipCommand::Leave(previous)]
            },
            None => self.complete_switch(target),
        }
    }

    fn complete_switch(&mut self, target: Option<ChannelId>) -> Vec<MembershipCommand> {
        match target {
            Some(channel_id) if self.joined.contains(&channel_id) => {
                self.active = Some(channel_id);
                Vec::new()
            },
            Some(channel_id) => self.join(channel_id),
            None => {
                self.active = None;
                Vec::new()
            },
        }
    }
}
