//! Properties that hold after every settled step of a simulation.
//!
//! A check sees a [`SystemSnapshot`]: the session's published state, every
//! connection state transition reported so far, and the scripted server's
//! view of membership. Scenario tests check a few moments by hand; the
//! property tests check every step of arbitrary operation sequences.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&simulation.snapshot())?;
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    ActiveChannelJoined, MembershipRequiresConnection, ServerAgreesOnMembership,
    TransitionsFollowTable, UniqueMessageIds,
};
pub use snapshot::SystemSnapshot;
use thiserror::Error;

/// Outcome of a single check.
pub type InvariantResult = Result<(), Violation>;

/// A property that did not hold.
#[derive(Debug, Clone, Error)]
#[error("{invariant}: {message}")]
pub struct Violation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// What was observed
    pub message: String,
}

/// A named property over a [`SystemSnapshot`].
pub trait Invariant: Send + Sync {
    /// Stable name, used in violation reports.
    fn name(&self) -> &'static str;

    /// Check the property.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Every violation found by one [`InvariantRegistry::check_all`] pass.
#[derive(Debug, Clone)]
pub struct Report {
    /// Violations in registration order
    pub violations: Vec<Violation>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invariant(s) violated", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  {violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Report {}

/// Ordered set of invariants checked together.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The client invariants every simulation runs:
    /// [`ActiveChannelJoined`], [`MembershipRequiresConnection`],
    /// [`TransitionsFollowTable`], [`UniqueMessageIds`] and
    /// [`ServerAgreesOnMembership`].
    pub fn standard() -> Self {
        Self::new()
            .with(ActiveChannelJoined)
            .with(MembershipRequiresConnection)
            .with(TransitionsFollowTable)
            .with(UniqueMessageIds)
            .with(ServerAgreesOnMembership)
    }

    /// Register another check.
    #[must_use]
    pub fn with<I: Invariant + 'static>(mut self, invariant: I) -> Self {
        self.checks.push(Box::new(invariant));
        self
    }

    /// Names of the registered checks, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    /// Run every check. Does not stop at the first violation.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Report> {
        let violations: Vec<_> =
            self.checks.iter().filter_map(|check| check.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(Report { violations }) }
    }

    /// Run every check and panic with the full report on failure.
    ///
    /// `context` names the step being checked.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(report) = self.check_all(state) {
            panic!("{context}: {report}\n{state:#?}");
        }
    }
}
