//! Deterministic simulation harness for chatlink client testing.
//!
//! Paused-clock implementations of the Environment and Driver traits for
//! deterministic, reproducible testing of the full client runtime against a
//! scripted server.
//!
//! # Scenarios
//!
//! The `scenario` module runs a real session over [`SimDriver`] and exposes
//! the scripted [`SimServer`] so tests can drop connections, refuse opens or
//! withhold acknowledgments.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! client invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    ActiveChannelJoined, Invariant, InvariantRegistry, InvariantResult,
    MembershipRequiresConnection, Report, ServerAgreesOnMembership, SystemSnapshot,
    TransitionsFollowTable, UniqueMessageIds, Violation,
};
pub use scenario::{SETTLE_TIME, Simulation};
pub use sim_driver::SimDriver;
pub use sim_env::{SIM_EPOCH_MS, SimEnv};
pub use sim_server::{ServerBehavior, SimServer};
