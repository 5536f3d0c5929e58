//! Application runtime for chatlink
//!
//! Drives the sans-IO [`chatlink_client::Client`] over a real or simulated
//! transport, enabling deterministic simulation testing with the same code
//! that runs in production.
//!
//! # Components
//!
//! - [`Driver`]: Trait for platform-specific transport I/O
//! - [`Runtime`]: Generic orchestration loop using Driver
//! - [`Session`] / [`SessionHandle`]: The single owned client instance and the
//!   cloneable handle UI code talks to
//! - [`SystemEnv`]: Production environment (system clock, OS randomness)
//! - `WebSocketDriver`: Production driver (feature `websocket`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod error;
mod runtime;
mod session;
mod system_env;

#[cfg(feature = "websocket")]
mod websocket;

pub use driver::{Driver, TransportEvent};
pub use error::RuntimeError;
pub use runtime::{
    DEFAULT_COMMAND_CAPACITY, DEFAULT_NOTIFICATION_CAPACITY, DEFAULT_TICK_INTERVAL, Runtime,
    RuntimeConfig,
};
pub use session::{Session, SessionHandle, SessionSnapshot};
pub use system_env::SystemEnv;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketDriver;
