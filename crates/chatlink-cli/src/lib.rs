//! Terminal client for chatlink.
//!
//! A line-oriented front end over [`chatlink_app::SessionHandle`]: input lines
//! are parsed into [`command::Command`]s, executed by a [`repl::Repl`], and
//! session notifications are rendered as they arrive.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod render;
pub mod repl;

pub use command::{Command, CommandError};
pub use repl::{Flow, Repl};
