//! Chatlink wire protocol
//!
//! Every frame on the connection is a JSON text message wrapped in an
//! [`Envelope`]: `{ id, type, data, timestamp, user_id }`. The `type` tag comes
//! from a closed vocabulary ([`MessageType`]); `data` is interpreted per type
//! through [`Payload`].
//!
//! # Components
//!
//! - [`Envelope`]: Wire wrapper with structural validation on decode
//! - [`MessageType`]: The enumerated message-type vocabulary
//! - [`Payload`]: Typed view of an envelope's `data`
//! - [`ChannelId`], [`UserId`]: Identifiers tolerant of string or integer JSON

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
pub mod errors;
mod ids;
mod message_type;
pub mod payloads;

pub use envelope::Envelope;
pub use errors::{ProtocolError, Result};
pub use ids::{ChannelId, UserId};
pub use message_type::MessageType;
pub use payloads::Payload;
