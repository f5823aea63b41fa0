//! Typed view of the Debug Adapter Protocol messages the adapter handles.
//!
//! [`requests`] turns raw [`transport::Request`] envelopes into a closed
//! [`requests::Command`] sum type. [`responses`] and [`events`] hold the
//! bodies the adapter writes back, and [`messages`] builds the outgoing
//! envelopes for them.
pub mod events;
pub mod messages;
pub mod requests;
pub mod responses;
pub mod types;

pub use messages::{ErrorKind, error_response, event, response};
pub use requests::{Command, DecodeError, Request, UnsupportedCommand};
