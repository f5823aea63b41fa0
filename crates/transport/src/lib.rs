//! Wire layer of the jsonnice debug adapter.
//!
//! Messages travel as `Content-Length` framed JSON. This crate only knows
//! about envelopes; it decodes whatever the client sends into a [`Message`]
//! and encodes the adapter's [`OutgoingMessage`]s. Request typing, sequence
//! numbering and dispatch happen in the crates above it.

mod codec;
mod error;
mod message;
mod reader;
mod transport;
mod writer;

pub mod testing;

pub use codec::DapCodec;
pub use error::CodecError;
pub use message::{Event, Message, OutgoingMessage, Request, Response, Seq};
pub use reader::DapReader;
pub use transport::{DapTransport, StdioTransport, split};
pub use writer::DapWriter;
