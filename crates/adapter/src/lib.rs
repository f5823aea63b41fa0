//! Debug Adapter Protocol server for jsonnice.
//!
//! A [`Session`] bridges one client connection to one [`engine::Engine`]:
//!
//! - the read loop decodes requests and spawns one handler task per request
//! - handlers call into the engine on the blocking pool and queue exactly
//!   one response each
//! - the event multiplexer turns engine events into protocol events
//! - a single output writer task stamps sequence numbers and writes every
//!   response and event in the order they were queued
mod dispatch;
mod error;
mod events;
mod server;
mod session;
mod writer;

pub use error::SessionError;
pub use server::{serve_stdio, serve_tcp};
pub use session::Session;
pub use writer::OutputWriter;
