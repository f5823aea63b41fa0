//! Building blocks for tests that play the client side of a session.

mod memory;

pub use memory::MemoryTransport;

use serde::Serialize;

/// The wire bytes for one message, as a client would send them.
///
/// ```
/// let bytes = transport::testing::frame_message(&serde_json::json!({
///     "seq": 1,
///     "type": "request",
///     "command": "initialize",
/// }));
/// assert!(bytes.ends_with(b"}"));
/// ```
///
/// # Panics
///
/// If `message` cannot be serialized to JSON.
pub fn frame_message(message: &impl Serialize) -> Vec<u8> {
    let body = serde_json::to_vec(message).expect("test message serializes to JSON");
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend(body);
    frame
}

/// Several messages back to back in one buffer, the way a pipelining
/// client writes them.
pub fn frame_messages<T: Serialize>(messages: &[T]) -> Vec<u8> {
    messages.iter().flat_map(frame_message).collect()
}
