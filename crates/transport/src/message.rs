//! Protocol envelopes.
//!
//! Bodies and arguments stay as raw JSON at this layer; `dap_types` gives
//! them meaning. [`Response`] and [`Event`] are shared by both directions so
//! a test client can decode exactly what the adapter encodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message sequence number. Requests are correlated to responses by it.
pub type Seq = i64;

/// Anything that can arrive on the adapter's inbound stream.
///
/// A well-behaved client only sends requests, but responses and events still
/// decode so the session can name the protocol violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Request(Request),
    Response(Response),
    Event(Event),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub seq: Seq,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub seq: Seq,
    pub request_seq: Seq,
    pub success: bool,
    pub command: String,
    /// Short error tag, present when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub seq: Seq,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// What the adapter writes: a response or an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingMessage {
    Response(Response),
    Event(Event),
}

impl OutgoingMessage {
    /// Replace the sequence number. Builders leave it at zero until the
    /// message is about to be written.
    pub fn with_seq(mut self, seq: Seq) -> Self {
        match &mut self {
            OutgoingMessage::Response(r) => r.seq = seq,
            OutgoingMessage::Event(e) => e.seq = seq,
        }
        self
    }

    pub fn seq(&self) -> Seq {
        match self {
            OutgoingMessage::Response(r) => r.seq,
            OutgoingMessage::Event(e) => e.seq,
        }
    }
}

impl From<OutgoingMessage> for Message {
    fn from(message: OutgoingMessage) -> Self {
        match message {
            OutgoingMessage::Response(r) => Message::Response(r),
            OutgoingMessage::Event(e) => Message::Event(e),
        }
    }
}
