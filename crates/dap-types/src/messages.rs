//! Builders for outgoing responses and events.
//!
//! All builders leave `seq` at zero; the adapter's output writer stamps the
//! real sequence number when the message is written.
use serde::Serialize;
use serde_json::Value;
use transport::OutgoingMessage;

use crate::events::Event;
use crate::requests::Request;
use crate::responses::{ErrorMessage, ErrorResponseBody};

/// Stable classification of failed responses.
///
/// The `message` field of an error response is one of these tags so tooling
/// can match on it, and `body.error.id` carries the numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unsupported,
    InvalidArguments,
    Engine,
    Cancelled,
}

impl ErrorKind {
    pub fn id(&self) -> i64 {
        match self {
            ErrorKind::Unsupported => 12345,
            ErrorKind::InvalidArguments => 12346,
            ErrorKind::Engine => 12347,
            ErrorKind::Cancelled => 12348,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::InvalidArguments => "invalidArguments",
            ErrorKind::Engine => "engineError",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

fn to_body<B: Serialize>(body: &B) -> Option<Value> {
    match serde_json::to_value(body) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize message body");
            None
        }
    }
}

/// A successful response to `request`. Pass `()` for an empty body.
pub fn response<B: Serialize>(request: &Request, body: &B) -> OutgoingMessage {
    OutgoingMessage::Response(transport::Response {
        seq: 0,
        request_seq: request.seq,
        success: true,
        command: request.command.name().to_string(),
        message: None,
        body: to_body(body),
    })
}

/// A failed response to `request`, with `format` as the human readable detail.
pub fn error_response(
    request: &Request,
    kind: ErrorKind,
    format: impl Into<String>,
) -> OutgoingMessage {
    let body = ErrorResponseBody {
        error: ErrorMessage {
            id: kind.id(),
            format: format.into(),
            show_user: true,
        },
    };
    OutgoingMessage::Response(transport::Response {
        seq: 0,
        request_seq: request.seq,
        success: false,
        command: request.command.name().to_string(),
        message: Some(kind.message().to_string()),
        body: to_body(&body),
    })
}

pub fn event(event: &Event) -> OutgoingMessage {
    let body = match event {
        Event::Initialized | Event::Terminated => None,
        Event::Stopped(body) => to_body(body),
        Event::Output(body) => to_body(body),
    };
    OutgoingMessage::Event(transport::Event {
        seq: 0,
        event: event.name().to_string(),
        body,
    })
}
