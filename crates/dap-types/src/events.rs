//! Event bodies the adapter emits.
use serde::{Deserialize, Serialize};

use crate::types::ThreadId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoppedReason {
    Breakpoint,
    Step,
    Exception,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    pub reason: StoppedReason,
    pub thread_id: ThreadId,
    pub all_threads_stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCategory {
    Console,
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    pub category: OutputCategory,
    pub output: String,
}

/// Events the adapter can emit, tagged with their wire names.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Initialized,
    Stopped(StoppedEventBody),
    Output(OutputEventBody),
    Terminated,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Initialized => "initialized",
            Event::Stopped(_) => "stopped",
            Event::Output(_) => "output",
            Event::Terminated => "terminated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_body_shape() {
        let body = StoppedEventBody {
            reason: StoppedReason::Exception,
            thread_id: 1,
            all_threads_stopped: true,
            text: Some("boom".to_string()),
        };

        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["reason"], "exception");
        assert_eq!(value["threadId"], 1);
        assert_eq!(value["allThreadsStopped"], true);
        assert_eq!(value["text"], "boom");
    }
}
