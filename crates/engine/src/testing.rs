//! Testing utilities for code that drives an [`Engine`].
//!
//! [`MockEngine`] records every facade call and answers control calls with
//! scripted events, so front ends can be tested without a real evaluation.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::EngineError;
use crate::facade::Engine;
use crate::types::{
    BreakpointTarget, EngineEvent, Position, Span, StopEvent, StopReason, TraceFrame,
};

/// A facade call as observed by [`MockEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Launch {
        source_name: String,
        search_paths: Vec<String>,
    },
    Continue,
    ContinueUntilAfter(Span),
    Step,
    SetBreakpoint {
        file: String,
        line: usize,
        column: Option<usize>,
    },
    ClearBreakpoints(String),
    ActiveBreakpoints,
    BreakpointLocations(String),
    LookupValue(String),
    ListVars,
    StackTrace,
    Terminate,
}

impl Call {
    /// Whether the call changes the evaluation's control state.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Call::Launch { .. }
                | Call::Continue
                | Call::ContinueUntilAfter(_)
                | Call::Step
                | Call::Terminate
        )
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    script: VecDeque<Vec<EngineEvent>>,
    subscribers: Vec<UnboundedSender<EngineEvent>>,
    breakpoints: BTreeSet<BreakpointTarget>,
}

/// A scripted [`Engine`].
///
/// Each control call (`launch`, `continue`, `continue_until_after`, `step`,
/// `terminate`) pops the next batch of scripted events and publishes it to
/// every subscriber before returning. Control calls past the end of the
/// script publish nothing.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
    values: HashMap<String, String>,
    vars: Vec<String>,
    frames: Vec<TraceFrame>,
    locations: Vec<Span>,
    rejected_lines: BTreeSet<usize>,
    launch_error: Option<String>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the events published by the next unscripted control call.
    pub fn then(self, events: Vec<EngineEvent>) -> Self {
        self.lock().script.push_back(events);
        self
    }

    /// A variable that `lookup_value` resolves and `list_vars` lists.
    pub fn with_value(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self.vars.push(name.to_string());
        self
    }

    pub fn with_frames(mut self, frames: Vec<TraceFrame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_locations(mut self, locations: Vec<Span>) -> Self {
        self.locations = locations;
        self
    }

    /// Make `set_breakpoint` fail for `line`.
    pub fn rejecting_line(mut self, line: usize) -> Self {
        self.rejected_lines.insert(line);
        self
    }

    /// Make `launch` fail with an I/O error carrying `message`.
    pub fn failing_launch(mut self, message: &str) -> Self {
        self.launch_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn control_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_control).collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        tracing::trace!(?call, "mock engine call");
        let mut state = self.lock();
        let control = call.is_control();
        state.calls.push(call);
        if control && let Some(events) = state.script.pop_front() {
            for event in events {
                state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
            }
        }
    }
}

impl Engine for MockEngine {
    fn launch(
        &self,
        source_name: &str,
        _source: &str,
        search_paths: &[String],
    ) -> Result<(), EngineError> {
        if let Some(message) = &self.launch_error {
            self.lock().calls.push(Call::Launch {
                source_name: source_name.to_string(),
                search_paths: search_paths.to_vec(),
            });
            return Err(EngineError::Io {
                path: source_name.into(),
                source: std::io::Error::other(message.clone()),
            });
        }
        self.record(Call::Launch {
            source_name: source_name.to_string(),
            search_paths: search_paths.to_vec(),
        });
        Ok(())
    }

    fn r#continue(&self) -> Result<(), EngineError> {
        self.record(Call::Continue);
        Ok(())
    }

    fn continue_until_after(&self, span: &Span) -> Result<(), EngineError> {
        self.record(Call::ContinueUntilAfter(span.clone()));
        Ok(())
    }

    fn step(&self) -> Result<(), EngineError> {
        self.record(Call::Step);
        Ok(())
    }

    fn set_breakpoint(
        &self,
        file: &str,
        line: usize,
        column: Option<usize>,
    ) -> Result<BreakpointTarget, EngineError> {
        self.record(Call::SetBreakpoint {
            file: file.to_string(),
            line,
            column,
        });
        if self.rejected_lines.contains(&line) {
            return Err(EngineError::NoBreakpointTarget {
                file: file.to_string(),
                line,
                column,
            });
        }
        let target = BreakpointTarget {
            file: file.to_string(),
            line,
            column,
        };
        self.lock().breakpoints.insert(target.clone());
        Ok(target)
    }

    fn clear_breakpoints(&self, file: &str) {
        self.record(Call::ClearBreakpoints(file.to_string()));
        self.lock().breakpoints.retain(|target| target.file != file);
    }

    fn active_breakpoints(&self) -> Vec<BreakpointTarget> {
        self.record(Call::ActiveBreakpoints);
        self.lock().breakpoints.iter().cloned().collect()
    }

    fn breakpoint_locations(&self, file: &str) -> Result<Vec<Span>, EngineError> {
        self.record(Call::BreakpointLocations(file.to_string()));
        Ok(self.locations.clone())
    }

    fn lookup_value(&self, name: &str) -> Result<String, EngineError> {
        self.record(Call::LookupValue(name.to_string()));
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownVariable(name.to_string()))
    }

    fn list_vars(&self) -> Vec<String> {
        self.record(Call::ListVars);
        self.vars.clone()
    }

    fn stack_trace(&self) -> Vec<TraceFrame> {
        self.record(Call::StackTrace);
        self.frames.clone()
    }

    fn terminate(&self) {
        self.record(Call::Terminate);
    }

    fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }
}

/// A one-line span starting at `line:column`.
pub fn span(file: &str, line: usize, column: usize) -> Span {
    Span {
        file: file.to_string(),
        begin: Position::new(line, column),
        end: Position::new(line, column + 1),
    }
}

pub fn stop(reason: StopReason, current: Span) -> EngineEvent {
    EngineEvent::Stop(StopEvent {
        reason,
        current,
        breakpoint: None,
        last_evaluation: None,
        error: None,
    })
}

pub fn breakpoint_stop(target: BreakpointTarget, current: Span) -> EngineEvent {
    EngineEvent::Stop(StopEvent {
        reason: StopReason::Breakpoint,
        current,
        breakpoint: Some(target),
        last_evaluation: None,
        error: None,
    })
}

pub fn exception_stop(error: &str, current: Span) -> EngineEvent {
    EngineEvent::Stop(StopEvent {
        reason: StopReason::Exception,
        current,
        breakpoint: None,
        last_evaluation: None,
        error: Some(error.to_string()),
    })
}

pub fn exit(output: &str, error: Option<&str>) -> EngineEvent {
    EngineEvent::Exit {
        output: output.to_string(),
        error: error.map(str::to_string),
    }
}
