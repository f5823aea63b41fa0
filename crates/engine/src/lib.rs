//! The evaluation engine seen from the debugging front ends.
//!
//! [`Engine`] is the facade every front end drives: control operations
//! (launch, continue, step, breakpoints), inspection queries, and an event
//! channel that reports stops and exits. [`LineEngine`] is a small
//! line-oriented implementation used by the binary and the end-to-end tests.
mod error;
mod facade;
mod line;
mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::EngineError;
pub use facade::Engine;
pub use line::LineEngine;
pub use types::{
    BreakpointTarget, EngineEvent, Position, Span, StopEvent, StopReason, TraceFrame,
};
