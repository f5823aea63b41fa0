use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::EngineError;
use crate::types::{BreakpointTarget, EngineEvent, Span, TraceFrame};

/// Control and inspection surface of an evaluation engine.
///
/// One instance backs one debugging session. Every method takes `&self` and
/// implementations must be safe to call from several threads at once: the
/// protocol adapter forwards concurrent client requests without serialising
/// them. When control calls race (two `continue`s in flight) the outcome is
/// up to the implementation, but it must not corrupt engine state.
///
/// Control calls (`launch`, `continue`, `continue_until_after`, `step`,
/// `terminate`) only start work. Their results arrive later as
/// [`EngineEvent`]s on every receiver handed out by [`Engine::subscribe`].
pub trait Engine: Send + Sync + 'static {
    /// Start evaluating `source`, stopping at the first breakpoint hit.
    /// Launching again ends any previous run first.
    fn launch(
        &self,
        source_name: &str,
        source: &str,
        search_paths: &[String],
    ) -> Result<(), EngineError>;

    fn r#continue(&self) -> Result<(), EngineError>;

    /// Resume until evaluation reaches a node that starts after `span` ends.
    fn continue_until_after(&self, span: &Span) -> Result<(), EngineError>;

    fn step(&self) -> Result<(), EngineError>;

    /// Resolve and activate a breakpoint. Setting the same location twice
    /// yields the same target.
    fn set_breakpoint(
        &self,
        file: &str,
        line: usize,
        column: Option<usize>,
    ) -> Result<BreakpointTarget, EngineError>;

    /// Remove every breakpoint in `file`. A file without breakpoints is fine.
    fn clear_breakpoints(&self, file: &str);

    fn active_breakpoints(&self) -> Vec<BreakpointTarget>;

    /// Every location in `file` a breakpoint could resolve to.
    fn breakpoint_locations(&self, file: &str) -> Result<Vec<Span>, EngineError>;

    fn lookup_value(&self, name: &str) -> Result<String, EngineError>;

    fn list_vars(&self) -> Vec<String>;

    /// Frames of the current evaluation stack, innermost last.
    fn stack_trace(&self) -> Vec<TraceFrame>;

    fn terminate(&self);

    /// A new receiver for every event published from now on.
    fn subscribe(&self) -> UnboundedReceiver<EngineEvent>;
}

impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn launch(
        &self,
        source_name: &str,
        source: &str,
        search_paths: &[String],
    ) -> Result<(), EngineError> {
        (**self).launch(source_name, source, search_paths)
    }

    fn r#continue(&self) -> Result<(), EngineError> {
        (**self).r#continue()
    }

    fn continue_until_after(&self, span: &Span) -> Result<(), EngineError> {
        (**self).continue_until_after(span)
    }

    fn step(&self) -> Result<(), EngineError> {
        (**self).step()
    }

    fn set_breakpoint(
        &self,
        file: &str,
        line: usize,
        column: Option<usize>,
    ) -> Result<BreakpointTarget, EngineError> {
        (**self).set_breakpoint(file, line, column)
    }

    fn clear_breakpoints(&self, file: &str) {
        (**self).clear_breakpoints(file)
    }

    fn active_breakpoints(&self) -> Vec<BreakpointTarget> {
        (**self).active_breakpoints()
    }

    fn breakpoint_locations(&self, file: &str) -> Result<Vec<Span>, EngineError> {
        (**self).breakpoint_locations(file)
    }

    fn lookup_value(&self, name: &str) -> Result<String, EngineError> {
        (**self).lookup_value(name)
    }

    fn list_vars(&self) -> Vec<String> {
        (**self).list_vars()
    }

    fn stack_trace(&self) -> Vec<TraceFrame> {
        (**self).stack_trace()
    }

    fn terminate(&self) {
        (**self).terminate()
    }

    fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        (**self).subscribe()
    }
}
