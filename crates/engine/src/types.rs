use std::fmt;

/// A 1-based position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// The source range of an evaluation node. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: String,
    pub begin: Position,
    pub end: Position,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.begin.line, self.begin.column)
    }
}

/// A location the engine accepted as a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BreakpointTarget {
    pub file: String,
    pub line: usize,
    /// `None` matches any column on the line.
    pub column: Option<usize>,
}

impl fmt::Display for BreakpointTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)?;
        if let Some(column) = self.column {
            write!(f, ":{column}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint,
    Step,
    Exception,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopEvent {
    pub reason: StopReason,
    /// The node evaluation is suspended at.
    pub current: Span,
    /// The breakpoint that caused the stop, for [`StopReason::Breakpoint`].
    pub breakpoint: Option<BreakpointTarget>,
    pub last_evaluation: Option<String>,
    /// Formatted evaluation error, for [`StopReason::Exception`].
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Stop(StopEvent),
    /// The run ended, successfully or not.
    Exit {
        output: String,
        error: Option<String>,
    },
}

/// One frame of the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub name: String,
    pub span: Option<Span>,
}
