//! Line-oriented debugger front end.
//!
//! [`ReplDebugger`] drives an [`engine::Engine`] from typed commands. It
//! alternates strictly between reading commands while evaluation is
//! suspended and blocking on the next engine event after any command that
//! resumes it:
//!
//! ```ignore
//! let mut repl = ReplDebugger::new(
//!     LineEngine::new(),
//!     "main.jsonnet",
//!     source,
//!     search_paths,
//!     StdinLines::new(),
//!     std::io::stdout(),
//! );
//! repl.run()?;
//! ```
mod command;
mod context;
mod debugger;
mod input;

pub use command::{BreakpointSpec, Command, SpecError};
pub use debugger::{ReplDebugger, ShouldQuit, State};
pub use input::{LineSource, StdinLines};
