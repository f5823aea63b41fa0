use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("evaluation is not running")]
    NotRunning,

    #[error("no breakpoint target at {file}:{line}{}", .column.map(|c| format!(":{c}")).unwrap_or_default())]
    NoBreakpointTarget {
        file: String,
        line: usize,
        column: Option<usize>,
    },

    #[error("unknown variable {0:?}")]
    UnknownVariable(String),

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("starting evaluation worker: {0}")]
    Spawn(#[source] std::io::Error),
}
