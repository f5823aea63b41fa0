use std::num::ParseIntError;

/// A parsed REPL command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `b` / `break`, optionally with a `file:line[:col]` location.
    Break(Option<String>),
    /// `n` / `next`
    Next,
    /// `s`
    Step,
    /// `l`
    List,
    /// `lb` / `lbs`
    ListBreakpointLocations,
    /// `p [name]`, defaulting to `self`.
    Print(String),
    Trace,
    Last,
    Vars,
    /// `clear <file>`
    Clear(Option<String>),
    /// `c`
    Continue,
    /// `q`
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split_whitespace();
        let Some(name) = parts.next() else {
            return Command::Empty;
        };
        let argument = parts.next().map(str::to_string);

        match name {
            "b" | "break" => Command::Break(argument),
            "n" | "next" => Command::Next,
            "s" => Command::Step,
            "l" => Command::List,
            "lb" | "lbs" => Command::ListBreakpointLocations,
            "p" => Command::Print(argument.unwrap_or_else(|| "self".to_string())),
            "trace" => Command::Trace,
            "last" => Command::Last,
            "vars" => Command::Vars,
            "clear" => Command::Clear(argument),
            "c" => Command::Continue,
            "q" => Command::Quit,
            _ => Command::Unknown(input.trim().to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("Must specify file and line separated by `:`")]
    MissingLine,

    #[error("Invalid line number: {0}")]
    Line(#[source] ParseIntError),

    #[error("Invalid column number: {0}")]
    Column(#[source] ParseIntError),
}

/// A `file:line[:col]` breakpoint location typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointSpec {
    pub file: String,
    pub line: usize,
    pub column: Option<usize>,
}

impl std::str::FromStr for BreakpointSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let file = parts.next().unwrap_or_default();
        let line = parts.next().ok_or(SpecError::MissingLine)?;
        let line = line.parse().map_err(SpecError::Line)?;
        let column = parts
            .next()
            .map(|column| column.parse().map_err(SpecError::Column))
            .transpose()?;

        Ok(BreakpointSpec {
            file: file.to_string(),
            line,
            column,
        })
    }
}
