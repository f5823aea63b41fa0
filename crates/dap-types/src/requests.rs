//! Requests a DAP client sends to the adapter.
//!
//! Every request the adapter recognises decodes into a [`Command`] variant.
//! Commands that are part of the protocol but not implemented decode into
//! [`Command::Unsupported`] so the session can answer them with an error
//! response, and known commands whose arguments do not fit decode into
//! [`Command::Invalid`]. Only an unknown command is a [`DecodeError`].
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{
    Seq, Source, SourceBreakpoint, StackFrameId, ThreadId, VariablesReference,
};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
}

/// A decoded client request.
#[derive(Debug, Clone)]
pub struct Request {
    pub seq: Seq,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    Initialize(InitializeArguments),
    /// Launch arguments are adapter specific, so they stay raw until the
    /// handler interprets them with [`LaunchArguments::from_value`].
    Launch(Value),
    SetBreakpoints(SetBreakpointsArguments),
    SetExceptionBreakpoints(SetExceptionBreakpointsArguments),
    Continue(ContinueArguments),
    Next(NextArguments),
    StepIn(StepInArguments),
    StackTrace(StackTraceArguments),
    Scopes(ScopesArguments),
    Variables(VariablesArguments),
    Evaluate(EvaluateArguments),
    Threads,
    Terminate(TerminateArguments),
    BreakpointLocations(BreakpointLocationsArguments),
    Disconnect(DisconnectArguments),
    Unsupported(UnsupportedCommand),
    /// A known command whose arguments did not deserialize.
    Invalid {
        command: &'static str,
        error: String,
    },
}

impl Command {
    /// The wire name of the command, echoed back in its response.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize(_) => "initialize",
            Command::Launch(_) => "launch",
            Command::SetBreakpoints(_) => "setBreakpoints",
            Command::SetExceptionBreakpoints(_) => "setExceptionBreakpoints",
            Command::Continue(_) => "continue",
            Command::Next(_) => "next",
            Command::StepIn(_) => "stepIn",
            Command::StackTrace(_) => "stackTrace",
            Command::Scopes(_) => "scopes",
            Command::Variables(_) => "variables",
            Command::Evaluate(_) => "evaluate",
            Command::Threads => "threads",
            Command::Terminate(_) => "terminate",
            Command::BreakpointLocations(_) => "breakpointLocations",
            Command::Disconnect(_) => "disconnect",
            Command::Unsupported(command) => command.as_str(),
            Command::Invalid { command, .. } => *command,
        }
    }
}

fn arguments<T: DeserializeOwned>(
    command: &'static str,
    raw: Option<Value>,
    wrap: impl FnOnce(T) -> Command,
) -> Command {
    let value = raw.unwrap_or_else(|| Value::Object(Default::default()));
    match serde_json::from_value(value) {
        Ok(arguments) => wrap(arguments),
        Err(e) => Command::Invalid {
            command,
            error: e.to_string(),
        },
    }
}

impl TryFrom<transport::Request> for Request {
    type Error = DecodeError;

    fn try_from(raw: transport::Request) -> Result<Self, Self::Error> {
        let args = raw.arguments;
        let command = match raw.command.as_str() {
            "initialize" => arguments("initialize", args, Command::Initialize),
            "launch" => Command::Launch(args.unwrap_or(Value::Null)),
            "setBreakpoints" => arguments("setBreakpoints", args, Command::SetBreakpoints),
            "setExceptionBreakpoints" => {
                arguments("setExceptionBreakpoints", args, Command::SetExceptionBreakpoints)
            }
            "continue" => arguments("continue", args, Command::Continue),
            "next" => arguments("next", args, Command::Next),
            "stepIn" => arguments("stepIn", args, Command::StepIn),
            "stackTrace" => arguments("stackTrace", args, Command::StackTrace),
            "scopes" => arguments("scopes", args, Command::Scopes),
            "variables" => arguments("variables", args, Command::Variables),
            "evaluate" => arguments("evaluate", args, Command::Evaluate),
            "threads" => Command::Threads,
            "terminate" => arguments("terminate", args, Command::Terminate),
            "breakpointLocations" => {
                arguments("breakpointLocations", args, Command::BreakpointLocations)
            }
            "disconnect" => arguments("disconnect", args, Command::Disconnect),
            other => match other.parse::<UnsupportedCommand>() {
                Ok(command) => Command::Unsupported(command),
                Err(_) => return Err(DecodeError::UnknownCommand(other.to_string())),
            },
        };

        Ok(Request {
            seq: raw.seq,
            command,
        })
    }
}

/// Protocol commands the adapter acknowledges but does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedCommand {
    Attach,
    Restart,
    SetFunctionBreakpoints,
    ConfigurationDone,
    StepOut,
    StepBack,
    ReverseContinue,
    RestartFrame,
    Goto,
    Pause,
    SetVariable,
    SetExpression,
    Source,
    TerminateThreads,
    StepInTargets,
    GotoTargets,
    Completions,
    ExceptionInfo,
    LoadedSources,
    DataBreakpointInfo,
    SetDataBreakpoints,
    ReadMemory,
    WriteMemory,
    Disassemble,
    Cancel,
    Modules,
    SetInstructionBreakpoints,
}

impl UnsupportedCommand {
    pub const ALL: [UnsupportedCommand; 27] = [
        UnsupportedCommand::Attach,
        UnsupportedCommand::Restart,
        UnsupportedCommand::SetFunctionBreakpoints,
        UnsupportedCommand::ConfigurationDone,
        UnsupportedCommand::StepOut,
        UnsupportedCommand::StepBack,
        UnsupportedCommand::ReverseContinue,
        UnsupportedCommand::RestartFrame,
        UnsupportedCommand::Goto,
        UnsupportedCommand::Pause,
        UnsupportedCommand::SetVariable,
        UnsupportedCommand::SetExpression,
        UnsupportedCommand::Source,
        UnsupportedCommand::TerminateThreads,
        UnsupportedCommand::StepInTargets,
        UnsupportedCommand::GotoTargets,
        UnsupportedCommand::Completions,
        UnsupportedCommand::ExceptionInfo,
        UnsupportedCommand::LoadedSources,
        UnsupportedCommand::DataBreakpointInfo,
        UnsupportedCommand::SetDataBreakpoints,
        UnsupportedCommand::ReadMemory,
        UnsupportedCommand::WriteMemory,
        UnsupportedCommand::Disassemble,
        UnsupportedCommand::Cancel,
        UnsupportedCommand::Modules,
        UnsupportedCommand::SetInstructionBreakpoints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnsupportedCommand::Attach => "attach",
            UnsupportedCommand::Restart => "restart",
            UnsupportedCommand::SetFunctionBreakpoints => "setFunctionBreakpoints",
            UnsupportedCommand::ConfigurationDone => "configurationDone",
            UnsupportedCommand::StepOut => "stepOut",
            UnsupportedCommand::StepBack => "stepBack",
            UnsupportedCommand::ReverseContinue => "reverseContinue",
            UnsupportedCommand::RestartFrame => "restartFrame",
            UnsupportedCommand::Goto => "goto",
            UnsupportedCommand::Pause => "pause",
            UnsupportedCommand::SetVariable => "setVariable",
            UnsupportedCommand::SetExpression => "setExpression",
            UnsupportedCommand::Source => "source",
            UnsupportedCommand::TerminateThreads => "terminateThreads",
            UnsupportedCommand::StepInTargets => "stepInTargets",
            UnsupportedCommand::GotoTargets => "gotoTargets",
            UnsupportedCommand::Completions => "completions",
            UnsupportedCommand::ExceptionInfo => "exceptionInfo",
            UnsupportedCommand::LoadedSources => "loadedSources",
            UnsupportedCommand::DataBreakpointInfo => "dataBreakpointInfo",
            UnsupportedCommand::SetDataBreakpoints => "setDataBreakpoints",
            UnsupportedCommand::ReadMemory => "readMemory",
            UnsupportedCommand::WriteMemory => "writeMemory",
            UnsupportedCommand::Disassemble => "disassemble",
            UnsupportedCommand::Cancel => "cancel",
            UnsupportedCommand::Modules => "modules",
            UnsupportedCommand::SetInstructionBreakpoints => "setInstructionBreakpoints",
        }
    }
}

/// Renders as the protocol's request type name, e.g. `SetExpressionRequest`.
impl fmt::Display for UnsupportedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.as_str();
        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            write!(f, "{}", first.to_ascii_uppercase())?;
        }
        write!(f, "{}Request", chars.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotUnsupported;

impl FromStr for UnsupportedCommand {
    type Err = NotUnsupported;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnsupportedCommand::ALL
            .iter()
            .copied()
            .find(|command| command.as_str() == s)
            .ok_or(NotUnsupported)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
    #[serde(rename = "clientID")]
    pub client_id: Option<String>,
    #[serde(rename = "adapterID")]
    pub adapter_id: Option<String>,
    #[serde(rename = "linesStartAt1")]
    pub lines_start_at_one: Option<bool>,
    #[serde(rename = "columnsStartAt1")]
    pub columns_start_at_one: Option<bool>,
}

/// Arguments the `launch` request accepts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArguments {
    pub program: PathBuf,
    #[serde(default)]
    pub jpaths: Vec<String>,
}

impl LaunchArguments {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    pub source: Source,
    #[serde(default)]
    pub breakpoints: Option<Vec<SourceBreakpoint>>,
    /// Deprecated form of `breakpoints` that only carries line numbers.
    #[serde(default)]
    pub lines: Option<Vec<usize>>,
}

impl SetBreakpointsArguments {
    /// The requested breakpoints, falling back to the deprecated `lines` form.
    pub fn requested(&self) -> Vec<SourceBreakpoint> {
        match (&self.breakpoints, &self.lines) {
            (Some(breakpoints), _) => breakpoints.clone(),
            (None, Some(lines)) => lines
                .iter()
                .map(|&line| SourceBreakpoint {
                    line,
                    ..Default::default()
                })
                .collect(),
            (None, None) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetExceptionBreakpointsArguments {
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueArguments {
    #[serde(default)]
    pub thread_id: ThreadId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextArguments {
    #[serde(default)]
    pub thread_id: ThreadId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInArguments {
    #[serde(default)]
    pub thread_id: ThreadId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    #[serde(default)]
    pub thread_id: ThreadId,
    pub start_frame: Option<usize>,
    pub levels: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    #[serde(default)]
    pub frame_id: StackFrameId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    #[serde(default)]
    pub variables_reference: VariablesReference,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    pub expression: String,
    pub frame_id: Option<StackFrameId>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateArguments {
    pub restart: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointLocationsArguments {
    pub source: Source,
    pub line: usize,
    pub column: Option<usize>,
    pub end_line: Option<usize>,
    pub end_column: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArguments {
    pub restart: Option<bool>,
    pub terminate_debuggee: Option<bool>,
}
