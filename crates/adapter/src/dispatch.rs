//! Request handlers.
//!
//! [`dispatch`] runs on its own task per request and always queues exactly
//! one response, turning every handler failure into an error response.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use dap_types::events::Event;
use dap_types::requests::{
    BreakpointLocationsArguments, LaunchArguments, SetBreakpointsArguments, StackTraceArguments,
    VariablesArguments,
};
use dap_types::responses::{
    BreakpointLocationsResponse, Capabilities, ContinueResponse, EvaluateResponse, ScopesResponse,
    SetBreakpointsResponse, StackTraceResponse, ThreadsResponse, VariablesResponse,
};
use dap_types::types::{
    Breakpoint, BreakpointLocation, LOCAL_VARIABLES_REFERENCE, MAIN_THREAD_ID, Scope, Source,
    StackFrame, Thread, Variable,
};
use dap_types::{Command, ErrorKind, Request};
use engine::{Engine, EngineError, Span, TraceFrame};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use transport::OutgoingMessage;

use crate::events::CurrentLocation;
use crate::writer::OutputWriter;

/// Everything a handler needs from its session.
pub(crate) struct Context<E> {
    pub engine: Arc<E>,
    pub output: OutputWriter,
    pub current: CurrentLocation,
    pub cancel: CancellationToken,
}

impl<E> Clone for Context<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            output: self.output.clone(),
            current: Arc::clone(&self.current),
            cancel: self.cancel.clone(),
        }
    }
}

/// A handler outcome that becomes an error response.
#[derive(Debug)]
struct Failure {
    kind: ErrorKind,
    format: String,
}

impl Failure {
    fn new(kind: ErrorKind, format: impl Into<String>) -> Self {
        Self {
            kind,
            format: format.into(),
        }
    }

    fn engine(format: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Engine, format.to_string())
    }
}

impl From<EngineError> for Failure {
    fn from(e: EngineError) -> Self {
        Failure::engine(e)
    }
}

type HandlerResult = Result<OutgoingMessage, Failure>;

pub(crate) async fn dispatch<E: Engine>(ctx: Context<E>, request: Request) {
    let response = match handle(&ctx, &request).await {
        Ok(response) => response,
        Err(failure) => {
            tracing::debug!(
                command = request.command.name(),
                seq = request.seq,
                kind = ?failure.kind,
                error = %failure.format,
                "request failed"
            );
            dap_types::error_response(&request, failure.kind, failure.format)
        }
    };
    ctx.output.enqueue(response);
}

async fn handle<E: Engine>(ctx: &Context<E>, request: &Request) -> HandlerResult {
    match &request.command {
        Command::Initialize(_) => {
            ctx.output.enqueue(dap_types::event(&Event::Initialized));
            Ok(dap_types::response(request, &Capabilities::adapter()))
        }
        Command::Launch(arguments) => launch(ctx, request, arguments.clone()).await,
        Command::SetBreakpoints(arguments) => set_breakpoints(ctx, request, arguments).await,
        Command::SetExceptionBreakpoints(_) | Command::Disconnect(_) => {
            Ok(dap_types::response(request, &()))
        }
        Command::Continue(_) => {
            let previous = ctx.current.write().await.take();
            ctx.resume(previous, |engine| engine.r#continue()).await?;
            Ok(dap_types::response(
                request,
                &ContinueResponse {
                    all_threads_continued: true,
                },
            ))
        }
        Command::Next(_) => {
            let previous = ctx.current.write().await.take();
            let Some(span) = previous.clone() else {
                return Err(Failure::engine("evaluation is not suspended"));
            };
            ctx.resume(previous, move |engine| engine.continue_until_after(&span))
                .await?;
            Ok(dap_types::response(request, &()))
        }
        Command::StepIn(_) => {
            let previous = ctx.current.write().await.take();
            ctx.resume(previous, |engine| engine.step()).await?;
            Ok(dap_types::response(request, &()))
        }
        Command::StackTrace(arguments) => stack_trace(ctx, request, arguments).await,
        Command::Scopes(_) => Ok(dap_types::response(
            request,
            &ScopesResponse {
                scopes: vec![Scope {
                    name: "Local".to_string(),
                    variables_reference: LOCAL_VARIABLES_REFERENCE,
                    expensive: false,
                }],
            },
        )),
        Command::Variables(arguments) => variables(ctx, request, arguments).await,
        Command::Evaluate(arguments) => {
            let expression = arguments.expression.clone();
            let value = ctx
                .call(move |engine| engine.lookup_value(&expression))
                .await?
                .map_err(|e| Failure::engine(format!("Failed to look up variable: {e}")))?;
            Ok(dap_types::response(
                request,
                &EvaluateResponse {
                    result: value,
                    r#type: Some("string".to_string()),
                    variables_reference: 0,
                },
            ))
        }
        Command::Threads => Ok(dap_types::response(
            request,
            &ThreadsResponse {
                threads: vec![Thread {
                    id: MAIN_THREAD_ID,
                    name: "main".to_string(),
                }],
            },
        )),
        Command::Terminate(_) => {
            ctx.call(|engine| engine.terminate()).await?;
            Ok(dap_types::response(request, &()))
        }
        Command::BreakpointLocations(arguments) => {
            breakpoint_locations(ctx, request, arguments).await
        }
        Command::Unsupported(command) => Err(Failure::new(
            ErrorKind::Unsupported,
            format!("{command} is not yet supported"),
        )),
        Command::Invalid { command, error } => Err(Failure::new(
            ErrorKind::InvalidArguments,
            format!("invalid arguments for {command}: {error}"),
        )),
    }
}

impl<E: Engine> Context<E> {
    /// Run a facade call on the blocking pool, giving up if the session is
    /// cancelled first.
    async fn call<T, F>(&self, f: F) -> Result<T, Failure>
    where
        F: FnOnce(&E) -> T + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || f(&engine));
        tokio::select! {
            _ = self.cancel.cancelled() => {
                Err(Failure::new(ErrorKind::Cancelled, "session is shutting down"))
            }
            result = task => result.map_err(|e| {
                tracing::error!(error = %e, "engine call panicked");
                Failure::engine("internal engine failure")
            }),
        }
    }

    /// Run a control call with the suspended location already cleared,
    /// putting `previous` back if the engine refuses.
    async fn resume<F>(&self, previous: Option<Span>, f: F) -> Result<(), Failure>
    where
        F: FnOnce(&E) -> Result<(), EngineError> + Send + 'static,
    {
        let result = self
            .call(f)
            .await
            .and_then(|r| r.map_err(Failure::from));
        if result.is_err() {
            let mut current = self.current.write().await;
            if current.is_none() {
                *current = previous;
            }
        }
        result
    }
}

async fn launch<E: Engine>(ctx: &Context<E>, request: &Request, arguments: Value) -> HandlerResult {
    let arguments = LaunchArguments::from_value(arguments).map_err(|e| {
        tracing::debug!(error = %e, "undecodable launch arguments");
        Failure::new(ErrorKind::InvalidArguments, "Invalid launch arguments")
    })?;

    let source = tokio::fs::read_to_string(&arguments.program)
        .await
        .map_err(|e| Failure::engine(format!("Failed to open file: {e}")))?;

    let name = arguments.program.display().to_string();
    let search_paths = arguments.jpaths;
    let breakpoints = ctx
        .call(move |engine| {
            engine.launch(&name, &source, &search_paths)?;
            Ok::<_, EngineError>(engine.active_breakpoints())
        })
        .await??;
    tracing::debug!(
        program = %arguments.program.display(),
        ?breakpoints,
        "starting debugging"
    );
    Ok(dap_types::response(request, &()))
}

fn source_file(source: &Source) -> Option<String> {
    source
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .or_else(|| source.name.clone())
}

async fn set_breakpoints<E: Engine>(
    ctx: &Context<E>,
    request: &Request,
    arguments: &SetBreakpointsArguments,
) -> HandlerResult {
    let file = source_file(&arguments.source).ok_or_else(|| {
        Failure::new(
            ErrorKind::InvalidArguments,
            "setBreakpoints requires a source path",
        )
    })?;
    let requested = arguments.requested();
    let source = arguments.source.clone();

    let breakpoints = ctx
        .call(move |engine| {
            engine.clear_breakpoints(&file);
            requested
                .iter()
                .map(|wanted| match engine.set_breakpoint(&file, wanted.line, wanted.column) {
                    Ok(target) => Breakpoint {
                        verified: true,
                        message: None,
                        source: Some(source.clone()),
                        line: Some(target.line),
                        column: target.column,
                    },
                    Err(e) => {
                        tracing::warn!(%file, line = wanted.line, error = %e, "failed to set breakpoint");
                        Breakpoint {
                            verified: false,
                            message: Some(e.to_string()),
                            source: Some(source.clone()),
                            line: Some(wanted.line),
                            column: wanted.column,
                        }
                    }
                })
                .collect::<Vec<_>>()
        })
        .await?;

    Ok(dap_types::response(
        request,
        &SetBreakpointsResponse { breakpoints },
    ))
}

/// Frames come from the engine innermost last and go out innermost first.
fn stack_frames(trace: Vec<TraceFrame>) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = trace
        .into_iter()
        .enumerate()
        .map(|(id, frame)| {
            let name = if frame.name.starts_with('/') {
                Path::new(&frame.name)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(frame.name)
            } else {
                frame.name
            };

            match frame.span {
                Some(span) => {
                    let path = if span.file.starts_with('<') {
                        None
                    } else {
                        std::path::absolute(&span.file).ok()
                    };
                    StackFrame {
                        id: id as i64,
                        name,
                        source: Some(Source {
                            name: Some(span.file.clone()),
                            path,
                            source_reference: Some(0),
                        }),
                        line: span.begin.line,
                        column: span.begin.column,
                        end_line: Some(span.end.line),
                        end_column: Some(span.end.column),
                    }
                }
                None => StackFrame {
                    id: id as i64,
                    name,
                    source: None,
                    line: 0,
                    column: 0,
                    end_line: None,
                    end_column: None,
                },
            }
        })
        .collect();
    frames.reverse();
    frames
}

async fn stack_trace<E: Engine>(
    ctx: &Context<E>,
    request: &Request,
    arguments: &StackTraceArguments,
) -> HandlerResult {
    let trace = ctx.call(|engine| engine.stack_trace()).await?;
    let frames = stack_frames(trace);
    let total_frames = frames.len();

    let start = arguments.start_frame.unwrap_or(0);
    let levels = match arguments.levels {
        Some(0) | None => total_frames,
        Some(levels) => levels,
    };
    let stack_frames = frames.into_iter().skip(start).take(levels).collect();

    Ok(dap_types::response(
        request,
        &StackTraceResponse {
            stack_frames,
            total_frames,
        },
    ))
}

async fn variables<E: Engine>(
    ctx: &Context<E>,
    request: &Request,
    arguments: &VariablesArguments,
) -> HandlerResult {
    if arguments.variables_reference != LOCAL_VARIABLES_REFERENCE {
        return Ok(dap_types::response(
            request,
            &VariablesResponse {
                variables: Vec::new(),
            },
        ));
    }

    let variables = ctx
        .call(|engine| {
            let mut names = engine.list_vars();
            if !names.iter().any(|name| name == "self") {
                names.push("self".to_string());
            }
            names
                .into_iter()
                .map(|name| {
                    let value = engine.lookup_value(&name).unwrap_or_else(|e| {
                        tracing::warn!(var = %name, error = %e, "failed to get value for variable listing");
                        String::new()
                    });
                    Variable {
                        evaluate_name: Some(name.clone()),
                        name,
                        value,
                        variables_reference: 0,
                    }
                })
                .collect::<Vec<_>>()
        })
        .await?;

    Ok(dap_types::response(request, &VariablesResponse { variables }))
}

async fn breakpoint_locations<E: Engine>(
    ctx: &Context<E>,
    request: &Request,
    arguments: &BreakpointLocationsArguments,
) -> HandlerResult {
    let file = source_file(&arguments.source).ok_or_else(|| {
        Failure::new(
            ErrorKind::InvalidArguments,
            "breakpointLocations requires a source path",
        )
    })?;
    let first = arguments.line;
    let last = arguments.end_line.unwrap_or(first);

    let spans = ctx
        .call(move |engine| engine.breakpoint_locations(&file))
        .await??;
    let breakpoints = spans
        .into_iter()
        .filter(|span| (first..=last).contains(&span.begin.line))
        .map(|span| BreakpointLocation {
            line: span.begin.line,
            column: Some(span.begin.column),
            end_line: Some(span.end.line),
            end_column: Some(span.end.column),
        })
        .collect();

    Ok(dap_types::response(
        request,
        &BreakpointLocationsResponse { breakpoints },
    ))
}
