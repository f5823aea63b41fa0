use std::borrow::Cow;
use std::io::Write;

use engine::{Engine, EngineEvent, Span, StopEvent, StopReason};
use eyre::WrapErr;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::command::{BreakpointSpec, Command};
use crate::context::{render_context, render_file};
use crate::input::LineSource;

/// Where the REPL is in its command/event alternation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing launched yet; `c` starts evaluation.
    AwaitingLaunch,
    /// Suspended at a location, reading commands.
    Stopped,
    /// Waiting for the engine's next event.
    Running,
    Terminated,
}

pub enum ShouldQuit {
    True,
    False,
}

/// Interactive debugger over one engine and one program.
pub struct ReplDebugger<E, I, W> {
    engine: E,
    events: UnboundedReceiver<EngineEvent>,
    input: I,
    out: W,
    filename: String,
    source: String,
    search_paths: Vec<String>,
    state: State,
    current: Option<Span>,
    last_evaluation: Option<String>,
    last_error: Option<String>,
}

impl<E, I, W> ReplDebugger<E, I, W>
where
    E: Engine,
    I: LineSource,
    W: Write,
{
    pub fn new(
        engine: E,
        filename: impl Into<String>,
        source: impl Into<String>,
        search_paths: Vec<String>,
        input: I,
        out: W,
    ) -> Self {
        let events = engine.subscribe();
        Self {
            engine,
            events,
            input,
            out,
            filename: filename.into(),
            source: source.into(),
            search_paths,
            state: State::AwaitingLaunch,
            current: None,
            last_evaluation: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Run until the engine exits or the user quits.
    pub fn run(&mut self) -> eyre::Result<()> {
        loop {
            match self.step()? {
                ShouldQuit::True => break,
                ShouldQuit::False => {}
            }
        }
        self.out.flush()?;
        Ok(())
    }

    /// Read and handle one command, or wait for and handle one event,
    /// depending on the current state.
    pub fn step(&mut self) -> eyre::Result<ShouldQuit> {
        match self.state {
            State::Terminated => Ok(ShouldQuit::True),
            State::Running => {
                let event = self.events.blocking_recv();
                self.handle_event(event).wrap_err("handling engine event")?;
                Ok(self.should_quit())
            }
            State::AwaitingLaunch | State::Stopped => {
                self.prompt()?;
                let line = self.input.next_line().wrap_err("reading command")?;
                match line {
                    Some(line) => self.handle_input(&line).wrap_err("handling command")?,
                    None => {
                        tracing::debug!("end of input");
                        self.quit();
                    }
                }
                Ok(self.should_quit())
            }
        }
    }

    fn should_quit(&self) -> ShouldQuit {
        if self.state == State::Terminated {
            ShouldQuit::True
        } else {
            ShouldQuit::False
        }
    }

    fn prompt(&mut self) -> eyre::Result<()> {
        if self.last_error.is_some() {
            write!(self.out, "! ")?;
        }
        match &self.current {
            Some(current) => write!(self.out, "{current}> ")?,
            None => write!(self.out, "> ")?,
        }
        self.out.flush()?;
        Ok(())
    }

    fn quit(&mut self) {
        self.engine.terminate();
        self.state = State::Terminated;
    }

    #[tracing::instrument(skip(self, event))]
    fn handle_event(&mut self, event: Option<EngineEvent>) -> eyre::Result<()> {
        match event {
            Some(EngineEvent::Stop(stop)) => self.on_stop(stop),
            Some(EngineEvent::Exit { output, error }) => {
                tracing::debug!(?error, "evaluation finished");
                if !output.is_empty() {
                    writeln!(self.out, "{output}")?;
                }
                if let Some(error) = error {
                    writeln!(self.out, "Error during evaluation: {error}")?;
                }
                self.current = None;
                self.state = State::Terminated;
                Ok(())
            }
            None => {
                tracing::warn!("engine event channel closed");
                self.state = State::Terminated;
                Ok(())
            }
        }
    }

    fn on_stop(&mut self, stop: StopEvent) -> eyre::Result<()> {
        tracing::debug!(reason = ?stop.reason, at = %stop.current, "evaluation stopped");
        match stop.reason {
            StopReason::Breakpoint => {
                if let Some(target) = &stop.breakpoint {
                    writeln!(self.out, "Hit breakpoint: {target}")?;
                }
            }
            StopReason::Step => {}
            StopReason::Exception => {
                writeln!(
                    self.out,
                    "Encountered error during evaluation: {}",
                    stop.error.as_deref().unwrap_or_default()
                )?;
            }
        }
        self.print_context(&stop.current)?;

        self.current = Some(stop.current);
        self.last_evaluation = stop.last_evaluation;
        self.last_error = stop.error;
        self.state = State::Stopped;
        Ok(())
    }

    fn source_of(&self, file: &str) -> Option<Cow<'_, str>> {
        if file == self.filename {
            return Some(Cow::Borrowed(&self.source));
        }
        std::fs::read_to_string(file).ok().map(Cow::Owned)
    }

    fn print_context(&mut self, span: &Span) -> eyre::Result<()> {
        let context = match self.source_of(&span.file) {
            Some(source) => render_context(&source, span),
            None => format!("{span}\n"),
        };
        write!(self.out, "{context}")?;
        Ok(())
    }

    fn handle_input(&mut self, input: &str) -> eyre::Result<()> {
        let command = Command::parse(input);
        tracing::debug!(?command, "executing command");

        match command {
            Command::Break(None) => {
                for target in self.engine.active_breakpoints() {
                    writeln!(self.out, "- {target}")?;
                }
            }
            Command::Break(Some(spec)) => match spec.parse::<BreakpointSpec>() {
                Err(e) => writeln!(self.out, "{e}")?,
                Ok(spec) => match self.engine.set_breakpoint(&spec.file, spec.line, spec.column) {
                    Ok(target) => writeln!(self.out, "Adding breakpoint at {target}")?,
                    Err(e) => writeln!(self.out, "{e}")?,
                },
            },
            Command::Next => match self.current.clone() {
                Some(current) => self.resume(|engine| engine.continue_until_after(&current))?,
                None => writeln!(self.out, "Evaluation is not suspended")?,
            },
            Command::Step => self.resume(|engine| engine.step())?,
            Command::List => match self.current.clone() {
                Some(current) => self.print_context(&current)?,
                None => write!(self.out, "{}", render_file(&self.filename, &self.source))?,
            },
            Command::ListBreakpointLocations => {
                match self.engine.breakpoint_locations(&self.filename) {
                    Ok(locations) => {
                        for span in locations {
                            writeln!(
                                self.out,
                                "- {}:{}:{}",
                                span.file, span.begin.line, span.begin.column
                            )?;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "unable to list breakpoint locations");
                        writeln!(self.out, "{e}")?;
                    }
                }
            }
            Command::Print(name) => match self.engine.lookup_value(&name) {
                Ok(value) => writeln!(self.out, "{value}")?,
                Err(e) => writeln!(self.out, "{e}")?,
            },
            Command::Trace => {
                for frame in self.engine.stack_trace().into_iter().rev() {
                    match frame.span {
                        Some(span) => writeln!(self.out, "- {}\t\t\t{span}", frame.name)?,
                        None => writeln!(self.out, "- {}", frame.name)?,
                    }
                }
            }
            Command::Last => {
                if let Some(value) = &self.last_evaluation {
                    writeln!(self.out, "Last evaluation: {value}")?;
                }
            }
            Command::Vars => {
                let vars = self.engine.list_vars();
                writeln!(self.out, "Variables:")?;
                for var in vars {
                    writeln!(self.out, "- {var}")?;
                }
            }
            Command::Clear(None) => writeln!(self.out, "Must specify a file to clear")?,
            Command::Clear(Some(file)) => self.engine.clear_breakpoints(&file),
            Command::Continue => {
                if self.state == State::AwaitingLaunch {
                    let (filename, source, search_paths) =
                        (&self.filename, &self.source, &self.search_paths);
                    let result = self.engine.launch(filename, source, search_paths);
                    self.after_resume(result)?;
                } else {
                    self.resume(|engine| engine.r#continue())?;
                }
            }
            Command::Quit => self.quit(),
            Command::Empty => {}
            Command::Unknown(input) => writeln!(self.out, "Unknown command: {input}")?,
        }
        Ok(())
    }

    fn resume(
        &mut self,
        f: impl FnOnce(&E) -> Result<(), engine::EngineError>,
    ) -> eyre::Result<()> {
        let result = f(&self.engine);
        self.after_resume(result)
    }

    /// Hand control to the engine, or report why it refused and stay put.
    fn after_resume(&mut self, result: Result<(), engine::EngineError>) -> eyre::Result<()> {
        match result {
            Ok(()) => {
                self.current = None;
                self.last_evaluation = None;
                self.last_error = None;
                self.state = State::Running;
            }
            Err(e) => writeln!(self.out, "{e}")?,
        }
        Ok(())
    }
}
