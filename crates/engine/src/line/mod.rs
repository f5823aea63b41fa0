//! A minimal line-oriented engine.
//!
//! Each non-blank, non-comment line of a program is one evaluation node:
//!
//! - `local <name> = <text>;` binds `<name>` to `<text>`
//! - `error <message>` raises an evaluation error
//! - anything else is appended to the program output
//!
//! There is no expression language behind it. It exists so the debug front
//! ends have a real engine to drive.

mod program;
mod worker;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::EngineError;
use crate::facade::Engine;
use crate::types::{BreakpointTarget, EngineEvent, Span, TraceFrame};
use program::{Program, file_key};
use worker::{Control, Evaluation};

const TOP_LEVEL_FRAME: &str = "<top-level>";

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    current: Option<Span>,
    vars: Vec<(String, String)>,
}

struct WorkerHandle {
    commands: Sender<Control>,
    thread: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct Shared {
    breakpoints: BTreeSet<BreakpointTarget>,
    programs: HashMap<String, Arc<Program>>,
    search_paths: Vec<String>,
    subscribers: Vec<UnboundedSender<EngineEvent>>,
    run: RunState,
    worker: Option<WorkerHandle>,
}

impl Shared {
    fn publish(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Line-oriented [`Engine`] evaluating on a dedicated worker thread.
#[derive(Default)]
pub struct LineEngine {
    shared: Arc<Mutex<Shared>>,
}

impl LineEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source that is not on disk, such as standard input or
    /// inline code, so breakpoints can resolve against it before launch.
    pub fn with_source(self, name: &str, source: &str) -> Self {
        let program = Arc::new(Program::parse(name, source));
        lock(&self.shared).programs.insert(file_key(name), program);
        self
    }

    fn program_for(&self, file: &str) -> Result<Arc<Program>, EngineError> {
        let key = file_key(file);
        let search_paths = {
            let shared = lock(&self.shared);
            if let Some(program) = shared.programs.get(&key) {
                return Ok(Arc::clone(program));
            }
            shared.search_paths.clone()
        };

        let source = read_source(file, &search_paths)?;
        let program = Arc::new(Program::parse(file, &source));
        lock(&self.shared)
            .programs
            .insert(key, Arc::clone(&program));
        Ok(program)
    }

    fn send(&self, control: Control) -> Result<(), EngineError> {
        let shared = lock(&self.shared);
        match &shared.worker {
            Some(worker) if shared.run.running => worker
                .commands
                .send(control)
                .map_err(|_| EngineError::NotRunning),
            _ => Err(EngineError::NotRunning),
        }
    }

    /// End the current run, if any, and wait for its thread.
    fn stop_worker(&self) {
        let worker = lock(&self.shared).worker.take();
        if let Some(worker) = worker {
            let _ = worker.commands.send(Control::Terminate);
            if worker.thread.join().is_err() {
                tracing::error!("evaluation worker panicked");
            }
        }
    }
}

fn read_source(file: &str, search_paths: &[String]) -> Result<String, EngineError> {
    let path = Path::new(file);
    let first_error = match std::fs::read_to_string(path) {
        Ok(source) => return Ok(source),
        Err(e) => e,
    };

    if path.is_relative() {
        for dir in search_paths {
            let candidate = PathBuf::from(dir).join(path);
            if let Ok(source) = std::fs::read_to_string(&candidate) {
                return Ok(source);
            }
        }
    }

    Err(EngineError::Io {
        path: path.to_path_buf(),
        source: first_error,
    })
}

impl Engine for LineEngine {
    #[tracing::instrument(skip(self, source))]
    fn launch(
        &self,
        source_name: &str,
        source: &str,
        search_paths: &[String],
    ) -> Result<(), EngineError> {
        self.stop_worker();

        let program = Arc::new(Program::parse(source_name, source));
        let (commands, command_rx) = crossbeam_channel::unbounded();
        {
            let mut shared = lock(&self.shared);
            shared
                .programs
                .insert(file_key(source_name), Arc::clone(&program));
            shared.search_paths = search_paths.to_vec();
            shared.run = RunState {
                running: true,
                ..Default::default()
            };
        }

        let evaluation = Evaluation::new(program, Arc::clone(&self.shared), command_rx);
        let thread = std::thread::Builder::new()
            .name("line-engine".to_string())
            .spawn(move || evaluation.run())
            .map_err(|e| {
                lock(&self.shared).run.running = false;
                EngineError::Spawn(e)
            })?;

        lock(&self.shared).worker = Some(WorkerHandle { commands, thread });
        Ok(())
    }

    fn r#continue(&self) -> Result<(), EngineError> {
        self.send(Control::Continue)
    }

    fn continue_until_after(&self, span: &Span) -> Result<(), EngineError> {
        self.send(Control::UntilAfter(span.clone()))
    }

    fn step(&self) -> Result<(), EngineError> {
        self.send(Control::Step)
    }

    fn set_breakpoint(
        &self,
        file: &str,
        line: usize,
        column: Option<usize>,
    ) -> Result<BreakpointTarget, EngineError> {
        let program = self.program_for(file)?;
        let node = program
            .node_at(line, column)
            .ok_or_else(|| EngineError::NoBreakpointTarget {
                file: file.to_string(),
                line,
                column,
            })?;

        let target = BreakpointTarget {
            file: file.to_string(),
            line,
            column: column.map(|_| node.span.begin.column),
        };
        lock(&self.shared).breakpoints.insert(target.clone());
        tracing::debug!(%target, "breakpoint set");
        Ok(target)
    }

    fn clear_breakpoints(&self, file: &str) {
        let key = file_key(file);
        lock(&self.shared)
            .breakpoints
            .retain(|target| file_key(&target.file) != key);
    }

    fn active_breakpoints(&self) -> Vec<BreakpointTarget> {
        lock(&self.shared).breakpoints.iter().cloned().collect()
    }

    fn breakpoint_locations(&self, file: &str) -> Result<Vec<Span>, EngineError> {
        let program = self.program_for(file)?;
        Ok(program.nodes.iter().map(|node| node.span.clone()).collect())
    }

    fn lookup_value(&self, name: &str) -> Result<String, EngineError> {
        lock(&self.shared)
            .run
            .vars
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| EngineError::UnknownVariable(name.to_string()))
    }

    fn list_vars(&self) -> Vec<String> {
        lock(&self.shared)
            .run
            .vars
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn stack_trace(&self) -> Vec<TraceFrame> {
        let shared = lock(&self.shared);
        if !shared.run.running {
            return Vec::new();
        }

        let mut frames = vec![TraceFrame {
            name: TOP_LEVEL_FRAME.to_string(),
            span: None,
        }];
        if let Some(current) = &shared.run.current {
            frames.push(TraceFrame {
                name: current.file.clone(),
                span: Some(current.clone()),
            });
        }
        frames
    }

    fn terminate(&self) {
        let shared = lock(&self.shared);
        if let Some(worker) = &shared.worker {
            let _ = worker.commands.send(Control::Terminate);
        }
    }

    fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared).subscribers.push(tx);
        rx
    }
}

impl Drop for LineEngine {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.shared).worker.take() {
            let _ = worker.commands.send(Control::Terminate);
        }
    }
}
