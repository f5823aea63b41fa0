//! The evaluation thread behind [`super::LineEngine`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, TryRecvError};

use super::Shared;
use super::program::{Action, Node, Program, file_key};
use crate::types::{BreakpointTarget, EngineEvent, Position, Span, StopEvent, StopReason};

/// Commands sent from facade calls to the evaluation thread.
#[derive(Debug)]
pub(crate) enum Control {
    Continue,
    Step,
    UntilAfter(Span),
    Terminate,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Continue,
    Step,
    UntilAfter(Position),
}

enum Outcome {
    Completed,
    Failed(String),
    Terminated,
}

pub(crate) struct Evaluation {
    program: Arc<Program>,
    program_key: String,
    shared: Arc<Mutex<Shared>>,
    commands: Receiver<Control>,
    /// Resume commands that arrived while running, applied at the next stop.
    queued: VecDeque<Control>,
    mode: Mode,
    output: Vec<String>,
    last_evaluation: Option<String>,
}

impl Evaluation {
    pub fn new(
        program: Arc<Program>,
        shared: Arc<Mutex<Shared>>,
        commands: Receiver<Control>,
    ) -> Self {
        let program_key = file_key(&program.name);
        Self {
            program,
            program_key,
            shared,
            commands,
            queued: VecDeque::new(),
            mode: Mode::Continue,
            output: Vec::new(),
            last_evaluation: None,
        }
    }

    #[tracing::instrument(skip(self), fields(program = %self.program.name))]
    pub fn run(mut self) {
        tracing::debug!("evaluation started");
        let outcome = self.evaluate();
        let error = match outcome {
            Outcome::Completed => None,
            Outcome::Terminated => {
                tracing::debug!("evaluation terminated");
                None
            }
            Outcome::Failed(message) => Some(message),
        };

        let mut shared = super::lock(&self.shared);
        shared.run.running = false;
        shared.run.current = None;
        shared.publish(EngineEvent::Exit {
            output: self.output.join("\n"),
            error,
        });
        tracing::debug!("evaluation finished");
    }

    fn evaluate(&mut self) -> Outcome {
        let program = Arc::clone(&self.program);
        for node in &program.nodes {
            if let Some((reason, breakpoint)) = self.stop_reason(node) {
                let stop = StopEvent {
                    reason,
                    current: node.span.clone(),
                    breakpoint,
                    last_evaluation: self.last_evaluation.clone(),
                    error: None,
                };
                match self.suspend(stop) {
                    Some(mode) => self.mode = mode,
                    None => return Outcome::Terminated,
                }
            }

            if let Err(message) = self.execute(node) {
                let stop = StopEvent {
                    reason: StopReason::Exception,
                    current: node.span.clone(),
                    breakpoint: None,
                    last_evaluation: self.last_evaluation.clone(),
                    error: Some(message.clone()),
                };
                // the run cannot continue past an error, whatever the client asks
                return match self.suspend(stop) {
                    Some(_) => Outcome::Failed(message),
                    None => Outcome::Terminated,
                };
            }

            loop {
                match self.commands.try_recv() {
                    Ok(Control::Terminate) | Err(TryRecvError::Disconnected) => {
                        return Outcome::Terminated;
                    }
                    Ok(other) => {
                        tracing::debug!(command = ?other, "queueing command until the next stop");
                        self.queued.push_back(other);
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }
        }
        Outcome::Completed
    }

    fn stop_reason(&self, node: &Node) -> Option<(StopReason, Option<BreakpointTarget>)> {
        let shared = super::lock(&self.shared);
        let hit = shared.breakpoints.iter().find(|target| {
            target.line == node.span.begin.line
                && target.column.is_none_or(|c| c == node.span.begin.column)
                && file_key(&target.file) == self.program_key
        });
        if let Some(target) = hit {
            return Some((StopReason::Breakpoint, Some(target.clone())));
        }

        match self.mode {
            Mode::Continue => None,
            Mode::Step => Some((StopReason::Step, None)),
            Mode::UntilAfter(end) if node.span.begin >= end => Some((StopReason::Step, None)),
            Mode::UntilAfter(_) => None,
        }
    }

    /// Publish the stop and block until the next control command, taking
    /// queued commands first.
    ///
    /// Returns `None` when the run should end.
    fn suspend(&mut self, stop: StopEvent) -> Option<Mode> {
        tracing::debug!(reason = ?stop.reason, at = %stop.current, "suspending");
        {
            let mut shared = super::lock(&self.shared);
            shared.run.current = Some(stop.current.clone());
            shared.publish(EngineEvent::Stop(stop));
        }

        let command = match self.queued.pop_front() {
            Some(command) => Ok(command),
            None => self.commands.recv(),
        };
        let next = match command {
            Ok(Control::Continue) => Some(Mode::Continue),
            Ok(Control::Step) => Some(Mode::Step),
            Ok(Control::UntilAfter(span)) => Some(Mode::UntilAfter(span.end)),
            Ok(Control::Terminate) | Err(_) => None,
        };

        super::lock(&self.shared).run.current = None;
        next
    }

    fn execute(&mut self, node: &Node) -> Result<(), String> {
        match &node.action {
            Action::Bind { name, value } => {
                let mut shared = super::lock(&self.shared);
                let vars = &mut shared.run.vars;
                match vars.iter_mut().find(|(existing, _)| existing == name) {
                    Some((_, slot)) => *slot = value.clone(),
                    None => vars.push((name.clone(), value.clone())),
                }
                self.last_evaluation = Some(value.clone());
                Ok(())
            }
            Action::Emit(text) => {
                self.output.push(text.clone());
                self.last_evaluation = Some(text.clone());
                Ok(())
            }
            Action::Raise(message) => Err(message.clone()),
        }
    }
}
