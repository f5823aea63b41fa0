use std::collections::VecDeque;
use std::io::{self, IsTerminal};

use engine::testing::{Call, MockEngine, breakpoint_stop, exit, span, stop};
use engine::{BreakpointTarget, LineEngine, StopReason};
use repl::{LineSource, ReplDebugger, State};
use tracing_subscriber::EnvFilter;

const PROGRAM: &str = "\
// sample program
local greeting = 'hello';
local target = 'world';

greeting
target
";

/// Commands fed to the REPL as if typed.
struct Script(VecDeque<String>);

impl Script {
    fn new(lines: &[&str]) -> Self {
        Self(lines.iter().map(|l| l.to_string()).collect())
    }
}

impl LineSource for Script {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.0.pop_front())
    }
}

fn printed(out: &[u8]) -> String {
    String::from_utf8_lossy(out).into_owned()
}

#[test]
fn launch_step_quit_transitions() -> eyre::Result<()> {
    let engine = MockEngine::new()
        .then(vec![stop(StopReason::Step, span("prog.jsonnet", 2, 1))])
        .then(vec![stop(StopReason::Step, span("prog.jsonnet", 3, 1))]);
    let mut repl = ReplDebugger::new(
        engine,
        "prog.jsonnet",
        PROGRAM,
        vec!["lib".to_string()],
        Script::new(&["c", "s", "q"]),
        Vec::new(),
    );

    let mut states = vec![repl.state()];
    while repl.state() != State::Terminated {
        repl.step()?;
        states.push(repl.state());
    }

    assert_eq!(
        states,
        vec![
            State::AwaitingLaunch,
            State::Running,
            State::Stopped,
            State::Running,
            State::Stopped,
            State::Terminated,
        ]
    );
    assert_eq!(
        repl.engine().calls(),
        vec![
            Call::Launch {
                source_name: "prog.jsonnet".to_string(),
                search_paths: vec!["lib".to_string()],
            },
            Call::Step,
            Call::Terminate,
        ]
    );
    Ok(())
}

#[test]
fn end_of_input_quits() -> eyre::Result<()> {
    let mut repl = ReplDebugger::new(
        MockEngine::new(),
        "prog.jsonnet",
        PROGRAM,
        Vec::new(),
        Script::new(&[]),
        Vec::new(),
    );
    repl.run()?;
    assert_eq!(repl.state(), State::Terminated);
    assert_eq!(repl.engine().control_calls(), vec![Call::Terminate]);
    Ok(())
}

#[test]
fn breakpoint_command_messages() -> eyre::Result<()> {
    let engine = MockEngine::new().rejecting_line(9);
    let mut repl = ReplDebugger::new(
        engine,
        "prog.jsonnet",
        PROGRAM,
        Vec::new(),
        Script::new(&[
            "b prog.jsonnet",
            "b prog.jsonnet:x",
            "b prog.jsonnet:3:y",
            "b prog.jsonnet:3",
            "b prog.jsonnet:9",
            "b",
            "clear",
            "clear prog.jsonnet",
            "b",
            "frobnicate now",
            "q",
        ]),
        Vec::new(),
    );
    repl.run()?;

    let out = printed(repl.output());
    assert!(out.contains("Must specify file and line separated by `:`\n"));
    assert!(out.contains("Invalid line number: invalid digit found in string\n"));
    assert!(out.contains("Invalid column number: invalid digit found in string\n"));
    assert!(out.contains("Adding breakpoint at prog.jsonnet:3\n"));
    assert!(out.contains("no breakpoint target at prog.jsonnet:9\n"));
    assert_eq!(out.matches("- prog.jsonnet:3\n").count(), 1);
    assert!(out.contains("Must specify a file to clear\n"));
    assert!(out.contains("Unknown command: frobnicate now\n"));
    Ok(())
}

#[test]
fn exit_prints_output_and_error() -> eyre::Result<()> {
    let engine = MockEngine::new()
        .then(vec![breakpoint_stop(
            BreakpointTarget {
                file: "prog.jsonnet".to_string(),
                line: 5,
                column: None,
            },
            span("prog.jsonnet", 5, 1),
        )])
        .then(vec![exit("greeting", Some("boom"))]);
    let mut repl = ReplDebugger::new(
        engine,
        "prog.jsonnet",
        PROGRAM,
        Vec::new(),
        Script::new(&["c", "c", "never read"]),
        Vec::new(),
    );
    repl.run()?;

    let out = printed(repl.output());
    assert!(out.contains("Hit breakpoint: prog.jsonnet:5\n"));
    assert!(out.contains(" 5| [g]reeting\n"), "{out}");
    assert!(out.ends_with("greeting\nError during evaluation: boom\n"), "{out}");
    assert_eq!(repl.engine().control_calls().len(), 2);
    Ok(())
}

#[test]
fn line_engine_session() -> eyre::Result<()> {
    let engine = LineEngine::new().with_source("prog.jsonnet", PROGRAM);
    let mut repl = ReplDebugger::new(
        engine,
        "prog.jsonnet",
        PROGRAM,
        Vec::new(),
        Script::new(&[
            "l",
            "b prog.jsonnet:3",
            "c",
            "p greeting",
            "p",
            "vars",
            "last",
            "trace",
            "n",
            "lb",
            "c",
        ]),
        Vec::new(),
    );
    repl.run()?;
    assert_eq!(repl.state(), State::Terminated);

    let out = printed(repl.output());
    assert!(out.contains("File: prog.jsonnet\n 1| // sample program\n"));
    assert!(out.contains("Hit breakpoint: prog.jsonnet:3\n"));
    assert!(out.contains(" 3| [local target = 'world';]\n"), "{out}");
    assert!(out.contains("prog.jsonnet:3:1> "));
    assert!(out.contains("'hello'\n"));
    assert!(out.contains("Variables:\n- greeting\n"));
    assert!(out.contains("Last evaluation: 'hello'\n"));
    assert!(out.contains("- prog.jsonnet\t\t\tprog.jsonnet:3:1\n- <top-level>\n"));
    assert!(out.contains(" 5| [greeting]\n"));
    assert!(out.contains("- prog.jsonnet:6:1\n"));
    assert!(out.ends_with("greeting\ntarget\n"), "{out}");
    Ok(())
}

#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    let _ = color_eyre::install();
}
