use std::collections::{HashMap, VecDeque};
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use adapter::{Session, SessionError};
use engine::testing::{self, Call, MockEngine};
use engine::{BreakpointTarget, Engine, LineEngine};
use eyre::WrapErr;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use transport::testing::{MemoryTransport, frame_message, frame_messages};
use transport::{DapReader, Event, Message, Response, Seq};

const PROGRAM: &str = "\
// sample program
local greeting = 'hello';
local target = 'world';

greeting
target
";

/// The client end of an in-memory session.
struct Client {
    reader: DapReader<DuplexStream>,
    writer: Option<DuplexStream>,
    seq: Seq,
    pending: VecDeque<Message>,
}

impl Client {
    fn start<E: Engine>(engine: Arc<E>) -> (Self, JoinHandle<Result<(), SessionError>>) {
        let (client, adapter) = MemoryTransport::pair();
        let session = tokio::spawn(Session::from_shared(engine).run(adapter));
        let (read, write) = client.into_raw();
        let client = Client {
            reader: DapReader::new(read),
            writer: Some(write),
            seq: 0,
            pending: VecDeque::new(),
        };
        (client, session)
    }

    async fn send(&mut self, command: &str, arguments: Value) -> eyre::Result<Seq> {
        self.seq += 1;
        let bytes = frame_message(&json!({
            "seq": self.seq,
            "type": "request",
            "command": command,
            "arguments": arguments,
        }));
        self.write(&bytes).await?;
        Ok(self.seq)
    }

    async fn write(&mut self, bytes: &[u8]) -> eyre::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| eyre::eyre!("client already closed"))?;
        writer.write_all(bytes).await?;
        Ok(())
    }

    fn close(&mut self) {
        self.writer.take();
    }

    async fn read(&mut self) -> eyre::Result<Option<Message>> {
        let message = tokio::time::timeout(Duration::from_secs(5), self.reader.next())
            .await
            .wrap_err("timed out waiting for adapter message")?;
        Ok(message.transpose()?)
    }

    async fn wait_for<T>(&mut self, mut pick: impl FnMut(&Message) -> Option<T>) -> eyre::Result<T> {
        if let Some(index) = self.pending.iter().position(|m| pick(m).is_some()) {
            let message = self.pending.remove(index).ok_or_else(|| eyre::eyre!("lost message"))?;
            return pick(&message).ok_or_else(|| eyre::eyre!("message changed"));
        }
        loop {
            let message = self
                .read()
                .await?
                .ok_or_else(|| eyre::eyre!("adapter closed the connection"))?;
            if let Some(found) = pick(&message) {
                return Ok(found);
            }
            self.pending.push_back(message);
        }
    }

    async fn response(&mut self, seq: Seq) -> eyre::Result<Response> {
        self.wait_for(|m| match m {
            Message::Response(r) if r.request_seq == seq => Some(r.clone()),
            _ => None,
        })
        .await
    }

    async fn event(&mut self, name: &str) -> eyre::Result<Event> {
        self.wait_for(|m| match m {
            Message::Event(e) if e.event == name => Some(e.clone()),
            _ => None,
        })
        .await
    }

    async fn request(&mut self, command: &str, arguments: Value) -> eyre::Result<Response> {
        let seq = self.send(command, arguments).await?;
        self.response(seq).await
    }

    /// Every remaining message up to end of stream.
    async fn drain(&mut self) -> eyre::Result<Vec<Message>> {
        let mut messages: Vec<_> = self.pending.drain(..).collect();
        while let Some(message) = self.read().await? {
            messages.push(message);
        }
        Ok(messages)
    }
}

fn error_format(response: &Response) -> Option<&str> {
    response.body.as_ref()?["error"]["format"].as_str()
}

fn program_file() -> eyre::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".jsonnet").tempfile()?;
    file.write_all(PROGRAM.as_bytes())?;
    Ok(file)
}

#[tokio::test(flavor = "multi_thread")]
async fn initialized_before_initialize_response() -> eyre::Result<()> {
    let (mut client, session) = Client::start(Arc::new(MockEngine::new()));

    client.send("initialize", json!({"adapterID": "jsonnice"})).await?;

    match client.read().await? {
        Some(Message::Event(event)) => {
            assert_eq!(event.event, "initialized");
            assert_eq!(event.seq, 1);
        }
        other => eyre::bail!("expected initialized event, got {other:?}"),
    }
    match client.read().await? {
        Some(Message::Response(response)) => {
            assert!(response.success);
            assert_eq!(response.command, "initialize");
            assert_eq!(response.seq, 2);
            let body = response.body.unwrap_or_default();
            assert_eq!(body["supportsTerminateRequest"], json!(true));
            assert_eq!(body["supportsBreakpointLocationsRequest"], json!(true));
            assert_eq!(body["supportsStepBack"], json!(false));
        }
        other => eyre::bail!("expected initialize response, got {other:?}"),
    }

    client.close();
    session.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn launching_a_missing_file_reports_the_open_failure() -> eyre::Result<()> {
    let engine = Arc::new(MockEngine::new());
    let (mut client, session) = Client::start(Arc::clone(&engine));

    let response = client
        .request("launch", json!({"program": "/definitely/not/here/a.jsonnet"}))
        .await?;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("engineError"));
    let format = error_format(&response).unwrap_or_default();
    assert!(format.starts_with("Failed to open file: "), "{format}");

    client.close();
    let rest = client.drain().await?;
    assert!(rest.iter().all(|m| !matches!(m, Message::Event(_))), "{rest:?}");
    session.await??;
    assert!(engine.control_calls().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn launch_without_a_program_is_invalid() -> eyre::Result<()> {
    let (mut client, session) = Client::start(Arc::new(MockEngine::new()));

    let response = client.request("launch", json!({"noDebug": true})).await?;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("invalidArguments"));
    assert_eq!(error_format(&response), Some("Invalid launch arguments"));

    client.close();
    session.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_arguments_are_answered_and_the_session_continues() -> eyre::Result<()> {
    let engine = Arc::new(MockEngine::new());
    let (mut client, session) = Client::start(Arc::clone(&engine));

    let cases = [
        ("evaluate", json!({"frameId": 0})),
        ("breakpointLocations", json!({"source": {"path": "a.jsonnet"}})),
        ("setBreakpoints", json!({"breakpoints": [{"line": 1}]})),
    ];
    for (command, arguments) in cases {
        let response = client.request(command, arguments).await?;
        assert!(!response.success, "{command}");
        assert_eq!(response.command, command);
        assert_eq!(response.message.as_deref(), Some("invalidArguments"));
        let body = response.body.clone().unwrap_or_default();
        assert_eq!(body["error"]["id"], json!(12346));
        let format = error_format(&response).unwrap_or_default();
        assert!(format.starts_with(&format!("invalid arguments for {command}: ")), "{format}");

        let threads = client.request("threads", json!({})).await?;
        assert!(threads.success, "session ended after {command}");
    }

    client.close();
    session.await??;
    assert!(engine.calls().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_commands_leave_the_engine_alone() -> eyre::Result<()> {
    let engine = Arc::new(MockEngine::new());
    let (mut client, session) = Client::start(Arc::clone(&engine));

    let response = client
        .request("setExpression", json!({"expression": "x", "value": "1"}))
        .await?;
    assert!(!response.success);
    assert_eq!(response.command, "setExpression");
    assert_eq!(response.message.as_deref(), Some("unsupported"));
    let body = response.body.unwrap_or_default();
    assert_eq!(body["error"]["id"], json!(12345));
    assert_eq!(
        body["error"]["format"],
        json!("SetExpressionRequest is not yet supported")
    );

    let response = client.request("pause", json!({"threadId": 1})).await?;
    assert_eq!(response.message.as_deref(), Some("unsupported"));

    client.close();
    session.await??;
    assert!(engine.calls().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn pipelined_requests_are_answered_once_each() -> eyre::Result<()> {
    let engine = Arc::new(MockEngine::new().with_value("x", "42"));
    let (mut client, session) = Client::start(Arc::clone(&engine));

    let commands = ["threads", "scopes", "evaluate", "variables", "stackTrace"];
    let requests: Vec<Value> = (1..=40)
        .map(|seq| {
            let command = commands[seq % commands.len()];
            json!({
                "seq": seq,
                "type": "request",
                "command": command,
                "arguments": {"expression": "x", "variablesReference": 1000, "threadId": 1},
            })
        })
        .collect();
    client.write(&frame_messages(&requests)).await?;
    client.close();

    let messages = client.drain().await?;
    session.await??;

    let mut answered: HashMap<Seq, String> = HashMap::new();
    for (index, message) in messages.iter().enumerate() {
        let Message::Response(response) = message else {
            eyre::bail!("unexpected message {message:?}");
        };
        assert_eq!(response.seq, index as Seq + 1);
        assert!(response.success, "{response:?}");
        let previous = answered.insert(response.request_seq, response.command.clone());
        assert!(previous.is_none(), "request {} answered twice", response.request_seq);
    }

    assert_eq!(answered.len(), requests.len());
    for request in &requests {
        let seq = request["seq"].as_i64().unwrap_or_default();
        assert_eq!(answered.get(&seq).map(String::as_str), request["command"].as_str());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_commands_end_the_session() -> eyre::Result<()> {
    let (mut client, session) = Client::start(Arc::new(MockEngine::new()));

    client.send("frobnicate", json!({})).await?;
    let _ = client.send("threads", json!({})).await;

    let rest = client.drain().await?;
    assert!(rest.is_empty(), "{rest:?}");
    assert!(matches!(session.await?, Err(SessionError::Decode(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn client_events_end_the_session() -> eyre::Result<()> {
    let (mut client, session) = Client::start(Arc::new(MockEngine::new()));

    client
        .write(&frame_message(
            &json!({"seq": 1, "type": "event", "event": "stopped"}),
        ))
        .await?;

    assert!(client.drain().await?.is_empty());
    assert!(matches!(
        session.await?,
        Err(SessionError::UnexpectedMessage("event"))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn client_hangup_is_a_clean_shutdown() -> eyre::Result<()> {
    let (mut client, session) = Client::start(Arc::new(MockEngine::new()));
    let response = client.request("threads", json!({})).await?;
    let body = response.body.unwrap_or_default();
    assert_eq!(body["threads"], json!([{"id": 1, "name": "main"}]));

    client.close();
    session.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn next_requires_a_suspended_evaluation() -> eyre::Result<()> {
    let engine = Arc::new(MockEngine::new());
    let (mut client, session) = Client::start(Arc::clone(&engine));

    let response = client.request("next", json!({"threadId": 1})).await?;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("engineError"));
    assert_eq!(error_format(&response), Some("evaluation is not suspended"));

    client.close();
    session.await??;
    assert!(engine.control_calls().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_breakpoints_are_unverified() -> eyre::Result<()> {
    let engine = Arc::new(MockEngine::new().rejecting_line(4));
    let (mut client, session) = Client::start(Arc::clone(&engine));

    let response = client
        .request(
            "setBreakpoints",
            json!({
                "source": {"path": "/src/a.jsonnet"},
                "breakpoints": [{"line": 3}, {"line": 4, "column": 2}],
            }),
        )
        .await?;
    assert!(response.success);
    let breakpoints = response.body.unwrap_or_default()["breakpoints"].clone();
    assert_eq!(breakpoints[0]["verified"], json!(true));
    assert_eq!(breakpoints[0]["line"], json!(3));
    assert_eq!(breakpoints[1]["verified"], json!(false));
    assert_eq!(breakpoints[1]["line"], json!(4));
    assert!(breakpoints[1]["message"].as_str().is_some());

    client.close();
    session.await??;

    assert_eq!(
        engine.calls()[..3],
        [
            Call::ClearBreakpoints("/src/a.jsonnet".to_string()),
            Call::SetBreakpoint {
                file: "/src/a.jsonnet".to_string(),
                line: 3,
                column: None,
            },
            Call::SetBreakpoint {
                file: "/src/a.jsonnet".to_string(),
                line: 4,
                column: Some(2),
            },
        ]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_events_drive_next() -> eyre::Result<()> {
    let file = program_file()?;
    let path = file.path().display().to_string();
    let at = testing::span(&path, 3, 1);
    let engine = Arc::new(
        MockEngine::new()
            .then(vec![testing::breakpoint_stop(
                BreakpointTarget {
                    file: path.clone(),
                    line: 3,
                    column: None,
                },
                at.clone(),
            )])
            .then(vec![testing::exception_stop("boom", testing::span(&path, 5, 1))])
            .then(vec![testing::exit("", Some("boom"))]),
    );
    let (mut client, session) = Client::start(Arc::clone(&engine));

    let response = client
        .request("launch", json!({"program": path, "jpaths": ["lib"]}))
        .await?;
    assert!(response.success, "{response:?}");
    let stopped = client.event("stopped").await?.body.unwrap_or_default();
    assert_eq!(stopped["reason"], json!("breakpoint"));
    assert_eq!(stopped["threadId"], json!(1));
    assert_eq!(stopped["allThreadsStopped"], json!(true));

    let response = client.request("next", json!({"threadId": 1})).await?;
    assert!(response.success);
    let stopped = client.event("stopped").await?.body.unwrap_or_default();
    assert_eq!(stopped["reason"], json!("exception"));
    assert_eq!(stopped["text"], json!("boom"));

    let response = client.request("continue", json!({"threadId": 1})).await?;
    assert!(response.success);
    assert_eq!(
        response.body.unwrap_or_default()["allThreadsContinued"],
        json!(true)
    );
    let output = client.event("output").await?.body.unwrap_or_default();
    assert_eq!(output["category"], json!("stderr"));
    client.event("terminated").await?;

    client.close();
    session.await??;

    assert_eq!(
        engine.control_calls(),
        vec![
            Call::Launch {
                source_name: path.clone(),
                search_paths: vec!["lib".to_string()],
            },
            Call::ContinueUntilAfter(at),
            Call::Continue,
        ]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn line_engine_end_to_end() -> eyre::Result<()> {
    let file = program_file()?;
    let path = file.path().display().to_string();
    let base_name = file
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (mut client, session) = Client::start(Arc::new(LineEngine::new()));

    client.request("initialize", json!({})).await?;
    client.event("initialized").await?;

    let response = client
        .request(
            "setBreakpoints",
            json!({"source": {"path": path}, "lines": [3]}),
        )
        .await?;
    let body = response.body.unwrap_or_default();
    assert_eq!(body["breakpoints"][0]["verified"], json!(true), "{body}");

    let response = client
        .request(
            "breakpointLocations",
            json!({"source": {"path": path}, "line": 2, "endLine": 5}),
        )
        .await?;
    let lines: Vec<_> = response.body.unwrap_or_default()["breakpoints"]
        .as_array()
        .map(|bps| bps.iter().map(|bp| bp["line"].clone()).collect())
        .unwrap_or_default();
    assert_eq!(lines, vec![json!(2), json!(3), json!(5)]);

    let response = client.request("launch", json!({"program": path})).await?;
    assert!(response.success, "{response:?}");
    let stopped = client.event("stopped").await?.body.unwrap_or_default();
    assert_eq!(stopped["reason"], json!("breakpoint"));

    let response = client.request("stackTrace", json!({"threadId": 1})).await?;
    let body = response.body.unwrap_or_default();
    assert_eq!(body["totalFrames"], json!(2));
    let top = &body["stackFrames"][0];
    assert_eq!(top["name"], json!(base_name));
    assert_eq!(top["line"], json!(3));
    assert_eq!(body["stackFrames"][1]["name"], json!("<top-level>"));

    let response = client
        .request("variables", json!({"variablesReference": 1000}))
        .await?;
    let variables = response.body.unwrap_or_default()["variables"].clone();
    assert_eq!(variables[0]["name"], json!("greeting"));
    assert_eq!(variables[0]["value"], json!("'hello'"));
    assert_eq!(variables[1]["name"], json!("self"));
    assert_eq!(variables[1]["value"], json!(""));

    let response = client
        .request("evaluate", json!({"expression": "greeting"}))
        .await?;
    assert_eq!(response.body.unwrap_or_default()["result"], json!("'hello'"));
    let response = client
        .request("evaluate", json!({"expression": "nope"}))
        .await?;
    assert!(!response.success);
    assert!(
        error_format(&response)
            .unwrap_or_default()
            .starts_with("Failed to look up variable: ")
    );

    let response = client.request("next", json!({"threadId": 1})).await?;
    assert!(response.success, "{response:?}");
    let stopped = client.event("stopped").await?.body.unwrap_or_default();
    assert_eq!(stopped["reason"], json!("step"));

    let response = client.request("stackTrace", json!({"threadId": 1})).await?;
    assert_eq!(
        response.body.unwrap_or_default()["stackFrames"][0]["line"],
        json!(5)
    );

    client.request("continue", json!({"threadId": 1})).await?;
    let output = client.event("output").await?.body.unwrap_or_default();
    assert_eq!(output["category"], json!("stdout"));
    assert_eq!(output["output"], json!("greeting\ntarget\n"));
    client.event("terminated").await?;

    let response = client.request("disconnect", json!({})).await?;
    assert!(response.success);

    client.close();
    session.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn outbound_sequence_numbers_increase_from_one() -> eyre::Result<()> {
    let (mut client, session) = Client::start(Arc::new(MockEngine::new()));

    client.send("initialize", json!({})).await?;
    client.send("threads", json!({})).await?;
    client.send("restart", json!({})).await?;
    client.close();

    let messages = client.drain().await?;
    session.await??;

    let seqs: Vec<Seq> = messages
        .iter()
        .map(|m| match m {
            Message::Response(r) => r.seq,
            Message::Event(e) => e.seq,
            Message::Request(r) => r.seq,
        })
        .collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
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
