//! One client connection bridged to one engine.

use std::sync::Arc;

use engine::Engine;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use transport::{DapReader, DapTransport, Message};

use crate::dispatch::{Context, dispatch};
use crate::error::SessionError;
use crate::events::EventMultiplexer;
use crate::writer::OutputWriter;

/// A debugging session over a single transport.
///
/// The session exclusively owns its engine. Requests are read one at a
/// time and each is handled on its own task, so responses to pipelined
/// requests may be written in any order; every response still carries the
/// `request_seq` of the request it answers.
pub struct Session<E> {
    engine: Arc<E>,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Run the session on an engine the caller keeps a handle to, e.g. to
    /// inspect it after the client has gone.
    pub fn from_shared(engine: Arc<E>) -> Self {
        Self { engine }
    }

    /// Serve requests until the client closes the connection.
    ///
    /// End of stream and transport I/O errors end the session normally.
    /// A message that cannot be decoded, or a message that is not a
    /// request, ends it with an error. Either way in-flight handlers are
    /// cancelled and joined, and every queued message is written before
    /// this returns.
    #[tracing::instrument(skip_all)]
    pub async fn run<T: DapTransport>(self, transport: T) -> Result<(), SessionError> {
        let (reader, writer) = transport::split(transport);
        let (output, writer_task) = OutputWriter::spawn(writer);

        let cancel = CancellationToken::new();
        let current = Arc::new(RwLock::new(None));
        let multiplexer = EventMultiplexer::new(
            self.engine.subscribe(),
            output.clone(),
            Arc::clone(&current),
            cancel.clone(),
        );
        let multiplexer = tokio::spawn(multiplexer.run());

        let ctx = Context {
            engine: self.engine,
            output,
            current,
            cancel: cancel.clone(),
        };
        let tracker = TaskTracker::new();

        let result = read_loop(reader, &ctx, &tracker).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "ending session");
        }

        cancel.cancel();
        tracker.close();
        tracker.wait().await;
        if let Err(e) = multiplexer.await {
            tracing::error!(error = %e, "event multiplexer panicked");
        }

        // the writer task exits once the last queue handle is gone
        drop(ctx);
        match writer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "failed to flush output"),
            Err(e) => tracing::error!(error = %e, "output writer panicked"),
        }

        tracing::debug!("session finished");
        result
    }
}

async fn read_loop<R, E>(
    mut reader: DapReader<R>,
    ctx: &Context<E>,
    tracker: &TaskTracker,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    E: Engine,
{
    while let Some(message) = reader.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) if e.is_io() => {
                tracing::debug!(error = %e, "transport closed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let request = match message {
            Message::Request(request) => dap_types::Request::try_from(request)?,
            Message::Response(_) => return Err(SessionError::UnexpectedMessage("response")),
            Message::Event(_) => return Err(SessionError::UnexpectedMessage("event")),
        };
        tracing::debug!(?request, "received request");

        tracker.spawn(dispatch(ctx.clone(), request));
    }

    tracing::debug!("client closed the connection");
    Ok(())
}
