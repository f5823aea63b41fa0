//! Entry points that accept clients and run sessions for them.

use engine::Engine;
use tokio::net::TcpListener;
use transport::StdioTransport;

use crate::error::SessionError;
use crate::session::Session;

/// Listen on `host:port` and run an independent session for every accepted
/// connection, each with a fresh engine from `make_engine`.
///
/// Only returns if the listener fails.
#[tracing::instrument(skip(make_engine))]
pub async fn serve_tcp<E, F>(host: &str, port: u16, make_engine: F) -> Result<(), SessionError>
where
    E: Engine,
    F: Fn() -> E,
{
    let listener = TcpListener::bind((host, port)).await?;
    tracing::info!(address = ?listener.local_addr()?, "listening for DAP clients");
    accept_loop(listener, make_engine).await
}

async fn accept_loop<E, F>(listener: TcpListener, make_engine: F) -> Result<(), SessionError>
where
    E: Engine,
    F: Fn() -> E,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "accepted connection");
        let session = Session::new(make_engine());
        tokio::spawn(async move {
            match session.run(stream).await {
                Ok(()) => tracing::debug!(%peer, "connection closed"),
                Err(e) => tracing::warn!(%peer, error = %e, "session ended with an error"),
            }
        });
    }
}

/// Run a single session over the process's standard input and output.
pub async fn serve_stdio<E: Engine>(engine: E) -> Result<(), SessionError> {
    tracing::debug!("serving DAP over stdio");
    Session::new(engine).run(StdioTransport::new()).await
}
