//! The single serialization point for outgoing messages.

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use transport::{CodecError, DapWriter, OutgoingMessage, Seq};

/// Handle for queueing responses and events on a connection.
///
/// Clones share one queue drained by one writer task, so the byte stream
/// observes messages whole and in enqueue order. The writer task exits once
/// every clone has been dropped and the queue is empty.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

impl OutputWriter {
    /// Start the writer task for `writer`.
    pub fn spawn<W>(writer: DapWriter<W>) -> (Self, JoinHandle<Result<(), CodecError>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_queue(writer, rx));
        (Self { tx }, task)
    }

    pub fn enqueue(&self, message: OutgoingMessage) {
        if let Err(e) = self.tx.send(message) {
            tracing::debug!(message = ?e.0, "writer has shut down, dropping message");
        }
    }
}

async fn write_queue<W>(
    mut writer: DapWriter<W>,
    mut rx: mpsc::UnboundedReceiver<OutgoingMessage>,
) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut seq: Seq = 1;
    while let Some(message) = rx.recv().await {
        let message = message.with_seq(seq);
        seq += 1;
        writer.send(message.clone()).await?;
        tracing::debug!(?message, "message sent");
    }
    tracing::debug!("output queue closed, writer exiting");
    writer.close().await
}
