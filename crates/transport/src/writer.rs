use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Sink, SinkExt};
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::DapCodec;
use crate::error::CodecError;
use crate::message::OutgoingMessage;

pin_project! {
    /// Encodes adapter messages onto the write half of a connection.
    ///
    /// The writer is not shareable; one task owns it and everything else
    /// hands messages to that task.
    pub struct DapWriter<W> {
        #[pin]
        frames: FramedWrite<W, DapCodec>,
    }
}

impl<W: AsyncWrite + Unpin> DapWriter<W> {
    pub fn new(write: W) -> Self {
        Self {
            frames: FramedWrite::new(write, DapCodec::new()),
        }
    }

    /// Write one whole frame and flush it.
    pub async fn send(&mut self, message: OutgoingMessage) -> Result<(), CodecError> {
        SinkExt::send(&mut self.frames, message).await
    }

    /// Flush anything buffered and shut the write half down.
    pub async fn close(&mut self) -> Result<(), CodecError> {
        SinkExt::close(&mut self.frames).await
    }

    pub fn into_inner(self) -> W {
        self.frames.into_inner()
    }
}

impl<W: AsyncWrite> Sink<OutgoingMessage> for DapWriter<W> {
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), CodecError>> {
        self.project().frames.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, message: OutgoingMessage) -> Result<(), CodecError> {
        self.project().frames.start_send(message)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), CodecError>> {
        self.project().frames.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), CodecError>> {
        self.project().frames.poll_close(cx)
    }
}
