use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::DapCodec;
use crate::error::CodecError;
use crate::message::Message;

pin_project! {
    /// Decodes client messages from the read half of a connection.
    ///
    /// The stream ends when the client closes its side. After an error the
    /// stream must not be polled again.
    pub struct DapReader<R> {
        #[pin]
        frames: FramedRead<R, DapCodec>,
    }
}

impl<R: AsyncRead> DapReader<R> {
    pub fn new(read: R) -> Self {
        Self::with_codec(read, DapCodec::new())
    }

    pub fn with_codec(read: R, codec: DapCodec) -> Self {
        Self {
            frames: FramedRead::new(read, codec),
        }
    }

    pub fn into_inner(self) -> R {
        self.frames.into_inner()
    }
}

impl<R: AsyncRead> Stream for DapReader<R> {
    type Item = Result<Message, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = ready!(self.project().frames.poll_next(cx));
        if let Some(Ok(message)) = &next {
            tracing::trace!(?message, "decoded message");
        }
        Poll::Ready(next)
    }
}
