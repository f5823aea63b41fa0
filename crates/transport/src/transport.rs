use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::reader::DapReader;
use crate::writer::DapWriter;

/// A byte stream a session can run over, split into owned halves so reading
/// and writing can happen on different tasks.
pub trait DapTransport: Send + 'static {
    type Read: AsyncRead + Unpin + Send + 'static;
    type Write: AsyncWrite + Unpin + Send + 'static;

    fn into_split(self) -> (Self::Read, Self::Write);
}

impl DapTransport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        TcpStream::into_split(self)
    }
}

/// Standard input and output of this process, for clients that launch the
/// adapter as a child and talk to it over pipes.
#[derive(Debug, Default)]
pub struct StdioTransport;

impl StdioTransport {
    pub fn new() -> Self {
        StdioTransport
    }
}

impl DapTransport for StdioTransport {
    type Read = tokio::io::Stdin;
    type Write = tokio::io::Stdout;

    fn into_split(self) -> (Self::Read, Self::Write) {
        (tokio::io::stdin(), tokio::io::stdout())
    }
}

/// Wrap both halves of `transport` in the DAP codec.
pub fn split<T: DapTransport>(transport: T) -> (DapReader<T::Read>, DapWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (DapReader::new(read), DapWriter::new(write))
}
