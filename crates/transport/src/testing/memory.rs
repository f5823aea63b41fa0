use tokio::io::{DuplexStream, duplex};

use crate::transport::DapTransport;

/// One end of an in-memory connection.
///
/// ```
/// let (client, adapter) = transport::testing::MemoryTransport::pair();
/// let (client_read, client_write) = client.into_raw();
/// # drop((client_read, client_write, adapter));
/// ```
#[derive(Debug)]
pub struct MemoryTransport {
    read: DuplexStream,
    write: DuplexStream,
}

impl MemoryTransport {
    pub fn pair() -> (Self, Self) {
        Self::pair_with_buffer_size(64 * 1024)
    }

    /// A connected pair whose pipes each buffer at most `buffer_size` bytes,
    /// so writers block once a reader falls behind.
    pub fn pair_with_buffer_size(buffer_size: usize) -> (Self, Self) {
        let (client_write, adapter_read) = duplex(buffer_size);
        let (adapter_write, client_read) = duplex(buffer_size);
        (
            MemoryTransport {
                read: client_read,
                write: client_write,
            },
            MemoryTransport {
                read: adapter_read,
                write: adapter_write,
            },
        )
    }

    /// The raw pipes, `(read, write)`, for writing hand-made frames.
    pub fn into_raw(self) -> (DuplexStream, DuplexStream) {
        (self.read, self.write)
    }
}

impl DapTransport for MemoryTransport {
    type Read = DuplexStream;
    type Write = DuplexStream;

    fn into_split(self) -> (DuplexStream, DuplexStream) {
        self.into_raw()
    }
}
