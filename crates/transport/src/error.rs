use std::io;

/// Why a frame could not be read or written.
///
/// Only [`CodecError::Io`] describes the connection itself; every other
/// variant means the peer sent bytes that are not a DAP message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),

    #[error("frame header is not valid UTF-8")]
    InvalidUtf8,

    #[error("Content-Length is not a number")]
    MalformedContentLength,

    #[error("frame has no Content-Length header")]
    MissingContentLength,

    #[error("frame header exceeds the {max} byte limit")]
    HeaderTooLarge { max: usize },

    #[error("frame body of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },

    #[error("frame body is not a DAP message: {0}")]
    JsonDeserialize(#[source] serde_json::Error),

    #[error("encoding message: {0}")]
    JsonSerialize(#[source] serde_json::Error),
}

impl CodecError {
    pub fn is_io(&self) -> bool {
        matches!(self, CodecError::Io(_))
    }
}
