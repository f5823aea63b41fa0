use dap_types::DecodeError;
use transport::CodecError;

/// Reasons a session ends abnormally.
///
/// A client closing its connection is a normal end and not an error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed message from client: {0}")]
    Codec(#[from] CodecError),

    #[error("undecodable request: {0}")]
    Decode(#[from] DecodeError),

    #[error("unexpected {0} message from client")]
    UnexpectedMessage(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
