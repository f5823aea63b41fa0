//! `Content-Length` framing as a tokio-util codec.
//!
//! A frame is a block of `Name: value` header lines terminated by an empty
//! line, followed by exactly `Content-Length` bytes of JSON. Header names
//! are matched case-insensitively and headers other than `Content-Length`
//! (such as `Content-Type`) are ignored.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::message::{Message, OutgoingMessage};

/// Bodies larger than this are refused: 16 MiB.
const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Header blocks longer than this are refused: 8 KiB.
const MAX_HEADER_LEN: usize = 8 * 1024;

const BLANK_LINE: &[u8] = b"\r\n\r\n";
const LENGTH_HEADER: &str = "content-length";

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    /// Waiting for a complete header block.
    Header,
    /// Header consumed; waiting for this many body bytes.
    Body(usize),
}

/// Decodes client [`Message`]s and encodes adapter [`OutgoingMessage`]s.
///
/// Any decode error leaves the buffer at an unknown position, so the stream
/// cannot be resynchronised and the connection has to be dropped.
#[derive(Debug, Clone)]
pub struct DapCodec {
    state: DecodeState,
    max_body_len: usize,
}

impl DapCodec {
    pub fn new() -> Self {
        Self::with_max_size(MAX_BODY_LEN)
    }

    pub fn with_max_size(max_body_len: usize) -> Self {
        Self {
            state: DecodeState::Header,
            max_body_len,
        }
    }

    /// Consume a header block from `src` and return the body length it
    /// announces, or `None` if the block is not complete yet.
    fn decode_header(&self, src: &mut BytesMut) -> Result<Option<usize>, CodecError> {
        let window = &src[..src.len().min(MAX_HEADER_LEN + BLANK_LINE.len())];
        let Some(end) = window.windows(BLANK_LINE.len()).position(|w| w == BLANK_LINE) else {
            if src.len() > MAX_HEADER_LEN + BLANK_LINE.len() {
                return Err(CodecError::HeaderTooLarge {
                    max: MAX_HEADER_LEN,
                });
            }
            return Ok(None);
        };
        let header = std::str::from_utf8(&src[..end]).map_err(|_| CodecError::InvalidUtf8)?;
        let len = content_length(header)?;
        if len > self.max_body_len {
            return Err(CodecError::MessageTooLarge {
                size: len,
                max: self.max_body_len,
            });
        }
        src.advance(end + BLANK_LINE.len());
        Ok(Some(len))
    }
}

impl Default for DapCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn content_length(header: &str) -> Result<usize, CodecError> {
    header
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(LENGTH_HEADER))
        .ok_or(CodecError::MissingContentLength)
        .and_then(|(_, value)| {
            value
                .trim()
                .parse()
                .map_err(|_| CodecError::MalformedContentLength)
        })
}

impl Decoder for DapCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        let len = match self.state {
            DecodeState::Body(len) => len,
            DecodeState::Header => match self.decode_header(src)? {
                Some(len) => {
                    self.state = DecodeState::Body(len);
                    len
                }
                None => return Ok(None),
            },
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let body = src.split_to(len);
        self.state = DecodeState::Header;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(CodecError::JsonDeserialize)
    }
}

impl Encoder<OutgoingMessage> for DapCodec {
    type Error = CodecError;

    fn encode(&mut self, item: OutgoingMessage, dst: &mut BytesMut) -> Result<(), CodecError> {
        let body = serde_json::to_vec(&item).map_err(CodecError::JsonSerialize)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        dst.reserve(header.len() + body.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(&body);
        Ok(())
    }
}
