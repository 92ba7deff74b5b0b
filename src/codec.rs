//! Inbound line framing
//!
//! Splits the byte stream on `\n`, strips a trailing `\r` and decodes each
//! line lossily, so stray non-UTF-8 bytes become U+FFFD instead of ending
//! the session. An overlong line is yielded as `Inbound::TooLong` rather
//! than an error: `FramedRead` ends the stream after any decoder error.

use bytes::BytesMut;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};

/// One inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Line(String),
    /// The line exceeded the maximum length and was discarded
    TooLong,
}

/// Newline framing for client input
#[derive(Debug, Clone)]
pub struct ChatLineCodec {
    inner: AnyDelimiterCodec,
}

impl ChatLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_length),
        }
    }
}

fn frame(
    result: Result<Option<bytes::Bytes>, AnyDelimiterCodecError>,
) -> Result<Option<Inbound>, AnyDelimiterCodecError> {
    match result {
        Ok(Some(chunk)) => {
            let line = String::from_utf8_lossy(&chunk);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            Ok(Some(Inbound::Line(line.to_string())))
        }
        Ok(None) => Ok(None),
        Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Inbound::TooLong)),
        Err(e) => Err(e),
    }
}

impl Decoder for ChatLineCodec {
    type Item = Inbound;
    type Error = AnyDelimiterCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, Self::Error> {
        frame(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Inbound>, Self::Error> {
        frame(self.inner.decode_eof(buf))
    }
}
