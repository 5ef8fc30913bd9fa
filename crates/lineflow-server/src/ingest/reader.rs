//! Object stream reader
//!
//! Turns the byte stream of a stored object into a lazy, single-pass
//! sequence of text lines. Only the current partial line is ever buffered,
//! so memory stays bounded by `max_line_bytes` no matter how large the
//! object is.
//!
//! Line framing follows universal-newline rules: `\n`, `\r\n` and a lone
//! `\r` all terminate a line, and the terminator is never part of the line.

use bytes::{Buf, BytesMut};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio_util::codec::{Decoder, FramedRead};

use super::error::{IngestError, IngestResult};
use super::object_store::ObjectStream;

/// Default cap on the length of a single line
pub const DEFAULT_MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Codec splitting bytes into lines on `\n`, `\r\n` or `\r`
#[derive(Debug, Clone)]
pub struct LineDecoder {
    /// Where to resume scanning for a terminator in the buffered bytes
    next_index: usize,
    max_length: usize,
}

impl LineDecoder {
    pub fn new(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
        }
    }

    fn take_line(
        &mut self,
        buf: &mut BytesMut,
        end: usize,
        terminator_len: usize,
    ) -> IngestResult<String> {
        if end > self.max_length {
            return Err(IngestError::LineTooLong {
                limit: self.max_length,
            });
        }

        let line = buf.split_to(end);
        buf.advance(terminator_len);
        self.next_index = 0;

        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl Decoder for LineDecoder {
    type Item = String;
    type Error = IngestError;

    fn decode(&mut self, buf: &mut BytesMut) -> IngestResult<Option<String>> {
        let terminator = buf[self.next_index..]
            .iter()
            .position(|b| *b == b'\n' || *b == b'\r')
            .map(|offset| self.next_index + offset);

        match terminator {
            Some(i) if buf[i] == b'\n' => self.take_line(buf, i, 1).map(Some),
            Some(i) if i + 1 < buf.len() => {
                let len = if buf[i + 1] == b'\n' { 2 } else { 1 };
                self.take_line(buf, i, len).map(Some)
            }
            Some(i) => {
                // Trailing '\r': wait for the next read to see whether '\n' follows.
                if i > self.max_length {
                    return Err(IngestError::LineTooLong {
                        limit: self.max_length,
                    });
                }
                self.next_index = i;
                Ok(None)
            }
            None => {
                if buf.len() > self.max_length {
                    return Err(IngestError::LineTooLong {
                        limit: self.max_length,
                    });
                }
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> IngestResult<Option<String>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let len = buf.len();
        let end = if buf.ends_with(b"\r") { len - 1 } else { len };
        self.take_line(buf, end, len - end).map(Some)
    }
}

/// Lazy line sequence over one object stream
pub struct LineReader {
    frames: FramedRead<ObjectStream, LineDecoder>,
    read_timeout: Option<Duration>,
}

impl LineReader {
    pub fn new(stream: ObjectStream) -> Self {
        Self {
            frames: FramedRead::new(stream, LineDecoder::default()),
            read_timeout: None,
        }
    }

    pub fn max_line_bytes(mut self, limit: usize) -> Self {
        self.frames.decoder_mut().max_length = limit;
        self
    }

    /// Fail with `Transfer` if no line arrives within `timeout`
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Next line without its terminator, or `None` at end of object
    pub async fn next_line(&mut self) -> IngestResult<Option<String>> {
        let next = match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.frames.next())
                .await
                .map_err(|_| {
                    IngestError::Transfer(format!(
                        "no data received from object stream for {:?}",
                        limit
                    ))
                })?,
            None => self.frames.next().await,
        };

        next.transpose()
    }

    /// Consume the reader as a stream that ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = IngestResult<String>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
