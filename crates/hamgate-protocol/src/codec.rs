//! Tokio codec for the CRLF line protocol
//!
//! Packet gateways and terminal programs disagree on line endings and on
//! character encoding, so decoding is forgiving: LF terminates a line, a
//! trailing CR is dropped, invalid UTF-8 is replaced and overlong lines
//! are truncated rather than treated as errors.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Default maximum number of bytes kept from a single inbound line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Outbound text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A full line, terminated with CRLF on the wire
    Line(String),
    /// A prompt, written without a terminator so input follows it
    Prompt(String),
}

impl Reply {
    /// Create a full line
    pub fn line(text: impl Into<String>) -> Self {
        Self::Line(text.into())
    }

    /// Create a prompt
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::Prompt(text.into())
    }
}

/// Codec for reading lines and writing replies
#[derive(Debug)]
pub struct LineCodec {
    /// Maximum bytes kept per line
    max_length: usize,
    /// Where to resume the newline search in the buffer
    next_index: usize,
    /// Kept prefix of an overlong line whose tail is being discarded
    truncated: Option<BytesMut>,
}

impl LineCodec {
    /// Create a codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a codec that keeps at most `max_length` bytes of each line
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            next_index: 0,
            truncated: None,
        }
    }

    /// Maximum bytes kept per line
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Finish discarding the tail of an overlong line
        if let Some(prefix) = self.truncated.take() {
            return match src.iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    src.advance(offset + 1);
                    Ok(Some(decode_line(&prefix)))
                }
                None => {
                    src.clear();
                    self.truncated = Some(prefix);
                    Ok(None)
                }
            };
        }

        let start = self.next_index.min(src.len());
        match src[start..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let index = start + offset;
                self.next_index = 0;
                let line = src.split_to(index + 1);
                let body = &line[..index];
                let body = &body[..body.len().min(self.max_length)];
                Ok(Some(decode_line(body)))
            }
            None if src.len() > self.max_length => {
                tracing::debug!(
                    "Inbound line exceeds {} bytes, truncating",
                    self.max_length
                );
                self.truncated = Some(src.split_to(self.max_length));
                src.clear();
                self.next_index = 0;
                Ok(None)
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        if let Some(prefix) = self.truncated.take() {
            src.clear();
            return Ok(Some(decode_line(&prefix)));
        }

        self.next_index = 0;
        if src.is_empty() {
            Ok(None)
        } else {
            let rest = src.split_to(src.len());
            Ok(Some(decode_line(&rest)))
        }
    }
}

impl Encoder<Reply> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, reply: Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match reply {
            Reply::Line(text) => {
                dst.reserve(text.len() + 2);
                dst.put_slice(text.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Reply::Prompt(text) => {
                dst.put_slice(text.as_bytes());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_crlf_and_lf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"KN4XYZ\r\n123456\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("KN4XYZ"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("123456"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_partial_read() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"ON "[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"12\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("ON 12"));
    }

    #[test]
    fn test_decode_invalid_utf8_is_replaced() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"L\xff\xfe 2\r\n"[..]);

        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert!(line.starts_with('L'));
        assert!(line.contains('\u{FFFD}'));
        assert!(line.ends_with(" 2"));
    }

    #[test]
    fn test_decode_overlong_line_is_truncated() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buf = BytesMut::from(&b"ABCDEFGHIJKLMNOP"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());

        buf.extend_from_slice(b"QRSTUV\r\nH\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("ABCDEFGH"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("H"));
    }

    #[test]
    fn test_decode_overlong_line_in_single_chunk() {
        let mut codec = LineCodec::with_max_length(4);
        let mut buf = BytesMut::from(&b"123456789\nQ\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("1234"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("Q"));
    }

    #[test]
    fn test_decode_eof_yields_fragment() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"QUIT"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("QUIT"));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encode_line_and_prompt() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(Reply::line("73!"), &mut buf).unwrap();
        codec.encode(Reply::prompt("> "), &mut buf).unwrap();

        assert_eq!(&buf[..], b"73!\r\n> ");
    }
}
