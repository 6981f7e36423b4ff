//! JSON-RPC message framing for the MCP stdio transport.
//!
//! Supports two framing modes:
//!
//! - **Newline-delimited**: one JSON object per `\n`-terminated line (the MCP
//!   stdio convention)
//! - **Content-Length**: `Content-Length: N\r\n\r\n<N bytes>` (LSP-style, still
//!   emitted by some clients)
//!
//! [`MessageReader`] auto-detects the framing of every incoming message and
//! remembers the last one seen; the server answers in that same framing via
//! [`write_message`].

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Wire framing of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingMode {
    /// One JSON document per line.
    #[default]
    Newline,
    /// `Content-Length` header block followed by the body.
    ContentLength,
}

/// Reads MCP messages from an async reader, auto-detecting Content-Length vs newline framing.
///
/// On each call to [`MessageReader::next_message`], the reader inspects the next line:
/// - If it starts with `Content-Length:`, it parses the header and reads the body.
/// - Otherwise it treats the line as a complete JSON message.
pub struct MessageReader<R> {
    reader: BufReader<R>,
    buf: String,
    mode: FramingMode,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: String::new(),
            mode: FramingMode::default(),
        }
    }

    /// Framing of the most recently read message ([`FramingMode::Newline`]
    /// before the first one).
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// Read the next JSON-RPC message body, returning `None` on EOF.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails or Content-Length parsing encounters
    /// malformed headers.
    pub async fn next_message(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }

            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("Content-Length:") {
                let len: usize = rest
                    .trim()
                    .parse()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

                // Consume remaining headers up to the blank separator line.
                loop {
                    self.buf.clear();
                    let header_n = self.reader.read_line(&mut self.buf).await?;
                    if header_n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "EOF in Content-Length headers",
                        ));
                    }
                    if self.buf.trim().is_empty() {
                        break;
                    }
                }

                let mut body = vec![0u8; len];
                self.reader.read_exact(&mut body).await?;
                let msg =
                    String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                self.mode = FramingMode::ContentLength;
                return Ok(Some(msg));
            }

            self.mode = FramingMode::Newline;
            return Ok(Some(trimmed.to_string()));
        }
    }
}

/// Encode a JSON message in Content-Length framing format.
pub fn encode_content_length(json: &str) -> Vec<u8> {
    let header = format!("Content-Length: {}\r\n\r\n", json.len());
    let mut buf = Vec::with_capacity(header.len() + json.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(json.as_bytes());
    buf
}

/// Encode a JSON message as a single `\n`-terminated line.
///
/// `serde_json::to_string` never emits raw newlines, so the line is intact.
pub fn encode_newline(json: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(json.len() + 1);
    buf.extend_from_slice(json.as_bytes());
    buf.push(b'\n');
    buf
}

/// Encode `json` in the given framing.
pub fn encode(mode: FramingMode, json: &str) -> Vec<u8> {
    match mode {
        FramingMode::Newline => encode_newline(json),
        FramingMode::ContentLength => encode_content_length(json),
    }
}

/// Write one framed message and flush.
///
/// # Errors
///
/// Returns an I/O error if writing or flushing fails.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    mode: FramingMode,
    json: &str,
) -> io::Result<()> {
    writer.write_all(&encode(mode, json)).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parse_newline_delimited() {
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1}\n";
        let mut reader = MessageReader::new(&input[..]);
        let msg = reader.next_message().await.unwrap().unwrap();
        assert_eq!(msg, "{\"jsonrpc\":\"2.0\",\"id\":1}");
        assert_eq!(reader.mode(), FramingMode::Newline);
    }

    #[tokio::test]
    async fn parse_content_length_frame() {
        let body = r#"{"jsonrpc":"2.0","id":2}"#;
        let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let mut reader = MessageReader::new(framed.as_bytes());
        let msg = reader.next_message().await.unwrap().unwrap();
        assert_eq!(msg, body);
        assert_eq!(reader.mode(), FramingMode::ContentLength);
    }

    #[tokio::test]
    async fn parse_content_length_with_extra_header() {
        let body = r#"{"jsonrpc":"2.0","id":3}"#;
        let framed = format!(
            "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n{}",
            body.len(),
            body
        );
        let mut reader = MessageReader::new(framed.as_bytes());
        let msg = reader.next_message().await.unwrap().unwrap();
        assert_eq!(msg, body);
    }

    #[tokio::test]
    async fn mode_follows_latest_message() {
        let body = r#"{"id":2}"#;
        let input = format!(
            "{{\"id\":1}}\nContent-Length: {}\r\n\r\n{}{{\"id\":3}}\n",
            body.len(),
            body
        );
        let mut reader = MessageReader::new(input.as_bytes());
        assert_eq!(reader.next_message().await.unwrap().unwrap(), r#"{"id":1}"#);
        assert_eq!(reader.mode(), FramingMode::Newline);
        assert_eq!(reader.next_message().await.unwrap().unwrap(), body);
        assert_eq!(reader.mode(), FramingMode::ContentLength);
        assert_eq!(reader.next_message().await.unwrap().unwrap(), r#"{"id":3}"#);
        assert_eq!(reader.mode(), FramingMode::Newline);
    }

    #[tokio::test]
    async fn truncated_headers_are_an_error() {
        let mut reader = MessageReader::new(&b"Content-Length: 10\r\n"[..]);
        let err = reader.next_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn bad_length_is_invalid_data() {
        let mut reader = MessageReader::new(&b"Content-Length: lots\r\n\r\n{}"[..]);
        let err = reader.next_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn eof_returns_none() {
        let mut reader = MessageReader::new(&b""[..]);
        assert!(reader.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_lines_skipped() {
        let input = b"\n\n{\"id\":1}\n\n";
        let mut reader = MessageReader::new(&input[..]);
        let msg = reader.next_message().await.unwrap().unwrap();
        assert_eq!(msg, "{\"id\":1}");
        assert!(reader.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_message_uses_requested_framing() {
        let mut buf = Vec::new();
        write_message(&mut buf, FramingMode::Newline, r#"{"id":1}"#)
            .await
            .unwrap();
        assert_eq!(buf, b"{\"id\":1}\n");

        let mut buf = Vec::new();
        write_message(&mut buf, FramingMode::ContentLength, r#"{"id":1}"#)
            .await
            .unwrap();
        assert_eq!(buf, b"Content-Length: 8\r\n\r\n{\"id\":1}");
    }

    #[tokio::test]
    async fn content_length_frame_is_readable() {
        let original = r#"{"jsonrpc":"2.0","id":99,"method":"ping"}"#;
        let encoded = encode_content_length(original);
        let mut reader = MessageReader::new(&encoded[..]);
        assert_eq!(reader.next_message().await.unwrap().unwrap(), original);
    }
}
