//! Line-oriented HTTP/1.0 message framing over async byte streams.
//!
//! [`MessageReader`] reads start lines, header lines and length-delimited
//! bodies; [`MessageWriter`] writes raw bytes. Both enforce a per-operation
//! deadline so a stalled peer only ever blocks the task that owns the stream.
//! They are used identically on client-facing and origin-facing sockets.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

/// Default maximum length of a single start or header line, terminator included.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// Default maximum number of header lines in one message head.
pub const DEFAULT_MAX_HEADER_LINES: usize = 100;

/// Framing failures, on either side of the proxy.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("line exceeds {limit} bytes without a terminator")]
    LineTooLong { limit: usize },

    #[error("header block exceeds {limit} lines")]
    TooManyHeaders { limit: usize },

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("peer closed the connection mid-message")]
    UnexpectedEof,

    #[error("body truncated: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: usize, received: usize },

    #[error("no progress within {0:?}")]
    Timeout(Duration),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
}

impl CodecError {
    /// Returns `true` for failures caused by an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Size and time bounds applied by the reader and writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    pub max_line_length: usize,
    pub max_header_lines: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_header_lines: DEFAULT_MAX_HEADER_LINES,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

/// The three whitespace-separated fields of a request or status line.
///
/// For a request line these are method, target and version; for a status
/// line they are version, status code and reason phrase. The reason phrase
/// may contain spaces and may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartLine {
    /// The line exactly as received, terminator included.
    pub raw: Vec<u8>,
    pub first: String,
    pub second: String,
    pub rest: String,
}

impl StartLine {
    /// Splits a raw start line into its fields.
    ///
    /// # Errors
    ///
    /// [`CodecError::Malformed`] if the line has fewer than two fields.
    pub fn parse(raw: Vec<u8>) -> Result<Self, CodecError> {
        let (first, second, rest) = {
            let text = String::from_utf8_lossy(&raw);
            let mut fields = text.trim_end_matches(['\r', '\n']).splitn(3, ' ');
            let first = fields.next().unwrap_or_default().trim().to_owned();
            let second = fields.next().unwrap_or_default().trim().to_owned();
            let rest = fields.next().unwrap_or_default().trim().to_owned();
            (first, second, rest)
        };

        if first.is_empty() || second.is_empty() {
            return Err(CodecError::Malformed(format!(
                "bad start line {:?}",
                String::from_utf8_lossy(&raw).trim_end()
            )));
        }
        Ok(Self {
            raw,
            first,
            second,
            rest,
        })
    }

    /// Interprets the line as a status line and returns its status code.
    pub fn status_code(&self) -> Option<u16> {
        if !self.first.starts_with("HTTP/") {
            return None;
        }
        self.second.parse().ok().filter(|code| (100..1000).contains(code))
    }
}

/// Extracts a body length from a header line whose text contains
/// `Content-Length` in any letter case.
///
/// ```
/// use cacheproxy::http::codec::content_length;
///
/// assert_eq!(content_length(b"Content-length: 5\r\n"), Some(5));
/// assert_eq!(content_length(b"CONTENT-LENGTH:12"), Some(12));
/// assert_eq!(content_length(b"Content-Type: text/html\r\n"), None);
/// ```
pub fn content_length(line: &[u8]) -> Option<usize> {
    const NEEDLE: &[u8] = b"content-length";
    let found = line
        .windows(NEEDLE.len())
        .any(|w| w.eq_ignore_ascii_case(NEEDLE));
    if !found {
        return None;
    }
    let colon = line.iter().position(|&b| b == b':')?;
    std::str::from_utf8(&line[colon + 1..])
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Returns `true` for the empty line that terminates a header block.
fn is_blank(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

/// Buffered, deadline-aware reader for HTTP/1.0 message parts.
pub struct MessageReader<R> {
    inner: BufReader<R>,
    limits: FrameLimits,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R, limits: FrameLimits) -> Self {
        Self {
            inner: BufReader::new(inner),
            limits,
        }
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }

    /// Reads one line, terminator included.
    ///
    /// # Errors
    ///
    /// - [`CodecError::LineTooLong`] if no `\n` arrives within the line limit.
    /// - [`CodecError::UnexpectedEof`] if the stream ends first.
    /// - [`CodecError::Timeout`] if the read deadline expires.
    pub async fn read_line(&mut self) -> Result<Vec<u8>, CodecError> {
        let limit = self.limits.max_line_length;
        let mut line = Vec::with_capacity(128);
        let deadline = self.limits.read_timeout;
        let mut limited = (&mut self.inner).take(limit as u64);
        let n = timeout(deadline, limited.read_until(b'\n', &mut line))
            .await
            .map_err(|_| CodecError::Timeout(deadline))?
            .map_err(CodecError::Read)?;

        if line.ends_with(b"\n") {
            return Ok(line);
        }
        if n >= limit {
            Err(CodecError::LineTooLong { limit })
        } else {
            Err(CodecError::UnexpectedEof)
        }
    }

    /// Reads and splits a request or status line.
    pub async fn read_start_line(&mut self) -> Result<StartLine, CodecError> {
        let raw = self.read_line().await?;
        StartLine::parse(raw)
    }

    /// Reads one header line, or `None` at the blank line ending the block.
    pub async fn read_header_line(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        let line = self.read_line().await?;
        Ok(if is_blank(&line) { None } else { Some(line) })
    }

    /// Reads header lines up to and including the terminating blank line.
    ///
    /// Lines are returned in order, byte for byte, with their terminators
    /// stripped.
    pub async fn read_header_block(&mut self) -> Result<Vec<Bytes>, CodecError> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_header_line().await? {
            if lines.len() == self.limits.max_header_lines {
                return Err(CodecError::TooManyHeaders {
                    limit: self.limits.max_header_lines,
                });
            }
            let end = line.len() - if line.ends_with(b"\r\n") { 2 } else { 1 };
            lines.push(Bytes::copy_from_slice(&line[..end]));
        }
        Ok(lines)
    }

    /// Reads exactly `length` body bytes.
    ///
    /// # Errors
    ///
    /// [`CodecError::TruncatedBody`] if the stream closes before `length`
    /// bytes have arrived.
    pub async fn read_body(&mut self, length: usize) -> Result<Bytes, CodecError> {
        let deadline = self.limits.read_timeout;
        let mut body = BytesMut::with_capacity(length);
        while body.len() < length {
            let remaining = (length - body.len()) as u64;
            let mut limited = (&mut self.inner).take(remaining);
            let n = timeout(deadline, limited.read_buf(&mut body))
                .await
                .map_err(|_| CodecError::Timeout(deadline))?
                .map_err(CodecError::Read)?;
            if n == 0 {
                return Err(CodecError::TruncatedBody {
                    expected: length,
                    received: body.len(),
                });
            }
        }
        Ok(body.freeze())
    }

    /// Reads whatever is available into `buf`; `0` means end of stream.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let deadline = self.limits.read_timeout;
        timeout(deadline, self.inner.read(buf))
            .await
            .map_err(|_| CodecError::Timeout(deadline))?
            .map_err(CodecError::Read)
    }
}

/// Deadline-aware writer for raw message bytes.
pub struct MessageWriter<W> {
    inner: W,
    write_timeout: Duration,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W, limits: FrameLimits) -> Self {
        Self {
            inner,
            write_timeout: limits.write_timeout,
        }
    }

    /// Writes all of `bytes` and flushes.
    ///
    /// # Errors
    ///
    /// [`CodecError::Write`] if the peer is gone, [`CodecError::Timeout`] if
    /// the write deadline expires.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let deadline = self.write_timeout;
        let inner = &mut self.inner;
        let write = async move {
            inner.write_all(bytes).await?;
            inner.flush().await
        };
        timeout(deadline, write)
            .await
            .map_err(|_| CodecError::Timeout(deadline))?
            .map_err(CodecError::Write)
    }

    /// Shuts down the write direction, signalling end of message to the peer.
    pub async fn shutdown(&mut self) -> Result<(), CodecError> {
        let deadline = self.write_timeout;
        timeout(deadline, self.inner.shutdown())
            .await
            .map_err(|_| CodecError::Timeout(deadline))?
            .map_err(CodecError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(data: &'static [u8]) -> MessageReader<&'static [u8]> {
        MessageReader::new(data, FrameLimits::default())
    }

    #[tokio::test]
    async fn reads_request_head() {
        let mut r = reader(b"GET http://a.test/x HTTP/1.0\r\nHost: a.test\r\nAccept: */*\r\n\r\n");
        let start = r.read_start_line().await.unwrap();
        assert_eq!(start.first, "GET");
        assert_eq!(start.second, "http://a.test/x");
        assert_eq!(start.rest, "HTTP/1.0");

        let headers = r.read_header_block().await.unwrap();
        assert_eq!(
            headers,
            vec![Bytes::from_static(b"Host: a.test"), Bytes::from_static(b"Accept: */*")]
        );
    }

    #[tokio::test]
    async fn header_block_keeps_non_utf8_bytes() {
        let mut r = reader(b"X-Name: caf\xe9\n\r\n");
        let headers = r.read_header_block().await.unwrap();
        assert_eq!(&headers[0][..], b"X-Name: caf\xe9");
    }

    #[tokio::test]
    async fn status_line_keeps_reason_spaces() {
        let mut r = reader(b"HTTP/1.0 404 Not Found\r\n");
        let start = r.read_start_line().await.unwrap();
        assert_eq!(start.status_code(), Some(404));
        assert_eq!(start.rest, "Not Found");
        assert_eq!(start.raw, b"HTTP/1.0 404 Not Found\r\n");
    }

    #[tokio::test]
    async fn line_too_long() {
        let limits = FrameLimits {
            max_line_length: 8,
            ..FrameLimits::default()
        };
        let mut r = MessageReader::new(&b"GET /a/very/long/path HTTP/1.0\r\n"[..], limits);
        assert!(matches!(
            r.read_start_line().await,
            Err(CodecError::LineTooLong { limit: 8 })
        ));
    }

    #[tokio::test]
    async fn eof_before_terminator() {
        let mut r = reader(b"GET / HTTP/1.0");
        assert!(matches!(r.read_line().await, Err(CodecError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn too_many_headers() {
        let limits = FrameLimits {
            max_header_lines: 1,
            ..FrameLimits::default()
        };
        let mut r = MessageReader::new(&b"A: 1\r\nB: 2\r\n\r\n"[..], limits);
        assert!(matches!(
            r.read_header_block().await,
            Err(CodecError::TooManyHeaders { limit: 1 })
        ));
    }

    #[tokio::test]
    async fn body_exact_and_truncated() {
        let mut r = reader(b"helloworld");
        assert_eq!(&r.read_body(5).await.unwrap()[..], b"hello");
        assert_eq!(&r.read_body(5).await.unwrap()[..], b"world");

        let mut r = reader(b"abc");
        assert!(matches!(
            r.read_body(10).await,
            Err(CodecError::TruncatedBody {
                expected: 10,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn read_timeout_fires() {
        let (_peer, local) = tokio::io::duplex(64);
        let limits = FrameLimits {
            read_timeout: Duration::from_millis(20),
            ..FrameLimits::default()
        };
        let mut r = MessageReader::new(local, limits);
        let err = r.read_line().await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn writer_round_trip() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut w = MessageWriter::new(client, FrameLimits::default());
        w.write_raw(b"HTTP/1.0 200 OK\r\n\r\n").await.unwrap();
        drop(w);

        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"HTTP/1.0 200 OK\r\n\r\n");
    }

    #[test]
    fn start_line_rejects_single_token() {
        assert!(StartLine::parse(b"GARBAGE\r\n".to_vec()).is_err());
    }

    #[test]
    fn content_length_variants() {
        assert_eq!(content_length(b"content-length:7\r\n"), Some(7));
        assert_eq!(content_length(b"Content-Length: nope\r\n"), None);
        assert_eq!(content_length(b"Content-Length 7\r\n"), None);
    }
}
