//! One request/response exchange with an origin server.
//!
//! Every exchange uses a fresh TCP connection that is closed when the
//! [`OriginConnection`] is dropped; nothing is pooled.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::debug;

use crate::http::codec::{self, CodecError, FrameLimits, MessageReader, MessageWriter, StartLine};
use crate::http::Method;

use super::ProxyError;

/// Size of the buffer used when streaming bodies through.
const RELAY_CHUNK_SIZE: usize = 16 * 1024;

/// An open connection to an origin server.
pub struct OriginConnection {
    addr: String,
    reader: MessageReader<OwnedReadHalf>,
    writer: MessageWriter<OwnedWriteHalf>,
}

impl OriginConnection {
    /// Connects to `addr` (`host:port`), resolving the name if needed.
    ///
    /// # Errors
    ///
    /// [`ProxyError::OriginConnect`] if the connection is refused or the name
    /// does not resolve, [`ProxyError::OriginConnectTimeout`] if
    /// `connect_timeout` elapses first.
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        limits: FrameLimits,
    ) -> Result<Self, ProxyError> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ProxyError::OriginConnectTimeout {
                addr: addr.to_owned(),
                timeout: connect_timeout,
            })?
            .map_err(|source| ProxyError::OriginConnect {
                addr: addr.to_owned(),
                source,
            })?;

        debug!(origin = %addr, "origin connected");
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            addr: addr.to_owned(),
            reader: MessageReader::new(read_half, limits),
            writer: MessageWriter::new(write_half, limits),
        })
    }

    /// Sends `METHOD PATH HTTP/1.0` followed by an already rewritten header block.
    pub async fn send_request(
        &mut self,
        method: &Method,
        path: &str,
        header_block: &[u8],
    ) -> Result<(), ProxyError> {
        let mut head = request_line(method, path).into_bytes();
        head.extend_from_slice(header_block);
        self.writer
            .write_raw(&head)
            .await
            .map_err(ProxyError::Origin)
    }

    /// Reads the response status line.
    ///
    /// # Errors
    ///
    /// [`ProxyError::Origin`] if the line cannot be read or is not a status line.
    pub async fn read_status_line(&mut self) -> Result<StartLine, ProxyError> {
        let line = self
            .reader
            .read_start_line()
            .await
            .map_err(ProxyError::Origin)?;
        if line.status_code().is_none() {
            return Err(ProxyError::Origin(CodecError::Malformed(format!(
                "bad status line {:?}",
                String::from_utf8_lossy(&line.raw).trim_end()
            ))));
        }
        Ok(line)
    }

    /// Copies header lines to `client` one by one as they arrive, through the
    /// terminating blank line.
    ///
    /// Returns the value of the last header line mentioning `Content-Length`.
    pub async fn relay_headers<W>(
        &mut self,
        client: &mut MessageWriter<W>,
    ) -> Result<Option<usize>, ProxyError>
    where
        W: AsyncWrite + Unpin,
    {
        let max_lines = self.reader.limits().max_header_lines;
        let mut content_length = None;
        let mut count = 0;

        while let Some(line) = self
            .reader
            .read_header_line()
            .await
            .map_err(ProxyError::Origin)?
        {
            count += 1;
            if count > max_lines {
                return Err(ProxyError::Origin(CodecError::TooManyHeaders {
                    limit: max_lines,
                }));
            }
            if let Some(len) = codec::content_length(&line) {
                content_length = Some(len);
            }
            client.write_raw(&line).await.map_err(ProxyError::Client)?;
        }
        client.write_raw(b"\r\n").await.map_err(ProxyError::Client)?;

        Ok(content_length)
    }

    /// Reads exactly `length` body bytes.
    pub async fn read_body(&mut self, length: usize) -> Result<Bytes, ProxyError> {
        self.reader.read_body(length).await.map_err(ProxyError::Origin)
    }

    /// Streams a body to `client` chunk by chunk.
    ///
    /// With `Some(length)` exactly that many bytes are relayed; with `None`
    /// the body runs until the origin closes the connection. The relayed bytes
    /// are also collected and returned when the complete body is at most
    /// `keep_limit` bytes long.
    pub async fn relay_body<W>(
        &mut self,
        client: &mut MessageWriter<W>,
        length: Option<usize>,
        keep_limit: usize,
    ) -> Result<Option<Bytes>, ProxyError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut chunk = vec![0u8; RELAY_CHUNK_SIZE];
        let mut kept = Some(BytesMut::new());
        let mut relayed = 0usize;

        loop {
            let want = match length {
                Some(total) if relayed == total => break,
                Some(total) => (total - relayed).min(chunk.len()),
                None => chunk.len(),
            };
            let n = self
                .reader
                .read_chunk(&mut chunk[..want])
                .await
                .map_err(ProxyError::Origin)?;
            if n == 0 {
                match length {
                    Some(expected) => {
                        return Err(ProxyError::Origin(CodecError::TruncatedBody {
                            expected,
                            received: relayed,
                        }));
                    }
                    None => break,
                }
            }

            client
                .write_raw(&chunk[..n])
                .await
                .map_err(ProxyError::Client)?;
            relayed += n;

            if relayed > keep_limit {
                kept = None;
            } else if let Some(buf) = kept.as_mut() {
                buf.extend_from_slice(&chunk[..n]);
            }
        }

        debug!(origin = %self.addr, bytes = relayed, "body relayed");
        Ok(kept.map(BytesMut::freeze))
    }
}

/// Formats the request line sent to the origin, always as HTTP/1.0.
pub fn request_line(method: &Method, path: &str) -> String {
    format!("{method} {path} HTTP/1.0\r\n")
}
