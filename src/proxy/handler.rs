//! Per-connection request handling.
//!
//! A [`ConnectionHandler`] owns both halves of one client connection and
//! serves exactly one request on it: from the cache when possible, otherwise
//! by relaying an origin exchange and offering the body to the cache after
//! the client has it. The connection is closed on every exit path.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tracing::debug;

use crate::cache::Admission;
use crate::http::codec::{CodecError, MessageReader, MessageWriter};
use crate::http::{Method, Request, Target};

use super::{OriginConnection, Proxy, ProxyError, rewrite_headers};

/// How a request was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Rendered from a cached body.
    CacheHit,
    /// Relayed from the origin.
    Forwarded {
        status: u16,
        /// Whether the body was admitted to the cache.
        cached: bool,
    },
}

/// Serves a single request on one client connection.
pub struct ConnectionHandler<R, W> {
    proxy: Proxy,
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    response_started: bool,
}

impl ConnectionHandler<OwnedReadHalf, OwnedWriteHalf> {
    pub fn from_stream(proxy: Proxy, stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::new(proxy, read_half, write_half)
    }
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(proxy: Proxy, reader: R, writer: W) -> Self {
        let limits = proxy.config().frame_limits();
        Self {
            proxy,
            reader: MessageReader::new(reader, limits),
            writer: MessageWriter::new(writer, limits),
            response_started: false,
        }
    }

    /// Serves the request and closes the connection.
    ///
    /// Failures before any response byte was written are reported to the
    /// client with an error page; later failures just end the connection.
    pub async fn run(mut self) -> Result<Outcome, ProxyError> {
        let result = self.serve().await;

        if let Err(err) = &result {
            if !self.response_started {
                if let Some(page) = err.error_page() {
                    debug!(status = ?err.status(), "sending error page");
                    let _ = self.writer.write_raw(&page.into_bytes()).await;
                }
            }
        }
        let _ = self.writer.shutdown().await;

        result
    }

    async fn serve(&mut self) -> Result<Outcome, ProxyError> {
        let head_timeout = self.proxy.config().head_timeout();
        let request = timeout(head_timeout, Request::read_from(&mut self.reader))
            .await
            .map_err(|_| ProxyError::Client(CodecError::Timeout(head_timeout)))??;
        debug!(method = %request.method(), target = %request.target(), "request received");

        if !request.method().is_supported() {
            return Err(ProxyError::UnsupportedMethod(
                request.method().as_str().to_owned(),
            ));
        }

        let target = self.proxy.resolve_target(&request)?;
        let key = target.cache_key();

        if let Some(entry) = self.proxy.cache().lookup(&key) {
            debug!(key = %key, size = entry.size(), "cache hit");
            let mut response = entry.render();
            if *request.method() == Method::Head {
                response = response.head_only();
            }
            self.response_started = true;
            self.writer
                .write_raw(&response.into_bytes())
                .await
                .map_err(ProxyError::Client)?;
            return Ok(Outcome::CacheHit);
        }

        debug!(key = %key, "cache miss");
        self.forward(&request, &target, key).await
    }

    async fn forward(
        &mut self,
        request: &Request,
        target: &Target,
        key: String,
    ) -> Result<Outcome, ProxyError> {
        let config = self.proxy.config();
        let addr = self.proxy.origin_addr(target);
        let max_object_size = self.proxy.cache().max_object_size();

        let mut origin =
            OriginConnection::connect(&addr, config.connect_timeout(), config.frame_limits())
                .await?;
        let header_block = rewrite_headers(request.header_lines(), &addr, &config.user_agent);
        origin
            .send_request(request.method(), &target.path, &header_block)
            .await?;

        let status_line = origin.read_status_line().await?;
        let status = status_line.status_code().unwrap_or_default();

        self.response_started = true;
        self.writer
            .write_raw(&status_line.raw)
            .await
            .map_err(ProxyError::Client)?;
        let content_length = origin.relay_headers(&mut self.writer).await?;

        let is_head = *request.method() == Method::Head;
        let body = if is_head || has_no_body(status) {
            None
        } else {
            match content_length {
                Some(length) if length <= max_object_size => {
                    let body = origin.read_body(length).await?;
                    self.writer
                        .write_raw(&body)
                        .await
                        .map_err(ProxyError::Client)?;
                    Some(body)
                }
                length => {
                    origin
                        .relay_body(&mut self.writer, length, max_object_size)
                        .await?
                }
            }
        };
        drop(origin);

        let cached = match body {
            Some(body) if !is_head && status == 200 => self.admit(key, body),
            _ => false,
        };
        Ok(Outcome::Forwarded { status, cached })
    }

    fn admit(&self, key: String, body: Bytes) -> bool {
        let cache = self.proxy.cache();
        let size = body.len();
        match cache.insert(key.clone(), body) {
            Admission::Stored { evicted } => {
                let stats = cache.stats();
                debug!(
                    key = %key,
                    size,
                    evicted,
                    entries = stats.entries,
                    total_size = stats.total_size,
                    hit_rate = stats.hit_rate(),
                    "cached response body"
                );
                true
            }
            Admission::TooLarge => {
                debug!(key = %key, size, "response body too large to cache");
                false
            }
        }
    }
}

/// Statuses whose responses never carry a body.
fn has_no_body(status: u16) -> bool {
    matches!(status, 100..=199 | 204 | 304)
}
