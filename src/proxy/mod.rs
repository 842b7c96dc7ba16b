//! The forwarding proxy: per-connection request handling, origin exchanges
//! and the error taxonomy that maps failures onto client-facing responses.

mod handler;
mod origin;
mod rewrite;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::ObjectCache;
use crate::config::ProxyConfig;
use crate::http::codec::CodecError;
use crate::http::response::error_page;
use crate::http::{Request, RequestError, Response, StatusCode, Target, UriError};

pub use handler::{ConnectionHandler, Outcome};
pub use origin::{OriginConnection, request_line};
pub use rewrite::rewrite_headers;

/// Everything that can end a proxied connection early.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("method {0} is not supported")]
    UnsupportedMethod(String),

    #[error("malformed request URI: {0}")]
    MalformedUri(#[from] UriError),

    #[error("malformed request: {0}")]
    BadRequest(RequestError),

    #[error("client connection: {0}")]
    Client(CodecError),

    #[error("origin connection: {0}")]
    Origin(CodecError),

    #[error("cannot connect to origin {addr}: {source}")]
    OriginConnect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connecting to origin {addr} timed out after {timeout:?}")]
    OriginConnectTimeout { addr: String, timeout: Duration },
}

impl From<RequestError> for ProxyError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Framing(codec) => Self::Client(codec),
            other => Self::BadRequest(other),
        }
    }
}

impl ProxyError {
    /// Status reported to the client, or `None` when no response can or
    /// should be written (the client went away or stopped mid-request).
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnsupportedMethod(_) => Some(StatusCode::NotImplemented),
            Self::MalformedUri(_) | Self::BadRequest(_) => Some(StatusCode::BadRequest),
            Self::Client(err) => match err {
                CodecError::Timeout(_) => Some(StatusCode::RequestTimeout),
                CodecError::LineTooLong { .. }
                | CodecError::TooManyHeaders { .. }
                | CodecError::Malformed(_) => Some(StatusCode::BadRequest),
                _ => None,
            },
            Self::Origin(err) if err.is_timeout() => Some(StatusCode::GatewayTimeout),
            Self::Origin(_) | Self::OriginConnect { .. } => Some(StatusCode::BadGateway),
            Self::OriginConnectTimeout { .. } => Some(StatusCode::GatewayTimeout),
        }
    }

    /// Builds the HTML error response for this failure, if one is due.
    ///
    /// ```
    /// use cacheproxy::proxy::ProxyError;
    ///
    /// let page = ProxyError::UnsupportedMethod("POST".into()).error_page().unwrap();
    /// let wire = page.into_bytes();
    /// assert!(wire.starts_with(b"HTTP/1.0 501 Not implemented\r\n"));
    /// ```
    pub fn error_page(&self) -> Option<Response> {
        let status = self.status()?;
        let page = match self {
            Self::UnsupportedMethod(method) => error_page(
                status,
                "Not implemented",
                "Proxy does not implement this method",
                method,
            ),
            Self::MalformedUri(err) => error_page(
                status,
                "Bad request",
                "Proxy could not parse the request URI",
                &err.to_string(),
            ),
            Self::BadRequest(err) => error_page(
                status,
                "Bad request",
                "Proxy could not parse the request",
                &err.to_string(),
            ),
            Self::Client(err) if status == StatusCode::RequestTimeout => error_page(
                status,
                "Request timeout",
                "Proxy did not receive a complete request in time",
                &err.to_string(),
            ),
            Self::Client(err) => error_page(
                status,
                "Bad request",
                "Proxy could not read the request",
                &err.to_string(),
            ),
            Self::OriginConnect { addr, .. } => error_page(
                status,
                "Bad Gateway",
                "Failed to establish connection with the end server",
                addr,
            ),
            Self::OriginConnectTimeout { addr, .. } => error_page(
                status,
                "Gateway Timeout",
                "End server did not accept the connection in time",
                addr,
            ),
            Self::Origin(err) if status == StatusCode::GatewayTimeout => error_page(
                status,
                "Gateway Timeout",
                "End server did not respond in time",
                &err.to_string(),
            ),
            Self::Origin(err) => error_page(
                status,
                "Bad Gateway",
                "Invalid response from the end server",
                &err.to_string(),
            ),
        };
        Some(page)
    }
}

/// State shared by every connection task: the cache and the configuration.
#[derive(Debug, Clone)]
pub struct Proxy {
    cache: Arc<ObjectCache>,
    config: Arc<ProxyConfig>,
}

impl Proxy {
    /// Creates a proxy with an empty cache sized from `config`.
    pub fn new(config: ProxyConfig) -> Self {
        let cache = ObjectCache::new(config.max_cache_size, config.max_object_size);
        Self::with_cache(config, Arc::new(cache))
    }

    pub fn with_cache(config: ProxyConfig, cache: Arc<ObjectCache>) -> Self {
        Self {
            cache,
            config: Arc::new(config),
        }
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Resolves the origin and resource a request is addressed to.
    ///
    /// Absolute URIs name the origin directly. For origin-form targets such
    /// as `/index.html` the `Host` header supplies it, then the configured
    /// origin override.
    ///
    /// # Errors
    ///
    /// [`ProxyError::MalformedUri`] if the URI has no path or no origin can
    /// be determined.
    pub fn resolve_target(&self, request: &Request) -> Result<Target, ProxyError> {
        let target = Target::resolve(request.target())?;
        if !target.is_relative() {
            return Ok(target);
        }

        let authority = request
            .headers()
            .get("Host")
            .or(self.config.origin_override.as_deref())
            .ok_or_else(|| UriError::MissingHost(request.target().to_owned()))?;
        Ok(target.with_authority(authority)?)
    }

    /// Address dialled for `target`: the override when configured.
    pub fn origin_addr(&self, target: &Target) -> String {
        match &self.config.origin_override {
            Some(addr) => addr.clone(),
            None => target.authority(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn proxy_with_override(addr: Option<&str>) -> Proxy {
        Proxy::new(ProxyConfig {
            origin_override: addr.map(str::to_owned),
            ..ProxyConfig::default()
        })
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (ProxyError::UnsupportedMethod("PUT".into()), Some(501)),
            (ProxyError::MalformedUri(UriError::MissingPath("x".into())), Some(400)),
            (ProxyError::Client(CodecError::Timeout(Duration::from_secs(1))), Some(408)),
            (ProxyError::Client(CodecError::LineTooLong { limit: 8 }), Some(400)),
            (ProxyError::Client(CodecError::UnexpectedEof), None),
            (
                ProxyError::Client(CodecError::Write(io::ErrorKind::BrokenPipe.into())),
                None,
            ),
            (ProxyError::Origin(CodecError::Malformed("x".into())), Some(502)),
            (ProxyError::Origin(CodecError::Timeout(Duration::from_secs(1))), Some(504)),
            (
                ProxyError::OriginConnect {
                    addr: "a:1".into(),
                    source: io::ErrorKind::ConnectionRefused.into(),
                },
                Some(502),
            ),
            (
                ProxyError::OriginConnectTimeout {
                    addr: "a:1".into(),
                    timeout: Duration::from_secs(1),
                },
                Some(504),
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status().map(StatusCode::as_u16), expected, "{err}");
        }
    }

    #[test]
    fn framing_errors_from_request_are_client_errors() {
        let err = ProxyError::from(RequestError::Framing(CodecError::UnexpectedEof));
        assert!(matches!(err, ProxyError::Client(CodecError::UnexpectedEof)));
        let err = ProxyError::from(RequestError::Incomplete);
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }

    #[test]
    fn connect_failure_page_names_address() {
        let err = ProxyError::OriginConnect {
            addr: "origin.test:81".into(),
            source: io::ErrorKind::ConnectionRefused.into(),
        };
        let wire = err.error_page().unwrap().into_bytes();
        let text = String::from_utf8_lossy(&wire);
        assert!(text.starts_with("HTTP/1.0 502 Bad Gateway\r\n"));
        assert!(text.contains("origin.test:81"));
    }

    #[test]
    fn no_page_when_client_is_gone() {
        assert!(ProxyError::Client(CodecError::UnexpectedEof).error_page().is_none());
    }

    #[test]
    fn absolute_uri_wins_over_host_header() {
        let proxy = proxy_with_override(None);
        let req = request("GET http://a.test:8080/x HTTP/1.0\r\nHost: b.test\r\n\r\n");
        let target = proxy.resolve_target(&req).unwrap();
        assert_eq!(target.authority(), "a.test:8080");
        assert_eq!(proxy.origin_addr(&target), "a.test:8080");
    }

    #[test]
    fn relative_uri_uses_host_header() {
        let proxy = proxy_with_override(Some("127.0.0.1:9"));
        let req = request("GET /foo.html HTTP/1.0\r\nhost: example.com\r\n\r\n");
        let target = proxy.resolve_target(&req).unwrap();
        assert_eq!(target.cache_key(), "example.com:80/foo.html");
        assert_eq!(proxy.origin_addr(&target), "127.0.0.1:9");

        let proxy = proxy_with_override(None);
        let req = request(
            "GET /redirect?to=http://evil.test/steal HTTP/1.0\r\nHost: example.com\r\n\r\n",
        );
        let target = proxy.resolve_target(&req).unwrap();
        assert_eq!(target.host, "example.com");
        assert_eq!(target.path, "/redirect?to=http://evil.test/steal");
        assert_eq!(proxy.origin_addr(&target), "example.com:80");
    }

    #[test]
    fn relative_uri_falls_back_to_override() {
        let proxy = proxy_with_override(Some("127.0.0.1:9"));
        let req = request("GET /foo.html HTTP/1.0\r\n\r\n");
        let target = proxy.resolve_target(&req).unwrap();
        assert_eq!(target.authority(), "127.0.0.1:9");
    }

    #[test]
    fn relative_uri_without_origin_is_malformed() {
        let proxy = proxy_with_override(None);
        let req = request("GET /foo.html HTTP/1.0\r\n\r\n");
        assert!(matches!(
            proxy.resolve_target(&req),
            Err(ProxyError::MalformedUri(UriError::MissingHost(_)))
        ));
    }

    #[test]
    fn uri_without_path_is_malformed() {
        let proxy = proxy_with_override(None);
        let req = request("GET http://example.com HTTP/1.0\r\n\r\n");
        assert!(matches!(
            proxy.resolve_target(&req),
            Err(ProxyError::MalformedUri(UriError::MissingPath(_)))
        ));
    }
}
