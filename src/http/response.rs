//! HTTP/1.0 response builder for responses the proxy generates itself.
//!
//! Relayed origin responses never pass through this type; it is used for
//! error pages and for responses rendered from the object cache.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Headers, StatusCode};

/// An HTTP/1.0 response, ready to be serialized and sent.
///
/// Headers are written in insertion order, followed by a `Content-length`
/// header computed from the body.
///
/// # Examples
///
/// ```
/// use cacheproxy::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Server", "cacheproxy")
///     .body("hello");
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
/// assert!(text.ends_with("Content-length: 5\r\n\r\nhello"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: Headers,
    body: Bytes,
    omit_body: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            body: Bytes::new(),
            omit_body: false,
        }
    }

    /// Overrides the reason phrase on the status line.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Appends a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Sets the response body from shared bytes without copying.
    #[must_use]
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Serializes headers only, keeping `Content-length` at the body size.
    /// Used to answer `HEAD` requests.
    #[must_use]
    pub fn head_only(mut self) -> Self {
        self.omit_body = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_ref(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the response into HTTP/1.0 wire format.
    pub fn into_bytes(self) -> BytesMut {
        let content_length = self.body.len();
        let reason = self
            .reason
            .as_deref()
            .unwrap_or(self.status.canonical_reason());

        let estimated_size = 64 + self.headers.len() * 48 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("HTTP/1.0 {} {reason}\r\n", self.status.as_u16()).as_bytes());
        buf.put(self.headers.to_string().as_bytes());
        buf.put(format!("Content-length: {content_length}\r\n\r\n").as_bytes());

        if !self.omit_body {
            buf.put(self.body);
        }
        buf
    }
}

/// Builds the HTML error page sent to clients.
///
/// The body embeds the status, both messages and the offending `cause`; the
/// headers are exactly `Content-type` and a `Content-length` matching the
/// body's byte length.
///
/// ```
/// use cacheproxy::http::{response::error_page, StatusCode};
///
/// let page = error_page(StatusCode::NotImplemented, "Not implemented",
///     "Proxy does not implement this method", "POST");
/// let text = String::from_utf8(page.into_bytes().to_vec()).unwrap();
/// assert!(text.starts_with("HTTP/1.0 501 Not implemented\r\nContent-type: text/html\r\n"));
/// assert!(text.contains("Not implemented"));
/// ```
pub fn error_page(status: StatusCode, short_msg: &str, long_msg: &str, cause: &str) -> Response {
    let code = status.as_u16();
    let body = format!(
        "<html><title>Proxy Error</title><body bgcolor=\"ffffff\">\r\n\
         {code}: {short_msg}\r\n\
         <p>{long_msg}: {cause}\r\n\
         <hr><em>The cacheproxy Web proxy</em>\r\n"
    );
    Response::new(status)
        .reason(short_msg)
        .header("Content-type", "text/html")
        .body(body)
}
