//! Client request-head parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

use super::codec::{CodecError, MessageReader};
use super::{Headers, Method, Version};

/// Errors that can occur while reading or parsing a request head.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head is incomplete")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error(transparent)]
    Framing(#[from] CodecError),
}

/// A parsed HTTP/1.x request head.
///
/// GET and HEAD requests carry no body, so the head is the whole request
/// as far as the proxy is concerned. The raw header lines are kept in
/// arrival order so they can be forwarded untouched.
///
/// # Examples
///
/// ```
/// use cacheproxy::http::{Method, Request};
///
/// let raw = b"GET http://example.com/index.html HTTP/1.0\r\nAccept: */*\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method(), &Method::Get);
/// assert_eq!(request.target(), "http://example.com/index.html");
/// assert_eq!(&request.header_lines()[0][..], b"Accept: */*");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: Headers,
    header_lines: Vec<Bytes>,
}

impl Request {
    /// Parses a complete request head from a byte slice.
    ///
    /// Returns the parsed `Request` and the offset just past the blank line
    /// that ends the head.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`]: the blank line has not arrived yet.
    /// - [`RequestError::Parse`]: the head is malformed.
    /// - [`RequestError::MissingField`]: method, target or version is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        // One slot per line is always enough for httparse.
        let capacity = buf.iter().filter(|&&b| b == b'\n').count().max(1);
        let mut headers = vec![httparse::EMPTY_HEADER; capacity];
        let mut raw_req = httparse::Request::new(&mut headers);

        let head_len = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()
            .unwrap_or_else(|never| match never {});

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "target" })?
            .to_owned();

        let version = raw_req
            .version
            .map(Version::from_minor)
            .ok_or(RequestError::MissingField { field: "version" })?;

        let header_lines: Vec<Bytes> = buf[..head_len]
            .split(|&b| b == b'\n')
            .skip(1)
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .map(Bytes::copy_from_slice)
            .collect();
        let decoded: Vec<_> = header_lines
            .iter()
            .map(|line| String::from_utf8_lossy(line))
            .collect();
        let headers = Headers::from_lines(decoded.iter().map(|line| line.as_ref()));

        Ok((
            Self {
                method,
                target,
                version,
                headers,
                header_lines,
            },
            head_len,
        ))
    }

    /// Reads a request line and its header block from `reader` and parses them.
    pub async fn read_from<R>(reader: &mut MessageReader<R>) -> Result<Self, RequestError>
    where
        R: AsyncRead + Unpin,
    {
        let start = reader.read_start_line().await?;
        let lines = reader.read_header_block().await?;

        let mut head = start.raw;
        for line in &lines {
            head.extend_from_slice(line);
            head.extend_from_slice(b"\r\n");
        }
        head.extend_from_slice(b"\r\n");

        Self::parse(&head).map(|(request, _)| request)
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request target exactly as sent, usually an absolute URI.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers for lookup by name.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw header lines in arrival order, terminators stripped.
    pub fn header_lines(&self) -> &[Bytes] {
        &self.header_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::codec::FrameLimits;

    #[test]
    fn parse_absolute_get() {
        let raw = b"GET http://localhost:8080/a.html HTTP/1.0\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.target(), "http://localhost:8080/a.html");
        assert_eq!(req.version(), Version::Http10);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn parse_keeps_unsupported_method() {
        let (req, _) = Request::parse(b"POST /x HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.method(), &Method::Other("POST".into()));
        assert!(req.header_lines().is_empty());
    }

    #[test]
    fn incomplete_head() {
        let raw = b"GET / HTTP/1.0\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            Request::parse(b"GET / SPDY/9\r\n\r\n"),
            Err(RequestError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn read_from_stream() {
        let data: &[u8] =
            b"HEAD http://a.test/ HTTP/1.1\r\nUser-Agent: curl\r\nProxy-Connection: keep-alive\r\n\r\n";
        let mut reader = MessageReader::new(data, FrameLimits::default());
        let req = Request::read_from(&mut reader).await.unwrap();
        assert_eq!(req.method(), &Method::Head);
        assert_eq!(req.version(), Version::Http11);
        assert_eq!(
            req.header_lines(),
            [
                Bytes::from_static(b"User-Agent: curl"),
                Bytes::from_static(b"Proxy-Connection: keep-alive"),
            ]
        );
    }

    #[test]
    fn header_bytes_are_kept_verbatim() {
        let (req, _) = Request::parse(b"GET /x HTTP/1.0\r\nX-Name: caf\xe9\r\n\r\n").unwrap();
        assert_eq!(&req.header_lines()[0][..], b"X-Name: caf\xe9");
        assert!(req.headers().contains("x-name"));
    }

    #[tokio::test]
    async fn read_from_truncated_stream() {
        let data: &[u8] = b"GET http://a.test/ HTTP/1.0\r\nHost: a";
        let mut reader = MessageReader::new(data, FrameLimits::default());
        assert!(matches!(
            Request::read_from(&mut reader).await,
            Err(RequestError::Framing(CodecError::UnexpectedEof))
        ));
    }
}
