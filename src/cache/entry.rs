//! Cached response bodies and their rendering back into responses.

use bytes::Bytes;

use crate::http::{Response, StatusCode};

/// Value of the `Server` header on responses rendered from the cache.
pub const SERVER_NAME: &str = "cacheproxy";

/// A response body held by the cache.
///
/// Only the body is cached; the header block is regenerated by
/// [`CacheEntry::render`] on every hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub body: Bytes,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, body: Bytes) -> Self {
        Self {
            key: key.into(),
            body,
        }
    }

    /// Size in bytes charged against the cache budget.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Synthesizes a fresh `200 OK` response carrying the cached body.
    ///
    /// ```
    /// use bytes::Bytes;
    /// use cacheproxy::cache::CacheEntry;
    ///
    /// let entry = CacheEntry::new("a.test:80/", Bytes::from_static(b"hello"));
    /// let wire = entry.render().into_bytes();
    /// assert_eq!(
    ///     &wire[..],
    ///     &b"HTTP/1.0 200 OK\r\nServer: cacheproxy\r\nConnection: close\r\nContent-length: 5\r\n\r\nhello"[..]
    /// );
    /// ```
    pub fn render(&self) -> Response {
        Response::new(StatusCode::Ok)
            .header("Server", SERVER_NAME)
            .header("Connection", "close")
            .body_bytes(self.body.clone())
    }
}
