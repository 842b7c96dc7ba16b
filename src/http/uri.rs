//! Splitting absolute request URIs into host, port and path.

use std::fmt;

use thiserror::Error;

/// Port used when the URI does not name one.
pub const DEFAULT_PORT: u16 = 80;

/// Errors produced while resolving a request target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("URI {0:?} has no path component")]
    MissingPath(String),

    #[error("URI {uri:?} has an invalid port {port:?}")]
    InvalidPort { uri: String, port: String },

    #[error("URI {0:?} names no host")]
    MissingHost(String),
}

/// The origin server and resource a request is addressed to.
///
/// # Examples
///
/// ```
/// use cacheproxy::http::Target;
///
/// let target = Target::resolve("http://example.com:8080/a/b.html").unwrap();
/// assert_eq!(target.host, "example.com");
/// assert_eq!(target.port, 8080);
/// assert_eq!(target.path, "/a/b.html");
///
/// let target = Target::resolve("http://example.com/").unwrap();
/// assert_eq!(target.port, 80);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name, possibly empty for an origin-form target such as `/index.html`.
    pub host: String,
    pub port: u16,
    /// Path and query, always starting with `/`.
    pub path: String,
}

impl Target {
    /// Resolves a request URI.
    ///
    /// A scheme prefix up to and including a `//` that precedes every other
    /// `/` is skipped, so `//` later in the path or query is never taken for
    /// an authority. The host runs
    /// to the first `:` or `/`; a `:` before the first `/` introduces the
    /// port, which otherwise defaults to [`DEFAULT_PORT`]. The path is
    /// everything from the first `/` on.
    ///
    /// # Errors
    ///
    /// - [`UriError::MissingPath`] if there is no `/` after the host.
    /// - [`UriError::InvalidPort`] if the port is not a number in `1..=65535`.
    pub fn resolve(uri: &str) -> Result<Self, UriError> {
        let authority_start = match (uri.find("//"), uri.find('/')) {
            (Some(slashes), Some(first_slash)) if slashes == first_slash => slashes + 2,
            _ => 0,
        };
        let rest = &uri[authority_start..];

        let slash = rest
            .find('/')
            .ok_or_else(|| UriError::MissingPath(uri.to_owned()))?;
        let (authority, path) = rest.split_at(slash);

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host, parse_port(uri, port)?),
            None => (authority, DEFAULT_PORT),
        };

        Ok(Self {
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }

    /// Returns `true` when the URI carried no host, e.g. `GET /index.html`.
    pub fn is_relative(&self) -> bool {
        self.host.is_empty()
    }

    /// Fills in host and port from an authority such as a `Host` header value.
    ///
    /// # Errors
    ///
    /// [`UriError::MissingHost`] if `authority` has an empty host,
    /// [`UriError::InvalidPort`] if its port is not valid.
    pub fn with_authority(mut self, authority: &str) -> Result<Self, UriError> {
        let authority = authority.trim();
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, parse_port(authority, port)?),
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(UriError::MissingHost(authority.to_owned()));
        }
        self.host = host.to_owned();
        self.port = port;
        Ok(self)
    }

    /// Returns `host:port`, the address dialled for this target.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the key under which this resource is cached.
    pub fn cache_key(&self) -> String {
        format!("{}:{}{}", self.host, self.port, self.path)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}

fn parse_port(uri: &str, port: &str) -> Result<u16, UriError> {
    port.parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or_else(|| UriError::InvalidPort {
            uri: uri.to_owned(),
            port: port.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_scheme_host_port_path() {
        let t = Target::resolve("http://localhost:15213/home.html?x=1").unwrap();
        assert_eq!(t.host, "localhost");
        assert_eq!(t.port, 15213);
        assert_eq!(t.path, "/home.html?x=1");
        assert_eq!(t.cache_key(), "localhost:15213/home.html?x=1");
    }

    #[test]
    fn default_port_without_colon() {
        let t = Target::resolve("http://www.cmu.edu/hub/index.html").unwrap();
        assert_eq!(t.authority(), "www.cmu.edu:80");
        assert_eq!(t.path, "/hub/index.html");
    }

    #[test]
    fn no_scheme_means_host_starts_at_beginning() {
        let t = Target::resolve("example.com:81/x").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 81);
    }

    #[test]
    fn colon_after_slash_is_part_of_path() {
        let t = Target::resolve("http://example.com/a:b").unwrap();
        assert_eq!(t.host, "example.com");
        assert_eq!(t.port, 80);
        assert_eq!(t.path, "/a:b");
    }

    #[test]
    fn origin_form_is_relative() {
        let t = Target::resolve("/foo.html").unwrap();
        assert!(t.is_relative());
        assert_eq!(t.path, "/foo.html");

        let t = t.with_authority("example.com:8000").unwrap();
        assert_eq!(t.authority(), "example.com:8000");
    }

    #[test]
    fn url_in_query_of_origin_form_stays_relative() {
        let t = Target::resolve("/redirect?to=http://evil.test/steal").unwrap();
        assert!(t.is_relative());
        assert_eq!(t.path, "/redirect?to=http://evil.test/steal");

        let t = Target::resolve("http://a.test/go?next=http://b.test/x").unwrap();
        assert_eq!(t.host, "a.test");
        assert_eq!(t.path, "/go?next=http://b.test/x");
    }

    #[test]
    fn missing_path_is_rejected() {
        assert_eq!(
            Target::resolve("http://example.com"),
            Err(UriError::MissingPath("http://example.com".into()))
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(matches!(
            Target::resolve("http://example.com:http/"),
            Err(UriError::InvalidPort { .. })
        ));
        assert!(matches!(
            Target::resolve("http://example.com:0/"),
            Err(UriError::InvalidPort { .. })
        ));
    }

    #[test]
    fn empty_authority_is_rejected() {
        let t = Target::resolve("/x").unwrap();
        assert_eq!(
            t.with_authority(" "),
            Err(UriError::MissingHost(String::new()))
        );
    }
}
