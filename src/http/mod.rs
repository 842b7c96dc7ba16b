//! HTTP/1.0 protocol types and framing.
//!
//! This module provides the primitives shared by the client-facing and
//! origin-facing sides of the proxy: [`Method`], [`StatusCode`], [`Version`],
//! [`Headers`], the line-oriented [`codec`], request-head parsing, response
//! building and absolute-URI resolution.

use std::fmt;

pub mod codec;
pub mod headers;
pub mod request;
pub mod response;
pub mod uri;

pub use codec::{CodecError, MessageReader, MessageWriter, StartLine};
pub use headers::Headers;
pub use request::{Request, RequestError};
pub use response::Response;
pub use uri::{Target, UriError};

/// An HTTP response status code used by the proxy.
///
/// Only the codes the proxy itself generates are listed; statuses coming from
/// an origin are relayed verbatim and never converted into this type.
///
/// # Examples
///
/// ```
/// use cacheproxy::http::StatusCode;
///
/// let status = StatusCode::BadGateway;
/// assert_eq!(status.as_u16(), 502);
/// assert_eq!(status.canonical_reason(), "Bad Gateway");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 200,
    BadRequest = 400,
    RequestTimeout = 408,
    NotImplemented = 501,
    BadGateway = 502,
    GatewayTimeout = 504,
}

impl StatusCode {
    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the canonical reason phrase for this status code.
    pub fn canonical_reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::RequestTimeout => "Request Timeout",
            Self::NotImplemented => "Not Implemented",
            Self::BadGateway => "Bad Gateway",
            Self::GatewayTimeout => "Gateway Timeout",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// An HTTP request method.
///
/// The proxy only forwards `GET` and `HEAD`; every other token is kept in
/// [`Method::Other`] so it can be echoed back in the `501` error page.
///
/// # Examples
///
/// ```
/// use cacheproxy::http::Method;
///
/// let method: Method = "head".parse().unwrap();
/// assert_eq!(method, Method::Head);
/// assert!(method.is_supported());
///
/// let post: Method = "POST".parse().unwrap();
/// assert!(!post.is_supported());
/// assert_eq!(post.as_str(), "POST");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET: retrieve a representation of the target resource.
    Get,
    /// HEAD: identical to GET but without a response body.
    Head,
    /// Any other method token, preserved as sent.
    Other(String),
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Returns `true` if the proxy forwards this method.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = std::convert::Infallible;

    /// Method tokens are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("GET") {
            Self::Get
        } else if s.eq_ignore_ascii_case("HEAD") {
            Self::Head
        } else {
            Self::Other(s.to_owned())
        })
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Maps the minor version reported by `httparse` to a [`Version`].
    pub fn from_minor(minor: u8) -> Self {
        if minor == 0 { Self::Http10 } else { Self::Http11 }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(StatusCode::NotImplemented.to_string(), "501 Not Implemented");
        assert_eq!(u16::from(StatusCode::GatewayTimeout), 504);
    }

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Head".parse::<Method>().unwrap(), Method::Head);
        assert_eq!(
            "DELETE".parse::<Method>().unwrap(),
            Method::Other("DELETE".into())
        );
    }

    #[test]
    fn version_from_minor() {
        assert_eq!(Version::from_minor(0), Version::Http10);
        assert_eq!(Version::from_minor(1).to_string(), "HTTP/1.1");
    }
}
