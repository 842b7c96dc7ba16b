//! Rewriting client request headers for the origin.

use bytes::{BufMut, Bytes, BytesMut};

/// Builds the header block sent to the origin from the client's header lines.
///
/// `Proxy-Connection` and `Connection` are forced to `close` and `User-Agent`
/// to `user_agent`, in place. Every other line, `Host` included, passes
/// through byte for byte. Any of the four that the client omitted is
/// appended, with `Host` naming `authority`. The block ends with exactly one
/// blank line.
///
/// ```
/// use bytes::Bytes;
/// use cacheproxy::proxy::rewrite_headers;
///
/// let block = rewrite_headers(&[Bytes::from_static(b"Accept: */*")], "example.com:80", "ua/1.0");
/// assert_eq!(
///     &block[..],
///     b"Accept: */*\r\n\
///       Proxy-Connection: close\r\n\
///       Connection: close\r\n\
///       Host: example.com:80\r\n\
///       User-Agent: ua/1.0\r\n\
///       \r\n"
/// );
/// ```
pub fn rewrite_headers(lines: &[Bytes], authority: &str, user_agent: &str) -> BytesMut {
    let mut block = BytesMut::with_capacity(lines.iter().map(|l| l.len() + 2).sum::<usize>() + 256);
    let mut seen_proxy_connection = false;
    let mut seen_connection = false;
    let mut seen_user_agent = false;
    let mut seen_host = false;

    for line in lines {
        let name = header_name(line);

        if name.eq_ignore_ascii_case(b"Proxy-Connection") {
            seen_proxy_connection = true;
            block.put_slice(b"Proxy-Connection: close");
        } else if name.eq_ignore_ascii_case(b"Connection") {
            seen_connection = true;
            block.put_slice(b"Connection: close");
        } else if name.eq_ignore_ascii_case(b"User-Agent") {
            seen_user_agent = true;
            block.put_slice(b"User-Agent: ");
            block.put_slice(user_agent.as_bytes());
        } else {
            seen_host |= name.eq_ignore_ascii_case(b"Host");
            block.put_slice(line);
        }
        block.put_slice(b"\r\n");
    }

    if !seen_proxy_connection {
        block.put_slice(b"Proxy-Connection: close\r\n");
    }
    if !seen_connection {
        block.put_slice(b"Connection: close\r\n");
    }
    if !seen_host {
        block.put_slice(b"Host: ");
        block.put_slice(authority.as_bytes());
        block.put_slice(b"\r\n");
    }
    if !seen_user_agent {
        block.put_slice(b"User-Agent: ");
        block.put_slice(user_agent.as_bytes());
        block.put_slice(b"\r\n");
    }
    block.put_slice(b"\r\n");
    block
}

/// The trimmed text before the first `:`; empty when the line has none.
fn header_name(line: &[u8]) -> &[u8] {
    match line.iter().position(|&b| b == b':') {
        Some(colon) => line[..colon].trim_ascii(),
        None => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<Bytes> {
        raw.iter().map(|s| Bytes::copy_from_slice(s.as_bytes())).collect()
    }

    fn text(block: &BytesMut) -> String {
        String::from_utf8_lossy(block).into_owned()
    }

    #[test]
    fn rewrites_in_place_and_keeps_host() {
        let block = rewrite_headers(
            &lines(&[
                "Host: www.cmu.edu",
                "User-Agent: curl/8.0",
                "Connection: keep-alive",
                "Proxy-Connection: keep-alive",
                "Accept: text/html",
            ]),
            "ignored:80",
            "ua",
        );
        assert_eq!(
            text(&block),
            "Host: www.cmu.edu\r\n\
             User-Agent: ua\r\n\
             Connection: close\r\n\
             Proxy-Connection: close\r\n\
             Accept: text/html\r\n\
             \r\n"
        );
    }

    #[test]
    fn names_match_case_insensitively() {
        let block = rewrite_headers(&lines(&["connection: Keep-Alive", "HOST: a"]), "b:80", "ua");
        let block = text(&block);
        assert!(block.starts_with("Connection: close\r\nHOST: a\r\n"));
        assert!(!block.contains("Host: b:80"));
    }

    #[test]
    fn empty_input_synthesizes_all() {
        let block = rewrite_headers(&[], "127.0.0.1:8000", "ua");
        assert_eq!(
            text(&block),
            "Proxy-Connection: close\r\nConnection: close\r\nHost: 127.0.0.1:8000\r\nUser-Agent: ua\r\n\r\n"
        );
    }

    #[test]
    fn single_terminating_blank_line() {
        let block = text(&rewrite_headers(&lines(&["X-A: 1", "Connection: close"]), "h:1", "ua"));
        assert!(block.ends_with("\r\n\r\n"));
        assert!(!block.ends_with("\r\n\r\n\r\n"));
        assert_eq!(block.matches("\r\n\r\n").count(), 1);
    }

    #[test]
    fn similar_names_pass_through() {
        let block = text(&rewrite_headers(&lines(&["X-Connection-Id: 7"]), "h:1", "ua"));
        assert!(block.starts_with("X-Connection-Id: 7\r\n"));
        assert!(block.contains("Connection: close\r\n"));
    }

    #[test]
    fn non_utf8_values_pass_through_unchanged() {
        let raw = [
            Bytes::from_static(b"X-Name: caf\xe9"),
            Bytes::from_static(b"Referer: /\xff\xfe"),
        ];
        let block = rewrite_headers(&raw, "h:1", "ua");
        assert!(block.starts_with(b"X-Name: caf\xe9\r\nReferer: /\xff\xfe\r\n"));
    }

    #[test]
    fn line_without_colon_passes_through() {
        let block = text(&rewrite_headers(&lines(&["Connection"]), "h:1", "ua"));
        assert!(block.starts_with("Connection\r\nProxy-Connection: close\r\nConnection: close\r\n"));
    }
}
