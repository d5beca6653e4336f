//! Raw blocking HTTP GET used to download description documents.
//!
//! One unpipelined request per connection. The response is accepted only when the
//! status line reports `200 OK`, a header/body separator exists and the body length
//! matches either the bytes received before a graceful close or the declared
//! `content-length`. Chunked transfer encoding is not supported.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{DocError, Result};

const RECV_BUFFER_SIZE: usize = 4096;
const HEADER_SEPARATOR: &str = "\r\n\r\n";

/// Fetch `path` from `addr` and return the response body.
///
/// Reads on loopback connections give up after `timeout` of silence; other
/// connections, and loopback ones with a zero `timeout`, block until the peer closes.
pub(crate) fn http_get(addr: SocketAddr, path: &str, timeout: Duration) -> Result<String> {
    let mut stream = TcpStream::connect(addr)
        .map_err(|e| DocError::Transfer(format!("connect to {addr} failed: {e}")))?;

    let loopback = addr.ip().is_loopback();
    if loopback {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        if let Err(e) = stream.set_read_timeout(timeout) {
            release(stream, false);
            return Err(DocError::Transfer(format!("cannot set receive timeout: {e}")));
        }
    }

    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    tracing::debug!("GET {} from {}", path, addr);

    let outcome = stream
        .write_all(request.as_bytes())
        .map_err(|e| DocError::Transfer(format!("send to {addr} failed: {e}")))
        .and_then(|()| receive(&mut stream));

    release(stream, loopback);

    let (raw, closed) = outcome?;
    parse_response(&raw, closed)
}

/// Receive until the peer closes or the read times out.
///
/// Returns the raw bytes and whether the connection was closed gracefully.
fn receive(stream: &mut TcpStream) -> Result<(Vec<u8>, bool)> {
    let mut raw = Vec::new();
    let mut buffer = [0u8; RECV_BUFFER_SIZE];

    loop {
        match stream.read(&mut buffer) {
            Ok(0) => return Ok((raw, true)),
            Ok(n) => raw.extend_from_slice(&buffer[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok((raw, false));
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(DocError::Transfer(format!("receive failed: {e}"))),
        }
    }
}

/// Half-close, drain whatever is still buffered, then drop the socket.
fn release(mut stream: TcpStream, loopback: bool) {
    let _ = stream.shutdown(Shutdown::Write);
    if loopback {
        let mut sink = [0u8; RECV_BUFFER_SIZE];
        while matches!(stream.read(&mut sink), Ok(n) if n > 0) {}
    }
}

/// Validate a raw response and return its body.
///
/// The head must be UTF-8. A body in another encoding is decoded lossily.
pub(crate) fn parse_response(raw: &[u8], closed: bool) -> Result<String> {
    let separator = raw
        .windows(HEADER_SEPARATOR.len())
        .position(|w| w == HEADER_SEPARATOR.as_bytes())
        .ok_or_else(|| DocError::Transfer("no header/body separator in response".to_string()))?;
    let head = std::str::from_utf8(&raw[..separator])
        .map_err(|e| DocError::Transfer(format!("response head is not valid UTF-8: {e}")))?;
    let body = &raw[separator + HEADER_SEPARATOR.len()..];

    let status_line = head.lines().next().unwrap_or_default();
    if !status_line.contains("200 OK") {
        return Err(DocError::Transfer(format!("unexpected status line '{status_line}'")));
    }

    if !closed {
        let declared = content_length(head).ok_or_else(|| {
            DocError::Transfer("connection still open and no content-length declared".to_string())
        })?;
        if declared != body.len() {
            return Err(DocError::Transfer(format!(
                "content-length {declared} does not match {} bytes received",
                body.len()
            )));
        }
    }

    if body.is_empty() {
        return Err(DocError::Transfer("empty document body".to_string()));
    }

    Ok(match String::from_utf8(body.to_vec()) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!("Document body is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(body).into_owned()
        }
    })
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "<root><device/></root>";

    fn response(status: &str, length: Option<usize>, body: &str) -> Vec<u8> {
        let mut text = format!("HTTP/1.1 {status}\r\nContent-Type: text/xml\r\n");
        if let Some(length) = length {
            text.push_str(&format!("CONTENT-LENGTH: {length}\r\n"));
        }
        text.push_str("\r\n");
        text.push_str(body);
        text.into_bytes()
    }

    #[test]
    fn test_parse_response_declared_length() {
        let raw = response("200 OK", Some(BODY.len()), BODY);
        assert_eq!(parse_response(&raw, false).unwrap(), BODY);
    }

    #[test]
    fn test_parse_response_graceful_close_trusts_received_bytes() {
        let raw = response("200 OK", None, BODY);
        assert_eq!(parse_response(&raw, true).unwrap(), BODY);

        let raw = response("200 OK", Some(BODY.len() + 10), BODY);
        assert_eq!(parse_response(&raw, true).unwrap(), BODY);
    }

    #[test]
    fn test_parse_response_length_mismatch() {
        let raw = response("200 OK", Some(BODY.len() + 1), BODY);
        assert!(matches!(parse_response(&raw, false), Err(DocError::Transfer(_))));
    }

    #[test]
    fn test_parse_response_missing_length_on_open_connection() {
        let raw = response("200 OK", None, BODY);
        assert!(parse_response(&raw, false).is_err());
    }

    #[test]
    fn test_parse_response_bad_status() {
        let raw = response("404 Not Found", Some(BODY.len()), BODY);
        assert!(parse_response(&raw, true).is_err());
    }

    #[test]
    fn test_parse_response_without_separator() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n".to_vec();
        assert!(parse_response(&raw, true).is_err());
    }

    #[test]
    fn test_parse_response_empty_body() {
        let raw = response("200 OK", Some(0), "");
        assert!(parse_response(&raw, false).is_err());
    }

    #[test]
    fn test_parse_response_non_utf8_body() {
        let mut raw = response("200 OK", Some(11), "");
        raw.extend_from_slice(b"<a>caf\xe9</a>");
        assert_eq!(parse_response(&raw, false).unwrap(), "<a>caf\u{fffd}</a>");
    }

    #[test]
    fn test_parse_response_non_utf8_head() {
        let raw = b"HTTP/1.1 200 OK\r\nServer: caf\xe9\r\n\r\n<a/>".to_vec();
        assert!(matches!(parse_response(&raw, true), Err(DocError::Transfer(_))));
    }

    #[test]
    fn test_content_length_is_case_insensitive() {
        assert_eq!(content_length("HTTP/1.1 200 OK\r\ncontent-length: 42"), Some(42));
        assert_eq!(content_length("HTTP/1.1 200 OK\r\nContent-Length:7"), Some(7));
        assert_eq!(content_length("HTTP/1.1 200 OK\r\nServer: x"), None);
    }
}
