//! SSDP M-SEARCH client.
//!
//! Sends one multicast search for a search target and yields the parsed unicast
//! responses until the socket read times out.

use std::net::UdpSocket;
use std::time::Duration;

use crate::error::{Result, TransportError};

const SSDP_MULTICAST: &str = "239.255.255.250:1900";

/// Parsed search response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SsdpResponse {
    pub location: String,
    pub search_target: String,
    pub usn: String,
    pub server: Option<String>,
}

impl SsdpResponse {
    /// The `uuid:...` part of the USN
    pub fn udn(&self) -> &str {
        self.usn.split("::").next().unwrap_or(&self.usn)
    }
}

pub(crate) struct SsdpClient {
    socket: UdpSocket,
}

impl SsdpClient {
    /// Bind an ephemeral socket whose reads give up after `window` of silence
    pub fn new(window: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| TransportError::Network(format!("Failed to bind UDP socket: {e}")))?;
        socket
            .set_read_timeout(Some(window))
            .map_err(|e| TransportError::Network(format!("Failed to set read timeout: {e}")))?;
        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| TransportError::Network(format!("Failed to set multicast loop: {e}")))?;
        Ok(Self { socket })
    }

    /// Multicast an M-SEARCH for `search_target` and iterate over the responses
    pub fn search(&self, search_target: &str, mx: u8) -> Result<SsdpResponses<'_>> {
        let request = search_request(search_target, mx);
        self.socket
            .send_to(request.as_bytes(), SSDP_MULTICAST)
            .map_err(|e| TransportError::Network(format!("Failed to send M-SEARCH: {e}")))?;
        tracing::debug!("M-SEARCH sent for {}", search_target);
        Ok(SsdpResponses {
            socket: &self.socket,
            buffer: [0; 2048],
            finished: false,
        })
    }
}

fn search_request(search_target: &str, mx: u8) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {SSDP_MULTICAST}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {mx}\r\n\
         ST: {search_target}\r\n\
         USER-AGENT: upnp-cp/{} UPnP/1.0\r\n\
         \r\n",
        env!("CARGO_PKG_VERSION")
    )
}

pub(crate) struct SsdpResponses<'a> {
    socket: &'a UdpSocket,
    buffer: [u8; 2048],
    finished: bool,
}

impl Iterator for SsdpResponses<'_> {
    type Item = Result<SsdpResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            match self.socket.recv_from(&mut self.buffer) {
                Ok((size, from)) => {
                    let parsed = std::str::from_utf8(&self.buffer[..size])
                        .ok()
                        .and_then(parse_response);
                    match parsed {
                        Some(response) => return Some(Ok(response)),
                        None => tracing::debug!("Ignoring malformed SSDP response from {}", from),
                    }
                }
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                    self.finished = true;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(TransportError::Network(format!("Socket error: {e}"))));
                }
            }
        }
        None
    }
}

/// Parse a search response; `LOCATION`, `ST` and `USN` are required
pub(crate) fn parse_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut search_target = None;
    let mut usn = None;
    let mut server = None;

    let mut lines = response.lines();
    let status = lines.next()?;
    if !status.contains("200") {
        return None;
    }

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match name.trim().to_ascii_uppercase().as_str() {
            "LOCATION" => location = Some(value),
            "ST" => search_target = Some(value),
            "USN" => usn = Some(value),
            "SERVER" => server = Some(value),
            _ => {}
        }
    }

    Some(SsdpResponse {
        location: location.filter(|l| !l.is_empty())?,
        search_target: search_target?,
        usn: usn.filter(|u| !u.is_empty())?,
        server,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let response = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=1800\r\n\
            LOCATION: http://192.168.1.50:49152/description.xml\r\n\
            ST: upnp:rootdevice\r\n\
            USN: uuid:2fac1234-31f8-11b4-a222-08002b34c003::upnp:rootdevice\r\n\
            SERVER: Linux/5.10 UPnP/1.0 MiniDLNA/1.3.0\r\n\
            \r\n";

        let parsed = parse_response(response).unwrap();
        assert_eq!(parsed.location, "http://192.168.1.50:49152/description.xml");
        assert_eq!(parsed.search_target, "upnp:rootdevice");
        assert_eq!(parsed.udn(), "uuid:2fac1234-31f8-11b4-a222-08002b34c003");
        assert_eq!(parsed.server.as_deref(), Some("Linux/5.10 UPnP/1.0 MiniDLNA/1.3.0"));
    }

    #[test]
    fn test_parse_response_lowercase_headers() {
        let response = "HTTP/1.1 200 OK\r\n\
            location: http://10.0.0.2:80/d.xml\r\n\
            st: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
            usn: uuid:renderer-1::urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
            \r\n";

        let parsed = parse_response(response).unwrap();
        assert_eq!(parsed.location, "http://10.0.0.2:80/d.xml");
        assert_eq!(parsed.server, None);
    }

    #[test]
    fn test_parse_response_missing_required_headers() {
        assert!(parse_response("HTTP/1.1 200 OK\r\nST: upnp:rootdevice\r\nUSN: uuid:x\r\n\r\n").is_none());
        assert!(parse_response("HTTP/1.1 200 OK\r\nLOCATION: http://a/b\r\nUSN: uuid:x\r\n\r\n").is_none());
        assert!(parse_response("HTTP/1.1 200 OK\r\nLOCATION: http://a/b\r\nST: x\r\n\r\n").is_none());
        assert!(parse_response("").is_none());
    }

    #[test]
    fn test_parse_rejects_notify_and_errors() {
        let notify = "NOTIFY * HTTP/1.1\r\nLOCATION: http://a/b\r\nNT: upnp:rootdevice\r\nUSN: uuid:x\r\n\r\n";
        assert!(parse_response(notify).is_none());
        let error = "HTTP/1.1 500 Internal\r\nLOCATION: http://a/b\r\nST: x\r\nUSN: uuid:x\r\n\r\n";
        assert!(parse_response(error).is_none());
    }

    #[test]
    fn test_udn_without_suffix() {
        let response = SsdpResponse {
            location: "http://a/b".to_string(),
            search_target: "uuid:abc".to_string(),
            usn: "uuid:abc".to_string(),
            server: None,
        };
        assert_eq!(response.udn(), "uuid:abc");
    }

    #[test]
    fn test_search_request_format() {
        let request = search_request("urn:schemas-upnp-org:device:MediaServer:1", 3);
        assert!(request.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(request.contains("MAN: \"ssdp:discover\"\r\n"));
        assert!(request.contains("MX: 3\r\n"));
        assert!(request.contains("ST: urn:schemas-upnp-org:device:MediaServer:1\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }
}
