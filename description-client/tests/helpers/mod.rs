//! Test helpers for document fetch integration tests

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Load a fixture from the fixtures directory
pub fn load_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);

    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

/// One-shot server answering a single connection with a canned response
pub struct CannedServer {
    pub addr: SocketAddr,
    handle: JoinHandle<String>,
}

impl CannedServer {
    /// Serve `response` verbatim; keep the connection open afterwards when `linger` is set
    pub fn start(response: Vec<u8>, linger: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind canned server");
        let addr = listener.local_addr().expect("canned server address");

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_millis(500)))
                .expect("read timeout");

            let mut request = Vec::new();
            let mut buffer = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buffer) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buffer[..n]),
                }
            }

            stream.write_all(&response).expect("write response");
            if linger {
                // Wait for the client to half-close instead of closing first
                let _ = stream.read(&mut buffer);
            }
            String::from_utf8_lossy(&request).into_owned()
        });

        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request text received by the server
    pub fn request(self) -> String {
        self.handle.join().expect("canned server thread")
    }
}

/// Build an HTTP response with an explicit content-length
pub fn http_response(status: &str, declared_length: usize, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/xml\r\nContent-Length: {declared_length}\r\n\r\n{body}"
    )
    .into_bytes()
}
