//! Common test helpers for scenelink tests
//!
//! - Port allocation
//! - Condition-based waiting (no hardcoded sleeps)
//! - Raw HTTP/1.0 requests that keep the request target exactly as written
//! - An OSC listener decoding datagrams with rosc

use rosc::{OscMessage, OscPacket};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, UdpSocket};
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub fn find_available_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Find an available UDP port for testing
pub fn find_available_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Poll `check` until it returns true or `max_wait` elapses
pub fn wait_for<F>(mut check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        std::thread::sleep(interval);
    }
    check()
}

// ============================================================================
// Raw HTTP requests
// ============================================================================

/// Send `GET target` with the request target exactly as written and return
/// the response status.
///
/// HTTP client crates normalize targets like `/../x`; this one does not, so
/// it can check how the server treats them.
pub fn raw_get_status(port: u16, target: &str) -> std::io::Result<u16> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.set_read_timeout(Some(DEFAULT_TIMEOUT))?;
    write!(
        stream,
        "GET {} HTTP/1.0\r\nHost: 127.0.0.1:{}\r\nConnection: close\r\n\r\n",
        target, port
    )?;
    stream.flush()?;

    let mut status_line = String::new();
    BufReader::new(stream).read_line(&mut status_line)?;
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("bad status line: {:?}", status_line),
            )
        })
}

// ============================================================================
// OSC listener
// ============================================================================

/// UDP socket collecting OSC messages on a local port
pub struct OscListener {
    socket: UdpSocket,
}

impl OscListener {
    /// Bind on an ephemeral localhost port
    pub fn bind() -> Self {
        Self::bind_port(0)
    }

    pub fn bind_port(port: u16) -> Self {
        let socket = UdpSocket::bind(("127.0.0.1", port)).unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        Self { socket }
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    /// Next datagram decoded as a single OSC message
    pub fn recv(&self) -> Option<OscMessage> {
        let mut buf = [0u8; 65536];
        let (len, _) = self.socket.recv_from(&mut buf).ok()?;
        match rosc::decoder::decode_udp(&buf[..len]).ok()?.1 {
            OscPacket::Message(msg) => Some(msg),
            OscPacket::Bundle(_) => None,
        }
    }

    /// Collect messages until the socket stays quiet for the read timeout
    pub fn drain(&self) -> Vec<OscMessage> {
        let mut messages = Vec::new();
        while let Some(msg) = self.recv() {
            messages.push(msg);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_get_status() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut header = String::new();
            while reader.read_line(&mut header).unwrap() > 0 && header != "\r\n" {
                header.clear();
            }
            stream
                .write_all(b"HTTP/1.0 404 Not Found\r\ncontent-length: 0\r\n\r\n")
                .unwrap();
            request_line
        });

        assert_eq!(raw_get_status(port, "/a/../b").unwrap(), 404);
        assert_eq!(server.join().unwrap(), "GET /a/../b HTTP/1.0\r\n");
    }

    #[test]
    fn test_wait_for() {
        let mut calls = 0;
        assert!(wait_for(
            || {
                calls += 1;
                calls >= 3
            },
            Duration::from_millis(1),
            DEFAULT_TIMEOUT
        ));
    }
}
