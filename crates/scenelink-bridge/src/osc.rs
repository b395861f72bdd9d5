//! OSC (Open Sound Control) sender
//!
//! A lazily connected, fire-and-forget UDP client. Every failure is logged
//! and absorbed by [`OscSender::setup`] and [`OscSender::send`] so that a
//! per-frame update loop never stops because a datagram could not go out.
//!
//! Reconfiguring takes `&mut self` while sending takes `&self`, so sharing a
//! sender between threads requires wrapping it in a lock that covers
//! configure, setup, destroy and send together.

use rosc::{OscMessage, OscPacket, OscType};
use scenelink_core::PropertyValue;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, error, info, warn};

use crate::{BridgeError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

/// OSC destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OscSenderConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for OscSenderConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug)]
pub struct OscSender {
    config: OscSenderConfig,
    socket: Option<UdpSocket>,
    target: Option<SocketAddr>,
    running: bool,
    verbose: bool,
    connect_count: u64,
}

impl OscSender {
    pub fn new(config: OscSenderConfig) -> Self {
        Self {
            config,
            socket: None,
            target: None,
            running: false,
            verbose: false,
            connect_count: 0,
        }
    }

    /// Update the destination. A running sender reconnects when the host or
    /// port actually changed.
    pub fn configure(&mut self, host: Option<&str>, port: Option<u16>) {
        let changed = host.map_or(false, |h| h != self.config.host)
            || port.map_or(false, |p| p != self.config.port);

        if let Some(host) = host {
            self.config.host = host.to_string();
        }
        if let Some(port) = port {
            self.config.port = port;
        }

        if changed && self.running {
            debug!(
                "OSC destination changed to {}:{}, reconnecting",
                self.host(),
                self.port()
            );
            self.destroy();
            self.setup();
        }
    }

    /// Resolve the destination and open the socket.
    ///
    /// Returns whether the sender is connected; a failure is logged and may
    /// be retried by calling `setup` again.
    pub fn setup(&mut self) -> bool {
        match self.connect() {
            Ok(()) => {
                self.running = true;
                info!("OSC client connected to {}:{}", self.host(), self.port());
                true
            }
            Err(e) => {
                error!("OSC connection failure: {}", e);
                false
            }
        }
    }

    /// Release the socket. Safe to call repeatedly or before `setup`.
    pub fn destroy(&mut self) {
        if self.socket.take().is_some() {
            self.target = None;
            info!("OSC client closed");
        }
        self.running = false;
    }

    /// Send one message, logging and dropping it on failure
    pub fn send(&self, address: &str, args: Vec<OscType>) {
        match self.try_send(address, args) {
            Ok(()) => {
                if self.verbose {
                    debug!("OscSender.send {}", address);
                }
            }
            Err(e) => {
                error!("OscSender.send {} FAILED: {}", address, e);
            }
        }
    }

    /// Send property values, converting each to an OSC argument
    pub fn send_values(&self, address: &str, values: &[PropertyValue]) {
        self.send(address, values.iter().map(value_to_osc_arg).collect());
    }

    /// Encode and transmit one message as a single datagram
    pub fn try_send(&self, address: &str, args: Vec<OscType>) -> Result<()> {
        let (socket, target) = match (&self.socket, self.target) {
            (Some(socket), Some(target)) => (socket, target),
            _ => return Err(BridgeError::NotConnected),
        };

        if !address.starts_with('/') {
            debug!("OSC address without leading '/': {}", address);
        }

        let packet = OscPacket::Message(OscMessage {
            addr: address.to_string(),
            args,
        });
        let bytes = rosc::encoder::encode(&packet)
            .map_err(|e| BridgeError::Protocol(format!("OSC encode error: {:?}", e)))?;

        socket
            .send_to(&bytes, target)
            .map_err(|e| BridgeError::Send(e.to_string()))?;

        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn config(&self) -> &OscSenderConfig {
        &self.config
    }

    /// Resolved destination while connected
    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    /// Local address of the open socket
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of sockets opened over this sender's lifetime
    pub fn connect_count(&self) -> u64 {
        self.connect_count
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn connect(&mut self) -> Result<()> {
        let host = self.config.host.as_str();
        let port = self.config.port;

        let target = (host, port)
            .to_socket_addrs()
            .map_err(|e| BridgeError::ConnectionFailed(format!("{}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| {
                BridgeError::ConnectionFailed(format!("{}:{}: no address found", host, port))
            })?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;
        socket.set_nonblocking(true)?;

        if host.ends_with(".255") {
            warn!("OSC broadcast destination detected: {}", host);
            socket.set_broadcast(true)?;
        }

        self.socket = Some(socket);
        self.target = Some(target);
        self.connect_count += 1;
        Ok(())
    }
}

impl Default for OscSender {
    fn default() -> Self {
        Self::new(OscSenderConfig::default())
    }
}

impl Drop for OscSender {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Convert a property value to an OSC argument.
///
/// Floats go out as 32-bit `f`, integers as `i` when they fit and `h`
/// otherwise.
pub fn value_to_osc_arg(value: &PropertyValue) -> OscType {
    match value {
        PropertyValue::Bool(b) => OscType::Bool(*b),
        PropertyValue::Int(i) => match i32::try_from(*i) {
            Ok(i) => OscType::Int(i),
            Err(_) => OscType::Long(*i),
        },
        PropertyValue::Float(f) => OscType::Float(*f as f32),
        PropertyValue::String(s) => OscType::String(s.clone()),
    }
}
