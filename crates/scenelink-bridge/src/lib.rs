//! scenelink bridges
//!
//! Connects a live scene to external processes:
//! - OSC (Open Sound Control) sender over UDP
//! - HTTP micro-server with static files and pattern-matched commands
//! - Rotation commands over HTTP (`/rot/<a>/<b>/<c>`)
//! - Custom-property and timeline-marker watcher emitting OSC

pub mod error;

#[cfg(feature = "osc")]
pub mod osc;

#[cfg(feature = "osc")]
pub mod osc_registry;

#[cfg(feature = "osc")]
pub mod watch;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod request;

#[cfg(feature = "http")]
pub mod rotation;

pub use error::{BridgeError, Result};

#[cfg(feature = "osc")]
pub use osc::{OscSender, OscSenderConfig};

#[cfg(feature = "osc")]
pub use osc_registry::OscSenderRegistry;

#[cfg(feature = "osc")]
pub use watch::{Marker, PropertyWatcher, Runner, RunnerConfig, RunnerRegistry, Scene};

#[cfg(feature = "http")]
pub use http::{HttpServer, HttpServerConfig, RoutingMode, ServerEvent};

#[cfg(feature = "http")]
pub use request::{RequestContext, StatusCode};

#[cfg(feature = "http")]
pub use rotation::{RotationConfig, RotationControl};
