//! Rotation commands over HTTP
//!
//! `GET /rot/<a>/<b>/<c>` (degrees) queues a new target orientation which the
//! owner's frame loop picks up in [`RotationControl::update`] and eases into
//! over a short animation.

use parking_lot::Mutex;
use scenelink_core::{lerp, Anim};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::http::HttpServer;
use crate::Result;

pub const DEFAULT_ROTATION_PATTERN: &str = "^/rot/(.+)/(.+)/(.+)$";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Seconds to ease from the current to the requested rotation
    #[serde(default = "default_duration")]
    pub duration_secs: f64,
    /// Route pattern with three capture groups
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_duration() -> f64 {
    0.1
}

fn default_pattern() -> String {
    DEFAULT_ROTATION_PATTERN.to_string()
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration(),
            pattern: default_pattern(),
        }
    }
}

pub struct RotationControl {
    server: HttpServer,
    config: RotationConfig,
    // Written by the server thread, drained by `update`; last write wins.
    queued: Arc<Mutex<Option<[String; 3]>>>,
    rotation: [f64; 3],
    from: [f64; 3],
    to: [f64; 3],
    anim: Anim,
}

impl RotationControl {
    pub fn new(server: HttpServer, config: RotationConfig) -> Result<Self> {
        let anim = Anim::new(config.duration_secs)?;

        Ok(Self {
            server,
            config,
            queued: Arc::new(Mutex::new(None)),
            rotation: [0.0; 3],
            from: [0.0; 3],
            to: [0.0; 3],
            anim,
        })
    }

    /// Register the rotation route and start the server.
    ///
    /// Returns whether the server is serving; failures are logged.
    pub fn setup(&mut self) -> bool {
        let queued = Arc::clone(&self.queued);
        let registered = self.server.add_handler(&self.config.pattern, move |ctx, groups| {
            if let [a, b, c, ..] = groups {
                *queued.lock() = Some([a.clone(), b.clone(), c.clone()]);
            }
            ctx.respond_ok();
        });

        if let Err(e) = registered {
            error!("Rotation route not registered: {}", e);
            return false;
        }

        match self.server.setup(None) {
            Ok(()) => true,
            Err(e) => {
                error!("Rotation HTTP server failed to start: {}", e);
                false
            }
        }
    }

    /// Apply a pending command and advance the transition.
    ///
    /// `dt` is the frame time in seconds; `None` uses the wall clock.
    pub fn update(&mut self, dt: Option<f64>) {
        let pending = self.queued.lock().take();

        if let Some(raw) = pending {
            let [a, b, c] = parse_degrees(&raw);
            debug!("Got orientation data from HTTP-server: {}, {}, {}", a, b, c);

            self.from = self.rotation;
            self.to = [c.to_radians(), -b.to_radians(), a.to_radians()];
            self.anim.start();
        }

        if self.anim.is_active() {
            self.anim.update(dt);
            self.rotation = lerp(&self.from, &self.to, self.anim.progress());
        }
    }

    /// Current rotation in radians
    pub fn rotation(&self) -> [f64; 3] {
        self.rotation
    }

    /// Rotation being eased towards, in radians
    pub fn target(&self) -> [f64; 3] {
        self.to
    }

    pub fn is_animating(&self) -> bool {
        self.anim.is_active()
    }

    pub fn server(&self) -> &HttpServer {
        &self.server
    }

    pub fn destroy(&mut self) {
        self.server.clear_handlers();
        self.server.destroy();
    }
}

impl Drop for RotationControl {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Parse the three components in degrees. If any of them is not a finite
/// number the whole command becomes `[0, 0, 0]`.
fn parse_degrees(raw: &[String; 3]) -> [f64; 3] {
    let mut degrees = [0.0; 3];
    for (value, text) in degrees.iter_mut().zip(raw) {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => *value = v,
            _ => {
                warn!("Invalid rotation value(s): {:?}", raw);
                return [0.0; 3];
            }
        }
    }
    degrees
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(a: &str, b: &str, c: &str) -> [String; 3] {
        [a.to_string(), b.to_string(), c.to_string()]
    }

    #[test]
    fn test_parse_degrees() {
        assert_eq!(parse_degrees(&raw("90", "-12.5", " 3 ")), [90.0, -12.5, 3.0]);
    }

    #[test]
    fn test_parse_degrees_rejects_whole_command() {
        assert_eq!(parse_degrees(&raw("10", "abc", "30")), [0.0; 3]);
        assert_eq!(parse_degrees(&raw("NaN", "20", "30")), [0.0; 3]);
        assert_eq!(parse_degrees(&raw("10", "20", "inf")), [0.0; 3]);
    }

    #[test]
    fn test_invalid_duration() {
        let config = RotationConfig {
            duration_secs: 0.0,
            ..Default::default()
        };
        assert!(RotationControl::new(HttpServer::default(), config).is_err());
    }

    #[test]
    fn test_update_from_queued_command() {
        let mut control =
            RotationControl::new(HttpServer::default(), RotationConfig::default()).unwrap();
        *control.queued.lock() = Some(raw("10", "20", "0"));

        control.update(Some(0.05));
        assert!(control.is_animating());
        let halfway = control.rotation();
        assert!((halfway[0] - 0.0).abs() < 1e-9);
        assert!((halfway[1] + 10f64.to_radians()).abs() < 1e-9);
        assert!((halfway[2] - 5f64.to_radians()).abs() < 1e-9);

        control.update(Some(0.05));
        assert!(!control.is_animating());
        assert_eq!(
            control.rotation(),
            [0.0, -20f64.to_radians(), 10f64.to_radians()]
        );
    }
}
