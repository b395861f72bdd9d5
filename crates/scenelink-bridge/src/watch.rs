//! Scene property and timeline-marker watcher
//!
//! Custom properties whose name starts with `/` are OSC addresses: whenever
//! their value changes, the new value is sent to that address. Timeline
//! markers named like an address are sent (without arguments) on the frame
//! they sit on.
//!
//! The host scene stays behind the [`Scene`] trait. Watched items are indexed
//! by object and property name; [`PropertyWatcher::refresh`] grows the index
//! and [`PropertyWatcher::poll`] detects value changes, so "which items are
//! watched" and "which values changed" are separate steps.

use scenelink_core::{PropertyValue, Registry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::osc::{OscSender, OscSenderConfig};

/// Read access to the host scene
pub trait Scene {
    fn object_names(&self) -> Vec<String>;

    fn property_names(&self, object: &str) -> Vec<String>;

    /// Current value, `None` when the object or property is gone or not a scalar
    fn property(&self, object: &str, name: &str) -> Option<PropertyValue>;

    fn current_frame(&self) -> i64;

    fn markers(&self) -> Vec<Marker>;
}

/// A named timeline marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    pub frame: i64,
}

/// Whether a property or marker name is an OSC address
pub fn is_watched_name(name: &str) -> bool {
    name.starts_with('/')
}

/// Names of address-like markers on the scene's current frame
pub fn markers_at<S: Scene + ?Sized>(scene: &S) -> Vec<String> {
    let frame = scene.current_frame();
    scene
        .markers()
        .into_iter()
        .filter(|m| m.frame == frame && is_watched_name(&m.name))
        .map(|m| m.name)
        .collect()
}

#[derive(Debug)]
struct WatchedProperty {
    name: String,
    last: Option<PropertyValue>,
}

#[derive(Debug)]
struct WatchedObject {
    name: String,
    properties: Vec<WatchedProperty>,
}

#[derive(Debug, Default)]
pub struct PropertyWatcher {
    objects: Vec<WatchedObject>,
}

impl PropertyWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add objects and properties that became relevant since the last
    /// refresh. Returns whether anything was added.
    pub fn refresh<S: Scene + ?Sized>(&mut self, scene: &S) -> bool {
        let mut grew = false;

        for object in scene.object_names() {
            let names: Vec<String> = scene
                .property_names(&object)
                .into_iter()
                .filter(|n| is_watched_name(n))
                .collect();

            if names.is_empty() {
                continue;
            }

            let index = match self.objects.iter().position(|o| o.name == object) {
                Some(index) => index,
                None => {
                    debug!("Found object: {}", object);
                    self.objects.push(WatchedObject {
                        name: object.clone(),
                        properties: Vec::new(),
                    });
                    grew = true;
                    self.objects.len() - 1
                }
            };

            let watched = &mut self.objects[index];
            for name in names {
                if watched.properties.iter().any(|p| p.name == name) {
                    continue;
                }
                debug!(" - {}.{}", object, name);
                watched.properties.push(WatchedProperty { name, last: None });
                grew = true;
            }
        }

        grew
    }

    /// Values that changed since the previous poll, as `(address, value)`.
    ///
    /// A property seen for the first time counts as changed. Properties
    /// that disappeared from the scene are skipped.
    pub fn poll<S: Scene + ?Sized>(&mut self, scene: &S) -> Vec<(String, PropertyValue)> {
        let mut changes = Vec::new();

        for object in &mut self.objects {
            for property in &mut object.properties {
                let Some(current) = scene.property(&object.name, &property.name) else {
                    continue;
                };

                if property.last.as_ref() != Some(&current) {
                    property.last = Some(current.clone());
                    changes.push((property.name.clone(), current));
                }
            }
        }

        changes
    }

    /// Watched `(object, property)` pairs in discovery order
    pub fn watched(&self) -> Vec<(&str, &str)> {
        self.objects
            .iter()
            .flat_map(|o| {
                o.properties
                    .iter()
                    .map(move |p| (o.name.as_str(), p.name.as_str()))
            })
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn property_count(&self) -> usize {
        self.objects.iter().map(|o| o.properties.len()).sum()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_runner_osc")]
    pub osc: OscSenderConfig,
    /// Pick up new objects and properties on every update
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
}

fn default_runner_osc() -> OscSenderConfig {
    OscSenderConfig {
        port: 2031,
        ..Default::default()
    }
}

fn default_true() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            osc: default_runner_osc(),
            auto_refresh: true,
        }
    }
}

/// Per-frame driver: markers and property changes out over OSC
#[derive(Debug)]
pub struct Runner {
    config: RunnerConfig,
    sender: OscSender,
    watcher: PropertyWatcher,
    is_setup: bool,
}

/// One runner per scene
pub type RunnerRegistry = Registry<String, Runner>;

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        let sender = OscSender::new(config.osc.clone());
        Self {
            config,
            sender,
            watcher: PropertyWatcher::new(),
            is_setup: false,
        }
    }

    pub fn setup<S: Scene + ?Sized>(&mut self, scene: &S) {
        self.watcher.refresh(scene);
        info!(
            "Watching {} properties on {} objects",
            self.watcher.property_count(),
            self.watcher.object_count()
        );
        self.sender.setup();
        self.is_setup = true;
    }

    /// Run one frame. Returns the number of messages handed to the sender.
    pub fn update<S: Scene + ?Sized>(&mut self, scene: &S) -> usize {
        if !self.is_setup {
            self.setup(scene);
        } else if !self.sender.is_connected() {
            self.sender.setup();
        }

        let mut sent = 0;

        for marker in markers_at(scene) {
            self.sender.send(&marker, Vec::new());
            sent += 1;
        }

        if self.config.auto_refresh {
            self.watcher.refresh(scene);
        }

        for (address, value) in self.watcher.poll(scene) {
            self.sender.send_values(&address, &[value]);
            sent += 1;
        }

        sent
    }

    pub fn destroy(&mut self) {
        self.sender.destroy();
        self.is_setup = false;
    }

    pub fn sender(&self) -> &OscSender {
        &self.sender
    }

    pub fn watcher(&self) -> &PropertyWatcher {
        &self.watcher
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}
