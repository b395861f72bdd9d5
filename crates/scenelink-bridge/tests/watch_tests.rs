//! Watcher Integration Tests
//!
//! A fake scene drives `Runner` frame by frame; an OSC listener checks what
//! goes out on the wire.

use rosc::OscType;
use scenelink_bridge::{Marker, OscSenderConfig, Runner, RunnerConfig, RunnerRegistry, Scene};
use scenelink_core::PropertyValue;
use scenelink_test_utils::OscListener;
use std::collections::BTreeMap;

#[derive(Default)]
struct TestScene {
    objects: BTreeMap<String, BTreeMap<String, PropertyValue>>,
    frame: i64,
    markers: Vec<Marker>,
}

impl TestScene {
    fn set(&mut self, object: &str, name: &str, value: impl Into<PropertyValue>) {
        self.objects
            .entry(object.to_string())
            .or_default()
            .insert(name.to_string(), value.into());
    }
}

impl Scene for TestScene {
    fn object_names(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    fn property_names(&self, object: &str) -> Vec<String> {
        self.objects
            .get(object)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn property(&self, object: &str, name: &str) -> Option<PropertyValue> {
        self.objects.get(object)?.get(name).cloned()
    }

    fn current_frame(&self) -> i64 {
        self.frame
    }

    fn markers(&self) -> Vec<Marker> {
        self.markers.clone()
    }
}

fn runner_for(listener: &OscListener, auto_refresh: bool) -> Runner {
    Runner::new(RunnerConfig {
        osc: OscSenderConfig {
            host: "127.0.0.1".to_string(),
            port: listener.port(),
        },
        auto_refresh,
    })
}

#[test]
fn test_property_changes_are_sent() {
    let listener = OscListener::bind();
    let mut runner = runner_for(&listener, true);
    let mut scene = TestScene::default();
    scene.set("Cube", "/cube/x", 0.5);
    scene.set("Cube", "name", "ignored");

    assert_eq!(runner.update(&scene), 1);
    let msg = listener.recv().expect("initial value");
    assert_eq!(msg.addr, "/cube/x");
    assert_eq!(msg.args, vec![OscType::Float(0.5)]);

    assert_eq!(runner.update(&scene), 0, "unchanged value is not resent");

    scene.set("Cube", "/cube/x", 0.75);
    assert_eq!(runner.update(&scene), 1);
    assert_eq!(listener.recv().unwrap().args, vec![OscType::Float(0.75)]);
}

#[test]
fn test_markers_on_current_frame() {
    let listener = OscListener::bind();
    let mut runner = runner_for(&listener, true);
    let mut scene = TestScene {
        frame: 10,
        ..Default::default()
    };
    scene.markers = vec![
        Marker {
            name: "/scene/start".to_string(),
            frame: 10,
        },
        Marker {
            name: "/scene/end".to_string(),
            frame: 20,
        },
    ];

    assert_eq!(runner.update(&scene), 1);
    let msg = listener.recv().unwrap();
    assert_eq!(msg.addr, "/scene/start");
    assert!(msg.args.is_empty());

    scene.frame = 20;
    runner.update(&scene);
    assert_eq!(listener.recv().unwrap().addr, "/scene/end");
}

#[test]
fn test_auto_refresh_picks_up_new_properties() {
    let listener = OscListener::bind();
    let mut runner = runner_for(&listener, true);
    let mut scene = TestScene::default();
    scene.set("Cube", "/cube/x", 1);
    runner.update(&scene);
    listener.drain();

    scene.set("Lamp", "/lamp/energy", 100);
    assert_eq!(runner.update(&scene), 1);
    let msg = listener.recv().unwrap();
    assert_eq!(msg.addr, "/lamp/energy");
    assert_eq!(msg.args, vec![OscType::Int(100)]);
}

#[test]
fn test_without_auto_refresh_index_is_fixed() {
    let listener = OscListener::bind();
    let mut runner = runner_for(&listener, false);
    let mut scene = TestScene::default();
    scene.set("Cube", "/cube/x", 1);
    runner.update(&scene);
    listener.drain();

    scene.set("Lamp", "/lamp/energy", 100);
    assert_eq!(runner.update(&scene), 0);
    assert_eq!(runner.watcher().property_count(), 1);
}

#[test]
fn test_registry_one_runner_per_scene() {
    let listener = OscListener::bind();
    let mut registry = RunnerRegistry::new();
    let mut scene = TestScene::default();
    scene.set("Cube", "/cube/x", 1);

    registry
        .get_or_insert_with("Scene".to_string(), || runner_for(&listener, true))
        .update(&scene);
    registry
        .get_or_insert_with("Scene".to_string(), || panic!("runner must be reused"))
        .update(&scene);

    assert_eq!(registry.len(), 1);
    assert_eq!(listener.drain().len(), 1);

    for (_, mut runner) in registry.drain() {
        runner.destroy();
        assert!(!runner.sender().is_connected());
    }
}
