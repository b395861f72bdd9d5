//! OSC Sender Integration Tests
//!
//! These tests run the sender against real UDP listeners and decode what
//! arrives with rosc:
//! 1. One datagram per send, with address and arguments intact
//! 2. Reconfiguration moves traffic to the new destination
//! 3. Failures never escape `send`
//! 4. The registry shares senders per destination

use rosc::OscType;
use scenelink_bridge::{OscSender, OscSenderConfig, OscSenderRegistry};
use scenelink_core::PropertyValue;
use scenelink_test_utils::{find_available_udp_port, OscListener};

fn connected_sender(port: u16) -> OscSender {
    let mut sender = OscSender::new(OscSenderConfig {
        host: "127.0.0.1".to_string(),
        port,
    });
    assert!(sender.setup(), "sender should connect to localhost");
    sender
}

#[test]
fn test_send_float_and_string() {
    let listener = OscListener::bind();
    let sender = connected_sender(listener.port());

    sender.send(
        "/foo",
        vec![OscType::Float(1.0), OscType::String("bar".to_string())],
    );

    let msg = listener.recv().expect("no datagram received");
    assert_eq!(msg.addr, "/foo");
    assert_eq!(
        msg.args,
        vec![OscType::Float(1.0), OscType::String("bar".to_string())]
    );
    assert!(listener.recv().is_none(), "exactly one datagram expected");
}

#[test]
fn test_send_without_args() {
    let listener = OscListener::bind();
    let sender = connected_sender(listener.port());

    sender.send("/cue/start", Vec::new());

    let msg = listener.recv().expect("no datagram received");
    assert_eq!(msg.addr, "/cue/start");
    assert!(msg.args.is_empty());
}

#[test]
fn test_send_values_type_mapping() {
    let listener = OscListener::bind();
    let sender = connected_sender(listener.port());

    sender.send_values(
        "/values",
        &[
            PropertyValue::Int(3),
            PropertyValue::Float(0.25),
            PropertyValue::Bool(false),
            PropertyValue::from("x"),
        ],
    );

    let msg = listener.recv().expect("no datagram received");
    assert_eq!(
        msg.args,
        vec![
            OscType::Int(3),
            OscType::Float(0.25),
            OscType::Bool(false),
            OscType::String("x".to_string()),
        ]
    );
}

#[test]
fn test_address_is_sent_verbatim() {
    let listener = OscListener::bind();
    let sender = connected_sender(listener.port());

    sender.send("/Cube.location[0]", vec![OscType::Int(1)]);

    let msg = listener.recv().expect("no datagram received");
    assert_eq!(msg.addr, "/Cube.location[0]");
}

#[test]
fn test_reconfigure_moves_destination() {
    let first = OscListener::bind();
    let second = OscListener::bind();
    let mut sender = connected_sender(first.port());
    assert_eq!(sender.connect_count(), 1);

    sender.send("/before", Vec::new());
    sender.configure(None, Some(second.port()));
    assert_eq!(sender.connect_count(), 2, "exactly one reconnect");
    assert!(sender.is_connected());
    sender.send("/after", Vec::new());

    assert_eq!(first.recv().map(|m| m.addr), Some("/before".to_string()));
    assert!(first.recv().is_none());
    assert_eq!(second.recv().map(|m| m.addr), Some("/after".to_string()));
}

#[test]
fn test_configure_same_values_keeps_socket() {
    let listener = OscListener::bind();
    let mut sender = connected_sender(listener.port());

    sender.configure(Some("127.0.0.1"), Some(listener.port()));
    assert_eq!(sender.connect_count(), 1);
}

#[test]
fn test_setup_failure_is_absorbed() {
    let mut sender = OscSender::new(OscSenderConfig {
        host: "no-such-host.invalid".to_string(),
        port: 9000,
    });

    assert!(!sender.setup());
    assert!(!sender.is_connected());

    // Still usable: sending is a logged no-op, and a later setup can succeed.
    sender.send("/foo", vec![OscType::Int(1)]);

    let listener = OscListener::bind();
    sender.configure(Some("127.0.0.1"), Some(listener.port()));
    assert!(sender.setup());
    sender.send("/foo", vec![OscType::Int(1)]);
    assert_eq!(listener.recv().map(|m| m.addr), Some("/foo".to_string()));
}

#[test]
fn test_send_to_closed_port_does_not_fail_caller() {
    let port = find_available_udp_port();
    let sender = connected_sender(port);

    for _ in 0..3 {
        sender.send("/nobody/listens", vec![OscType::Float(0.5)]);
    }
    assert!(sender.is_connected());
}

#[test]
fn test_send_after_destroy() {
    let listener = OscListener::bind();
    let mut sender = connected_sender(listener.port());

    sender.destroy();
    sender.send("/dropped", Vec::new());
    assert!(listener.recv().is_none());
}

#[test]
fn test_registry_shares_sender() {
    let listener = OscListener::bind();
    let mut registry = OscSenderRegistry::new();

    assert!(registry.instance_for("127.0.0.1", listener.port()).setup());
    registry
        .instance_for("127.0.0.1", listener.port())
        .send("/shared", Vec::new());

    assert_eq!(registry.len(), 1);
    assert_eq!(listener.recv().map(|m| m.addr), Some("/shared".to_string()));

    registry.destroy_all();
    assert!(registry.is_empty());
}
