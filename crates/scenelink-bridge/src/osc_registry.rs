//! Shared OSC senders keyed by destination

use scenelink_core::Registry;

use crate::osc::{OscSender, OscSenderConfig};

/// One sender per `host:port`, so watchers targeting the same destination
/// share a socket.
#[derive(Debug, Default)]
pub struct OscSenderRegistry {
    senders: Registry<String, OscSender>,
}

impl OscSenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(host: &str, port: u16) -> String {
        format!("{}:{}", host, port)
    }

    /// Existing sender for the destination, or a new unconnected one
    pub fn instance_for(&mut self, host: &str, port: u16) -> &mut OscSender {
        self.senders.get_or_insert_with(Self::key(host, port), || {
            OscSender::new(OscSenderConfig {
                host: host.to_string(),
                port,
            })
        })
    }

    pub fn get(&self, host: &str, port: u16) -> Option<&OscSender> {
        self.senders.get(&Self::key(host, port))
    }

    /// Remove the sender; it is destroyed when dropped
    pub fn remove(&mut self, host: &str, port: u16) -> Option<OscSender> {
        self.senders.remove(&Self::key(host, port))
    }

    pub fn destroy_all(&mut self) {
        for (_, mut sender) in self.senders.drain() {
            sender.destroy();
        }
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_for_reuses_sender() {
        let mut registry = OscSenderRegistry::new();
        registry.instance_for("127.0.0.1", 9000).set_verbose(true);
        registry.instance_for("127.0.0.1", 9000);
        registry.instance_for("127.0.0.1", 9001);

        assert_eq!(registry.len(), 2);
        let sender = registry.get("127.0.0.1", 9000).unwrap();
        assert_eq!(sender.port(), 9000);
        assert!(!sender.is_connected(), "registry must not connect on its own");
    }

    #[test]
    fn test_destroy_all() {
        let mut registry = OscSenderRegistry::new();
        assert!(registry.instance_for("127.0.0.1", 9000).setup());
        registry.destroy_all();
        assert!(registry.is_empty());
        assert!(registry.remove("127.0.0.1", 9000).is_none());
    }
}
