//! Owner-keyed instance registry
//!
//! One instance per owner (scene, game object, `host:port` pair...), held by
//! whoever owns the registry rather than in process-wide state.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
pub struct Registry<K, V> {
    instances: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Registry<K, V> {
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }

    /// Return the instance for `key`, creating it with `make` on first use
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        self.instances.entry(key).or_insert_with(make)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.instances.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.instances.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.instances.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.instances.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.instances.keys()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Remove and return every instance
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.instances.drain().collect()
    }
}

impl<K: Eq + Hash, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
