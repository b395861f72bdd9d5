//! Ordered multicast events
//!
//! Subscribers are called in subscription order. Clones share one subscriber
//! list, so an owner can subscribe on its handle while a worker thread emits
//! through another.

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Subscriber callback type
pub type Subscriber<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Handle returned by [`Event::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner<T> {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber<T>)>>,
}

pub struct Event<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.write().push((id, Arc::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.read().iter().any(|(sid, _)| *sid == id)
    }

    pub fn len(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.subscribers.write().clear();
    }

    /// Call every subscriber with `arg`.
    ///
    /// The list is snapshotted first; subscribers may (un)subscribe while
    /// being called, which takes effect on the next emit.
    pub fn emit(&self, arg: &mut T) {
        let snapshot: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        for subscriber in snapshot {
            subscriber(arg);
        }
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_subscription_order() {
        let event: Event<Vec<u32>> = Event::new();
        event.subscribe(|v| v.push(1));
        event.subscribe(|v| v.push(2));
        event.subscribe(|v| v.push(3));

        let mut seen = Vec::new();
        event.emit(&mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_unsubscribe() {
        let event: Event<u32> = Event::new();
        let a = event.subscribe(|v| *v += 1);
        let b = event.subscribe(|v| *v += 10);

        assert!(event.unsubscribe(a));
        assert!(!event.unsubscribe(a));
        assert!(!event.is_subscribed(a));
        assert!(event.is_subscribed(b));

        let mut value = 0;
        event.emit(&mut value);
        assert_eq!(value, 10);
    }

    #[test]
    fn test_clones_share_subscribers() {
        let event: Event<u32> = Event::new();
        let other = event.clone();
        other.subscribe(|v| *v = 7);

        let mut value = 0;
        event.emit(&mut value);
        assert_eq!(value, 7);
        assert_eq!(event.len(), 1);

        event.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_unsubscribe_during_emit() {
        let event: Event<u32> = Event::new();
        let handle = event.clone();
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let slot_clone = slot.clone();

        let id = event.subscribe(move |v| {
            *v += 1;
            if let Some(id) = *slot_clone.lock() {
                handle.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        let mut value = 0;
        event.emit(&mut value);
        event.emit(&mut value);
        assert_eq!(value, 1);
    }
}
