//! Subscriber notification channel.
//!
//! Stores, services and containers publish lifecycle events through a
//! [`Notifier`]. Subscribers are plain callbacks; a subscription lives until
//! it is explicitly removed, so owners unsubscribe on teardown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Handle returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A cloneable broadcast point for events of type `E`.
///
/// Clones share the same subscriber list.
pub struct Notifier<E> {
    listeners: Arc<RwLock<Vec<(SubscriptionId, Listener<E>)>>>,
}

impl<E> Notifier<E> {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registers a callback.
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId::new();
        if let Ok(mut guard) = self.listeners.write() {
            guard.push((id, Arc::new(listener)));
        }
        id
    }

    /// Removes a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if let Ok(mut guard) = self.listeners.write() {
            let before = guard.len();
            guard.retain(|(sub, _)| *sub != id);
            return guard.len() != before;
        }
        false
    }

    /// Removes every callback.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.listeners.write() {
            guard.clear();
        }
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Delivers an event to every subscriber.
    ///
    /// The lock is released before callbacks run, so a callback may
    /// subscribe or unsubscribe.
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .listeners
            .read()
            .map(|g| g.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }
}

impl<E> Clone for Notifier<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let notifier: Notifier<u32> = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = notifier.subscribe(move |v| sink.lock().unwrap().push(*v));

        notifier.emit(&1);
        notifier.clone().emit(&2);
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.emit(&3);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
