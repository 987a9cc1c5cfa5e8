//! Change subscribers.
//!
//! A [`Notifier`] is the "did change" channel owned by a root store core or a
//! shared reference. Observers register a callback and receive a
//! [`Subscription`] guard; dropping the guard unregisters the callback.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback = Arc<dyn Fn() + Send + Sync>;
type Callbacks = Mutex<Vec<(SubscriberId, Callback)>>;

/// A list of change callbacks.
///
/// Callbacks are invoked synchronously, in registration order, without any
/// lock held, so a callback may subscribe, unsubscribe or trigger further
/// notifications.
#[derive(Default)]
pub struct Notifier {
    callbacks: Arc<Callbacks>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered while the returned
    /// subscription is alive.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.callbacks.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            callbacks: Arc::downgrade(&self.callbacks),
        }
    }

    /// Invoke every registered callback once.
    pub fn notify(&self) {
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback();
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Guard for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    callbacks: Weak<Callbacks>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unsubscribe now. Equivalent to dropping the guard.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(callbacks) = self.callbacks.upgrade() {
            callbacks.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
