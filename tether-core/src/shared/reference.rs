//! Shared references.
//!
//! A [`ReferenceCore`] is the one owner of a shared value. Every handle
//! derived from it, however deeply projected, reads and writes this single
//! storage location. The core also carries the change notifier, the change
//! tracker and the optional persistence key.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::access::Access;
use super::persistence::PersistenceKey;
use super::tracker::ChangeTracker;
use crate::error::{AssertionFailure, StoreError};
use crate::isolation::Isolation;
use crate::subscriber::Notifier;

static REFERENCE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_reference_id() -> u64 {
    REFERENCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Operations on a reference that do not depend on the value type.
pub(crate) trait Reference: Send + Sync {
    fn id(&self) -> u64;

    fn isolation(&self) -> Isolation;

    fn notifier(&self) -> &Notifier;

    fn begin_assertion(&self);

    fn end_assertion(&self) -> Result<(), AssertionFailure>;

    /// Whether the snapshot equals the live value.
    fn snapshot_matches(&self) -> Result<bool, AssertionFailure>;

    fn set_asserting(&self, asserting: bool);

    fn reset_snapshot(&self);

    fn describe_live(&self) -> String;

    fn describe_snapshot(&self) -> String;

    /// Load the value again through the persistence key.
    fn reload(&self);
}

pub(crate) struct ReferenceCore<T> {
    id: u64,
    value: RwLock<T>,
    tracker: ChangeTracker<T>,
    key: Option<Arc<dyn PersistenceKey<T>>>,
    notifier: Notifier,
    isolation: Isolation,
}

impl<T> ReferenceCore<T>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    pub(crate) fn new(value: T) -> Arc<Self> {
        Self::build(value, None)
    }

    /// A reference backed by `key`. The stored value, if any, replaces
    /// `initial`.
    pub(crate) fn persisted(initial: T, key: Arc<dyn PersistenceKey<T>>) -> Arc<Self> {
        let value = match key.load(&initial) {
            Ok(Some(stored)) => stored,
            Ok(None) => initial,
            Err(err) => {
                tracing::warn!(key = %key.id(), error = %err, "failed to load persisted value; using default");
                initial
            }
        };
        Self::build(value, Some(key))
    }

    fn build(value: T, key: Option<Arc<dyn PersistenceKey<T>>>) -> Arc<Self> {
        Arc::new(Self {
            id: next_reference_id(),
            value: RwLock::new(value),
            tracker: ChangeTracker::default(),
            key,
            notifier: Notifier::new(),
            isolation: Isolation::current(),
        })
    }

    #[track_caller]
    fn reentrant(&self) -> ! {
        panic!("{}", StoreError::ReentrantAccess { reference: self.id })
    }

    fn live(&self) -> T {
        let Some(value) = self.value.try_read() else {
            self.reentrant()
        };
        value.clone()
    }

    fn persist(&self) {
        let Some(key) = &self.key else {
            return;
        };
        let value = self.live();
        if let Err(err) = key.save(&value) {
            tracing::warn!(reference = self.id, key = %key.id(), error = %err, "failed to persist shared value");
        }
    }
}

impl<T> Access<T> for ReferenceCore<T>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn read(&self, f: &mut dyn FnMut(&T)) {
        if self.tracker.is_asserting() {
            let Some(snapshot) = self.tracker.snapshot().try_read() else {
                self.reentrant()
            };
            if let Some(snapshot) = snapshot.as_ref() {
                f(snapshot);
                return;
            }
        }
        let Some(value) = self.value.try_read() else {
            self.reentrant()
        };
        f(&value);
    }

    fn write(&self, f: &mut dyn FnMut(&mut T)) {
        if self.tracker.is_asserting() {
            let Some(mut snapshot) = self.tracker.snapshot().try_write() else {
                self.reentrant()
            };
            if let Some(snapshot) = snapshot.as_mut() {
                f(snapshot);
            }
            return;
        }

        {
            let Some(mut value) = self.value.try_write() else {
                self.reentrant()
            };
            f(&mut value);
        }
        self.persist();
        self.notifier.notify();
    }

    fn reference(&self) -> &dyn Reference {
        self
    }
}

impl<T> Reference for ReferenceCore<T>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn id(&self) -> u64 {
        self.id
    }

    fn isolation(&self) -> Isolation {
        self.isolation
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn begin_assertion(&self) {
        self.tracker.begin(self.id, &self.live());
    }

    fn end_assertion(&self) -> Result<(), AssertionFailure> {
        self.tracker.end(&self.live())
    }

    fn snapshot_matches(&self) -> Result<bool, AssertionFailure> {
        self.tracker.matches(&self.live())
    }

    fn set_asserting(&self, asserting: bool) {
        self.tracker.set_asserting(asserting);
    }

    fn reset_snapshot(&self) {
        self.tracker.reset(&self.live());
    }

    fn describe_live(&self) -> String {
        format!("{:?}", self.live())
    }

    fn describe_snapshot(&self) -> String {
        self.tracker.describe()
    }

    fn reload(&self) {
        let Some(key) = &self.key else {
            return;
        };
        let current = self.live();
        let loaded = match key.load(&current) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(reference = self.id, key = %key.id(), error = %err, "failed to reload shared value");
                return;
            }
        };
        if loaded == current {
            return;
        }
        {
            let Some(mut value) = self.value.try_write() else {
                self.reentrant()
            };
            *value = loaded;
        }
        tracing::debug!(reference = self.id, key = %key.id(), "reloaded shared value");
        self.notifier.notify();
    }
}
