//! Change tracking for shared references.
//!
//! While an assertion scope is open the tracker keeps a snapshot of the
//! reference's value. Tests mutate the live value through the code under
//! test, then describe the expected mutation with `assert`: the expectation
//! is applied to the snapshot (writes are redirected there while the
//! reference is in asserting mode) and the result must equal the live value.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{AssertionFailure, StoreError};

pub(crate) struct ChangeTracker<T> {
    snapshot: RwLock<Option<T>>,
    asserting: AtomicBool,
}

impl<T> Default for ChangeTracker<T> {
    fn default() -> Self {
        Self {
            snapshot: RwLock::new(None),
            asserting: AtomicBool::new(false),
        }
    }
}

impl<T: Clone + PartialEq + Debug> ChangeTracker<T> {
    /// Open a scope with a snapshot of `live`.
    ///
    /// Panics if a scope is already open on this reference.
    #[track_caller]
    pub(crate) fn begin(&self, reference: u64, live: &T) {
        let mut snapshot = self.snapshot.write();
        if snapshot.is_some() {
            panic!("{}", StoreError::NestedAssertion { reference });
        }
        *snapshot = Some(live.clone());
    }

    /// Close the scope and discard the snapshot.
    pub(crate) fn end(&self, live: &T) -> Result<(), AssertionFailure> {
        self.asserting.store(false, Ordering::SeqCst);
        match self.snapshot.write().take() {
            None => Err(AssertionFailure::NotTracking),
            Some(asserted) if asserted != *live => Err(AssertionFailure::UnassertedChange {
                asserted: format!("{asserted:?}"),
                live: format!("{live:?}"),
            }),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// Whether the snapshot equals `live`.
    pub(crate) fn matches(&self, live: &T) -> Result<bool, AssertionFailure> {
        match self.snapshot.read().as_ref() {
            None => Err(AssertionFailure::NotTracking),
            Some(snapshot) => Ok(snapshot == live),
        }
    }

    /// Replace the snapshot with `live`, if a scope is open.
    pub(crate) fn reset(&self, live: &T) {
        if let Some(snapshot) = self.snapshot.write().as_mut() {
            *snapshot = live.clone();
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self.snapshot.read().as_ref() {
            Some(snapshot) => format!("{snapshot:?}"),
            None => String::from("<no snapshot>"),
        }
    }
}

impl<T> ChangeTracker<T> {
    pub(crate) fn is_asserting(&self) -> bool {
        self.asserting.load(Ordering::SeqCst)
    }

    pub(crate) fn set_asserting(&self, asserting: bool) {
        self.asserting.store(asserting, Ordering::SeqCst);
    }

    /// The snapshot lock, for redirected reads and writes.
    pub(crate) fn snapshot(&self) -> &RwLock<Option<T>> {
        &self.snapshot
    }
}
