//! `Shared` and `SharedReader` handles.

use std::fmt::{self, Debug};
use std::sync::Arc;

use super::access::{read_with, write_with, Access, Defaulted, Projected};
use super::persistence::PersistenceKey;
use super::reference::{Reference, ReferenceCore};
use crate::error::AssertionFailure;
use crate::path::Lens;
use crate::subscriber::Subscription;

/// Read-write handle to a shared value.
///
/// Every handle derived from the same root, by cloning or projecting, reads
/// and writes the same storage. A write through any of them is visible
/// through all of them immediately.
///
/// ```rust
/// use tether_core::shared::Shared;
/// use tether_core::lens;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Profile { name: String, age: u32 }
///
/// let profile = Shared::new(Profile { name: "Ada".into(), age: 36 });
/// let age = profile.project(lens!(Profile => age));
///
/// age.set(37);
/// assert_eq!(profile.get().age, 37);
/// ```
pub struct Shared<V> {
    access: Arc<dyn Access<V>>,
}

impl<T> Shared<T>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    /// Create a new reference holding `value`, bound to the calling thread.
    pub fn new(value: T) -> Self {
        Self {
            access: ReferenceCore::new(value),
        }
    }

    /// Create a new reference persisted through `key`. A value already stored
    /// under the key replaces `default`.
    pub fn persisted<K>(key: K, default: T) -> Self
    where
        K: PersistenceKey<T> + 'static,
    {
        Self::from_core(ReferenceCore::persisted(default, Arc::new(key)))
    }

    pub(crate) fn from_core(core: Arc<ReferenceCore<T>>) -> Self {
        Self { access: core }
    }
}

impl<V: 'static> Shared<V> {
    fn core(&self) -> &dyn Reference {
        self.access.reference()
    }

    #[track_caller]
    fn check(&self, operation: &'static str) {
        self.core().isolation().assert_current(operation);
    }

    /// A copy of the current value.
    #[track_caller]
    pub fn get(&self) -> V
    where
        V: Clone,
    {
        self.check("get");
        read_with(self.access.as_ref(), V::clone)
    }

    /// Read the current value in place.
    #[track_caller]
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        self.check("with");
        read_with(self.access.as_ref(), f)
    }

    /// Replace the value. Subscribers are notified once, after the write.
    #[track_caller]
    pub fn set(&self, value: V) {
        self.check("set");
        write_with(self.access.as_ref(), move |current| *current = value);
    }

    /// Mutate the value in place. Subscribers are notified once, after the
    /// write.
    ///
    /// Accessing the same reference from inside `f` panics.
    #[track_caller]
    pub fn update<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        self.check("update");
        write_with(self.access.as_ref(), f)
    }

    /// A handle to a part of the value.
    pub fn project<U: 'static>(&self, lens: Lens<V, U>) -> Shared<U> {
        Shared {
            access: Arc::new(Projected::new(Arc::clone(&self.access), lens)),
        }
    }

    /// A read-only view of this handle.
    pub fn reader(&self) -> SharedReader<V> {
        SharedReader {
            access: Arc::clone(&self.access),
        }
    }

    /// Call `f` with the value after every write to the reference.
    #[track_caller]
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.check("subscribe");
        subscribe(&self.access, f)
    }

    /// Identity of the underlying reference.
    pub fn reference_id(&self) -> u64 {
        self.core().id()
    }

    /// Whether both handles lead to the same reference.
    pub fn same_reference<U: 'static>(&self, other: &Shared<U>) -> bool {
        self.reference_id() == other.reference_id()
    }

    /// Load the value again through the reference's persistence key.
    /// Subscribers are notified when it changed.
    #[track_caller]
    pub fn reload(&self) {
        self.check("reload");
        self.core().reload();
    }

    /// Open an assertion scope on the reference.
    ///
    /// Panics if one is already open.
    #[track_caller]
    pub fn begin_assertion(&self) {
        self.check("begin_assertion");
        self.core().begin_assertion();
    }

    /// Assert that the live value equals the last asserted value with
    /// `transform` applied.
    ///
    /// The transform runs against the snapshot through this handle's path.
    /// Afterwards the snapshot catches up with the live value, so the next
    /// `assert` describes only the changes made since.
    #[track_caller]
    pub fn assert(&self, transform: impl FnOnce(&mut V)) -> Result<(), AssertionFailure> {
        self.check("assert");
        let core = self.core();
        if core.snapshot_matches()? {
            return Err(AssertionFailure::NoChange {
                value: core.describe_live(),
            });
        }

        {
            let _asserting = Asserting::enter(core);
            write_with(self.access.as_ref(), transform);
        }

        let result = if core.snapshot_matches()? {
            Ok(())
        } else {
            Err(AssertionFailure::Mismatch {
                expected: core.describe_snapshot(),
                actual: core.describe_live(),
            })
        };
        core.reset_snapshot();
        result
    }

    /// Close the assertion scope.
    ///
    /// Fails when the live value changed after the last successful `assert`.
    #[track_caller]
    pub fn end_assertion(&self) -> Result<(), AssertionFailure> {
        self.check("end_assertion");
        self.core().end_assertion()
    }
}

impl<V: Clone + Send + Sync + 'static> Shared<Option<V>> {
    /// A handle to the wrapped value, or `None` if it is absent now.
    ///
    /// The handle remembers the value it saw here. If the option later
    /// becomes `None`, reads yield that value and writes store `Some` again.
    #[track_caller]
    pub fn unwrapped(&self) -> Option<Shared<V>> {
        let default = self.get()?;
        Some(Shared {
            access: Arc::new(Defaulted::new(Arc::clone(&self.access), default)),
        })
    }
}

impl<V> Clone for Shared<V> {
    fn clone(&self) -> Self {
        Self {
            access: Arc::clone(&self.access),
        }
    }
}

impl<V: 'static> fmt::Debug for Shared<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("reference", &self.reference_id())
            .finish_non_exhaustive()
    }
}

/// Read-only handle to a shared value.
pub struct SharedReader<V> {
    access: Arc<dyn Access<V>>,
}

impl<V: 'static> SharedReader<V> {
    #[track_caller]
    fn check(&self, operation: &'static str) {
        self.access.reference().isolation().assert_current(operation);
    }

    #[track_caller]
    pub fn get(&self) -> V
    where
        V: Clone,
    {
        self.check("get");
        read_with(self.access.as_ref(), V::clone)
    }

    #[track_caller]
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        self.check("with");
        read_with(self.access.as_ref(), f)
    }

    pub fn project<U: 'static>(&self, lens: Lens<V, U>) -> SharedReader<U> {
        SharedReader {
            access: Arc::new(Projected::new(Arc::clone(&self.access), lens)),
        }
    }

    #[track_caller]
    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.check("subscribe");
        subscribe(&self.access, f)
    }

    pub fn reference_id(&self) -> u64 {
        self.access.reference().id()
    }

    pub fn same_reference<U: 'static>(&self, other: &SharedReader<U>) -> bool {
        self.reference_id() == other.reference_id()
    }
}

impl<V: Clone + Send + Sync + 'static> SharedReader<Option<V>> {
    /// See [`Shared::unwrapped`].
    #[track_caller]
    pub fn unwrapped(&self) -> Option<SharedReader<V>> {
        let default = self.get()?;
        Some(SharedReader {
            access: Arc::new(Defaulted::new(Arc::clone(&self.access), default)),
        })
    }
}

impl<V> Clone for SharedReader<V> {
    fn clone(&self) -> Self {
        Self {
            access: Arc::clone(&self.access),
        }
    }
}

impl<V: 'static> From<Shared<V>> for SharedReader<V> {
    fn from(shared: Shared<V>) -> Self {
        Self { access: shared.access }
    }
}

impl<V: 'static> fmt::Debug for SharedReader<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedReader")
            .field("reference", &self.reference_id())
            .finish_non_exhaustive()
    }
}

fn subscribe<V, F>(access: &Arc<dyn Access<V>>, f: F) -> Subscription
where
    V: 'static,
    F: Fn(&V) + Send + Sync + 'static,
{
    let chain = Arc::clone(access);
    access
        .reference()
        .notifier()
        .subscribe(move || chain.read(&mut |value| f(value)))
}

/// Keeps the reference in asserting mode for the lifetime of the guard.
struct Asserting<'a> {
    core: &'a dyn Reference,
}

impl<'a> Asserting<'a> {
    fn enter(core: &'a dyn Reference) -> Self {
        core.set_asserting(true);
        Self { core }
    }
}

impl Drop for Asserting<'_> {
    fn drop(&mut self) {
        self.core.set_asserting(false);
    }
}
