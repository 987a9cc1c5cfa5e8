//! Keyed registry of shared references.
//!
//! A [`SharedContext`] hands out handles to persisted references by key id:
//! asking twice for the same key while a handle is alive returns a handle to
//! the same reference, so independent features agree on one value without a
//! process-wide registry. Pass the context to whatever builds the features.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::handle::{Shared, SharedReader};
use super::persistence::PersistenceKey;
use super::reference::ReferenceCore;
use crate::error::StoreError;

type Erased = Weak<dyn Any + Send + Sync>;

/// Registry of live shared references, keyed by persistence key id.
///
/// Entries are held weakly: once every handle to a reference is dropped the
/// next lookup loads the value from its key again.
#[derive(Clone, Default)]
pub struct SharedContext {
    references: Arc<DashMap<String, Erased>>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the reference for `key`, created from the stored value or
    /// `default` if there is no live one.
    ///
    /// Panics if a live reference for the same key id holds another type.
    #[track_caller]
    pub fn shared<T, K>(&self, key: K, default: T) -> Shared<T>
    where
        T: Clone + PartialEq + Debug + Send + Sync + 'static,
        K: PersistenceKey<T> + 'static,
    {
        let id = key.id();
        match self.references.entry(id) {
            Entry::Occupied(mut entry) => {
                if let Some(reference) = entry.get().upgrade() {
                    match reference.downcast::<ReferenceCore<T>>() {
                        Ok(core) => return Shared::from_core(core),
                        Err(_) => panic!(
                            "{}",
                            StoreError::KeyTypeMismatch {
                                key: entry.key().clone(),
                                requested: std::any::type_name::<T>(),
                            }
                        ),
                    }
                }
                tracing::debug!(key = %entry.key(), "replacing released shared reference");
                let core = ReferenceCore::persisted(default, Arc::new(key));
                entry.insert(erase(&core));
                Shared::from_core(core)
            }
            Entry::Vacant(entry) => {
                let core = ReferenceCore::persisted(default, Arc::new(key));
                entry.insert(erase(&core));
                Shared::from_core(core)
            }
        }
    }

    /// A read-only handle to the reference for `key`.
    #[track_caller]
    pub fn reader<T, K>(&self, key: K, default: T) -> SharedReader<T>
    where
        T: Clone + PartialEq + Debug + Send + Sync + 'static,
        K: PersistenceKey<T> + 'static,
    {
        self.shared(key, default).reader()
    }

    /// Number of references that still have a live handle.
    pub fn len(&self) -> usize {
        self.references.retain(|_, reference| reference.strong_count() > 0);
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn erase<T: Send + Sync + 'static>(core: &Arc<ReferenceCore<T>>) -> Erased {
    let erased: Arc<dyn Any + Send + Sync> = Arc::clone(core) as Arc<dyn Any + Send + Sync>;
    Arc::downgrade(&erased)
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedContext")
            .field("references", &self.references.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::MemoryStorage;

    #[test]
    fn same_key_same_reference() {
        let storage = MemoryStorage::new();
        let context = SharedContext::new();

        let a = context.shared(storage.key::<u32>("count"), 0);
        let b = context.shared(storage.key::<u32>("count"), 100);
        assert!(a.same_reference(&b));
        assert_eq!(b.get(), 0);

        a.set(3);
        assert_eq!(b.get(), 3);
        assert_eq!(context.reader(storage.key::<u32>("count"), 0).get(), 3);
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn released_references_reload_from_storage() {
        let storage = MemoryStorage::new();
        let context = SharedContext::new();

        let first = context.shared(storage.key::<String>("name"), "default".to_string());
        first.set("saved".to_string());
        let id = first.reference_id();
        drop(first);
        assert!(context.is_empty());

        let second = context.shared(storage.key::<String>("name"), "default".to_string());
        assert_ne!(second.reference_id(), id);
        assert_eq!(second.get(), "saved");
    }

    #[test]
    fn mismatched_type_leaves_the_live_reference_alone() {
        let storage = MemoryStorage::new();
        let context = SharedContext::new();
        let count = context.shared(storage.key::<u32>("count"), 1);

        let panic = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            context.shared(storage.key::<String>("count"), String::new())
        }))
        .expect_err("a different type for a live key must panic");
        let message = panic.downcast_ref::<String>().cloned().unwrap_or_default();
        assert!(message.contains("`memory:count` requested as `alloc::string::String`"));

        let again = context.shared(storage.key::<u32>("count"), 0);
        assert!(again.same_reference(&count));
        assert_eq!(again.get(), 1);
    }

    #[test]
    fn contexts_are_independent() {
        let storage = MemoryStorage::new();
        let a = SharedContext::new().shared(storage.key::<u32>("count"), 0);
        let b = SharedContext::new().shared(storage.key::<u32>("count"), 0);
        assert!(!a.same_reference(&b));
    }
}
