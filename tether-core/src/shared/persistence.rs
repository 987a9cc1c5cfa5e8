//! Persistence keys.
//!
//! A [`PersistenceKey`] tells a shared reference where its value lives
//! outside the process: the reference loads through the key when it is
//! created or reloaded and saves through it after every write. Failures are
//! logged by the reference and never surface to the writer.
//!
//! [`MemoryStorage`] is a keyed in-memory store of JSON values. Its
//! [`StorageKey`]s persist any serde type, which makes it a drop-in stand-in
//! for a real backend in tests.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PersistenceError;

/// Load/save contract between a shared reference and its storage.
pub trait PersistenceKey<T>: Send + Sync {
    /// Identity of the stored value. Two keys with the same id address the
    /// same value.
    fn id(&self) -> String;

    /// Load the stored value, `None` if nothing is stored yet.
    fn load(&self, initial: &T) -> Result<Option<T>, PersistenceError>;

    fn save(&self, value: &T) -> Result<(), PersistenceError>;
}

/// In-memory keyed storage. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, serde_json::Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A key for the value stored under `name`.
    pub fn key<T>(&self, name: &str) -> StorageKey<T> {
        StorageKey {
            name: name.to_string(),
            storage: self.clone(),
            _value: PhantomData,
        }
    }

    /// The raw stored value.
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, name: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(name.into(), value);
    }

    pub fn remove(&self, name: &str) -> Option<serde_json::Value> {
        self.entries.remove(name).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Key into a [`MemoryStorage`], (de)serializing values with serde.
pub struct StorageKey<T> {
    name: String,
    storage: MemoryStorage,
    _value: PhantomData<fn() -> T>,
}

impl<T> StorageKey<T> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> PersistenceKey<T> for StorageKey<T>
where
    T: Serialize + DeserializeOwned,
{
    fn id(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn load(&self, _initial: &T) -> Result<Option<T>, PersistenceError> {
        match self.storage.get(&self.name) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn save(&self, value: &T) -> Result<(), PersistenceError> {
        self.storage.insert(self.name.clone(), serde_json::to_value(value)?);
        Ok(())
    }
}

impl<T> Clone for StorageKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            storage: self.storage.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StorageKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageKey").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        theme: String,
        font_size: u8,
    }

    #[test]
    fn save_then_load() {
        let storage = MemoryStorage::new();
        let key = storage.key::<Settings>("settings");
        let settings = Settings {
            theme: "dark".into(),
            font_size: 14,
        };

        assert_eq!(key.load(&settings).unwrap(), None);
        key.save(&settings).unwrap();
        assert_eq!(key.load(&settings).unwrap(), Some(settings));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn keys_with_the_same_name_share_identity() {
        let storage = MemoryStorage::new();
        let a = storage.key::<u32>("count");
        let b = storage.key::<u32>("count");
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), storage.key::<u32>("other").id());
    }

    #[test]
    fn type_mismatch_is_a_serialization_error() {
        let storage = MemoryStorage::new();
        storage.insert("count", serde_json::json!("not a number"));

        let err = storage.key::<u32>("count").load(&0).unwrap_err();
        assert!(matches!(err, PersistenceError::Serialization(_)));
    }
}
