//! An in-memory store.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::storage::{
    ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey, StoreKeys,
    StorePrefix, WritableStorageTraits,
};

/// An in-memory store.
///
/// Values are replaced as a whole, so concurrent readers observe either the old or the new value of a key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<StoreKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new, empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the store holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.read().is_empty()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.read().get(key).cloned())
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self
            .data_map
            .read()
            .get(key)
            .map(|value| value.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.data_map.write().insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.write().remove(key);
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.data_map.write().retain(|key, _| !key.has_prefix(prefix));
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .data_map
            .read()
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        Ok(self
            .data_map
            .read()
            .iter()
            .filter(|(key, _)| key.has_prefix(prefix))
            .map(|(_, value)| value.len() as u64)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: &str) -> StoreKey {
        StoreKey::new(key).unwrap()
    }

    fn prefix(prefix: &str) -> StorePrefix {
        StorePrefix::new(prefix).unwrap()
    }

    #[test]
    fn memory_set() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let ab = key("a/b");
        store.set(&ab, &[0, 1, 2])?;
        assert_eq!(store.get(&ab)?.unwrap(), &[0, 1, 2]);
        assert_eq!(store.size_key(&ab)?, Some(3));
        store.set(&ab, &[3])?;
        assert_eq!(store.get(&ab)?.unwrap(), &[3]);
        assert_eq!(store.get(&key("a/c"))?, None);
        Ok(())
    }

    #[test]
    fn memory_list() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        store.set(&key("a/b"), &[0, 1])?;
        store.set(&key("a/c/d"), &[2])?;
        store.set(&key("b"), &[3, 4, 5])?;
        assert_eq!(store.list()?.len(), 3);
        assert_eq!(
            store.list_prefix(&prefix("a/"))?,
            vec![key("a/b"), key("a/c/d")]
        );
        assert_eq!(store.size()?, 6);
        assert_eq!(store.size_prefix(&prefix("a/"))?, 3);
        store.erase_prefix(&prefix("a/"))?;
        assert_eq!(store.list()?, vec![key("b")]);
        store.erase(&key("b"))?;
        store.erase(&key("b"))?;
        assert!(store.is_empty());
        Ok(())
    }
}
