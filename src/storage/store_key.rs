use derive_more::{Display, From};
use thiserror::Error;

use crate::node::Oid;

use super::StorePrefix;

/// A store key.
///
/// A key is a `/` delimited string which neither starts nor ends with `/`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct StoreKey(String);

/// An invalid store key.
#[derive(Debug, From, Error)]
#[error("invalid store key {0}")]
pub struct StoreKeyError(String);

/// A list of [`StoreKey`].
pub type StoreKeys = Vec<StoreKey>;

impl StoreKey {
    /// Create a new store key from `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreKeyError`] if `key` is not valid according to [`StoreKey::validate()`].
    pub fn new(key: impl Into<String>) -> Result<Self, StoreKeyError> {
        let key = key.into();
        if Self::validate(&key) {
            Ok(Self(key))
        } else {
            Err(StoreKeyError(key))
        }
    }

    /// The key of the tree document of a file.
    #[must_use]
    pub fn tree_document() -> Self {
        Self("tree.json".to_string())
    }

    /// The key of the chunk at `chunk_indices` of the dataset `oid`.
    ///
    /// Chunk indices are `/` separated, e.g. `data/3/c/0/1`. The single chunk of a scalar dataset is `data/3/c`.
    #[must_use]
    pub fn chunk(oid: Oid, chunk_indices: &[u64]) -> Self {
        let mut key = format!("data/{}/c", oid.get());
        for index in chunk_indices {
            key.push('/');
            key.push_str(&index.to_string());
        }
        Self(key)
    }

    /// Extracts a string slice of the underlying key [String].
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a key:
    /// - a key is non-empty, and
    /// - it neither starts nor ends with `/`.
    #[must_use]
    pub fn validate(key: &str) -> bool {
        !key.is_empty() && !key.starts_with('/') && !key.ends_with('/')
    }

    /// Returns true if the key has prefix `prefix`.
    #[must_use]
    pub fn has_prefix(&self, prefix: &StorePrefix) -> bool {
        self.0.starts_with(prefix.as_str())
    }

    /// Returns the parent of this key.
    #[must_use]
    pub fn parent(&self) -> StorePrefix {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => StorePrefix::from_key_parent(parent),
            None => StorePrefix::root(),
        }
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = StoreKeyError;

    fn try_from(key: &str) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}
