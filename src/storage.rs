//! Hierarchical file storage.
//!
//! A [`StorageFile`] persists a node [`Tree`](crate::node::Tree) through a key/value [store](store).
//! The tree is held in a single JSON document (the `tree.json` key), and the data of each dataset is held in fixed size chunks below `data/<oid>/c/`.
//! Chunks which were never written read back as the fill value of their dataset.
//!
//! Files move through the [`StorageFileState`]s `Closed`, `OpenForWrite`, optionally `SwmrActive`, and back to `Closed`.
//! In single-writer/multiple-reader (SWMR) mode the structure of the file is frozen, but datasets may still be written and grown.
//! A reader opened with [`OpenMode::SwmrRead`] observes growth with [`StorageFile::get_dynamic_data`] after each [`flush`](StorageFile::flush) of the writer.
//!
//! ```rust
//! # use std::sync::Arc;
//! use nxlazy::array::{DataType, RealizedArray};
//! use nxlazy::shape::UNLIMITED;
//! use nxlazy::storage::{store::MemoryStore, DatasetBuilder, OpenMode, StorageFile};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let mut file = StorageFile::create(store.clone(), "scan.nxs")?;
//! file.create_group("/", "entry", Some("NXentry"))?;
//! let mut frames = file.create_data(
//!     "/entry",
//!     "frames",
//!     DatasetBuilder::new(vec![0, 2], DataType::Int32).max_shape(vec![UNLIMITED, 2]),
//! )?;
//! file.activate_swmr_mode()?;
//!
//! let reader = StorageFile::open(store, "scan.nxs", OpenMode::SwmrRead)?;
//! let mut dynamic = reader.get_dynamic_data("/entry/frames")?;
//! assert_eq!(dynamic.array().shape(), &[0, 2]);
//!
//! frames.set_slice_at(&[0, 0], &RealizedArray::from_elements(vec![1, 2], &[1i32, 2])?)?;
//! file.flush()?;
//! assert!(dynamic.refresh_shape());
//! assert_eq!(dynamic.array().shape(), &[1, 2]);
//! # Ok(())
//! # }
//! ```

mod dataset;
mod storage_file;
mod storage_file_resolver;
mod storage_sync;
pub mod store;
mod store_key;
mod store_prefix;
mod tree_document;

use std::sync::Arc;

use thiserror::Error;

pub use dataset::{ChunkedDataset, DatasetBuilder, DatasetCreateError};
pub use storage_file::{OpenMode, StorageFile, StorageFileError, StorageFileState};
pub use storage_file_resolver::StorageFileResolver;
pub use storage_sync::{
    ListableStorageTraits, ReadableListableStorageTraits, ReadableStorageTraits,
    ReadableWritableListableStorageTraits, ReadableWritableStorageTraits, WritableStorageTraits,
};
pub use store_key::{StoreKey, StoreKeyError, StoreKeys};
pub use store_prefix::{StorePrefix, StorePrefixError, StorePrefixes};

/// The value of a store key, or [`None`] if the key does not exist.
pub type MaybeBytes = Option<Vec<u8>>;

/// [`Arc`] wrapped readable storage.
pub type ReadableStorage = Arc<dyn ReadableStorageTraits>;

/// [`Arc`] wrapped readable and listable storage.
pub type ReadableListableStorage = Arc<dyn ReadableListableStorageTraits>;

/// [`Arc`] wrapped readable, writable, and listable storage.
pub type ReadableWritableListableStorage = Arc<dyn ReadableWritableListableStorageTraits>;

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A write operation was attempted on a read only store.
    #[error("a write operation was attempted on a read only store")]
    ReadOnly,
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// A required key does not exist.
    #[error("key {0} not found")]
    KeyNotFound(StoreKey),
    /// An error parsing the document at a key.
    #[error("error parsing document {0}: {1}")]
    InvalidDocument(StoreKey, String),
    /// An invalid store prefix.
    #[error("invalid store prefix {0}")]
    StorePrefixError(#[from] StorePrefixError),
    /// An invalid store key.
    #[error("invalid store key {0}")]
    InvalidStoreKey(#[from] StoreKeyError),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
