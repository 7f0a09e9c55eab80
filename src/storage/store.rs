//! Stores.
//!
//! A store maps [`StoreKey`](super::StoreKey)s to values (bytes).
//! [`MemoryStore`] keeps values in memory and [`FilesystemStore`] keeps one file per key.

mod filesystem_store;
mod memory_store;

pub use filesystem_store::{FilesystemStore, FilesystemStoreCreateError};
pub use memory_store::MemoryStore;
