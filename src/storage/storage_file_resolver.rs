use std::{collections::HashMap, path::PathBuf, sync::Arc};

use parking_lot::RwLock;

use crate::node::{NodeGraphError, TreeFile, TreeFileResolver};

use super::{store::FilesystemStore, OpenMode, ReadableWritableListableStorage, StorageFile};

/// Opens the files targeted by external links, read only.
///
/// A URI is looked up in the registered stores first, and otherwise, if a base directory is set, as a [`FilesystemStore`] directory relative to it.
/// Opened trees are cached until [`clear`](StorageFileResolver::clear) is called.
#[derive(Default)]
pub struct StorageFileResolver {
    stores: RwLock<HashMap<String, ReadableWritableListableStorage>>,
    base_directory: Option<PathBuf>,
    opened: RwLock<HashMap<String, Arc<TreeFile>>>,
}

impl std::fmt::Debug for StorageFileResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFileResolver")
            .field("uris", &self.stores.read().keys().collect::<Vec<_>>())
            .field("base_directory", &self.base_directory)
            .finish_non_exhaustive()
    }
}

impl StorageFileResolver {
    /// Create a resolver without any stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver which also opens URIs as directories below `base_directory`.
    #[must_use]
    pub fn with_base_directory(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: Some(base_directory.into()),
            ..Self::default()
        }
    }

    /// Register the store holding the file at `uri`.
    pub fn register(&self, uri: impl Into<String>, store: ReadableWritableListableStorage) {
        let uri = uri.into();
        self.opened.write().remove(&uri);
        self.stores.write().insert(uri, store);
    }

    /// Forget all opened trees, so that they are reread on the next resolution.
    pub fn clear(&self) {
        self.opened.write().clear();
    }

    fn store(&self, uri: &str) -> Result<ReadableWritableListableStorage, NodeGraphError> {
        if let Some(store) = self.stores.read().get(uri) {
            return Ok(store.clone());
        }
        let Some(base_directory) = &self.base_directory else {
            return Err(NodeGraphError::external_tree(uri, "no store registered"));
        };
        let store = FilesystemStore::new_read_only(base_directory.join(uri))
            .map_err(|err| NodeGraphError::external_tree(uri, err))?;
        Ok(Arc::new(store))
    }
}

impl TreeFileResolver for StorageFileResolver {
    fn resolve_tree(&self, uri: &str) -> Result<Arc<TreeFile>, NodeGraphError> {
        if let Some(tree) = self.opened.read().get(uri) {
            return Ok(tree.clone());
        }
        let tree = StorageFile::open(self.store(uri)?, uri, OpenMode::ReadOnly)
            .and_then(StorageFile::into_tree_file)
            .map_err(|err| NodeGraphError::external_tree(uri, err))?;
        tracing::debug!(uri, "opened external tree");
        let tree = Arc::new(tree);
        self.opened.write().insert(uri.to_string(), tree.clone());
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::RealizedArray,
        storage::store::MemoryStore,
    };

    #[test]
    fn storage_file_resolver_external() {
        let detector = Arc::new(MemoryStore::new());
        let mut file = StorageFile::create(detector.clone(), "detector.nxs").unwrap();
        file.create_group("/", "entry", Some("NXentry")).unwrap();
        let data = RealizedArray::from_elements(vec![2, 2], &[1u16, 2, 3, 4]).unwrap();
        file.create_data_from("/entry", "data", &data).unwrap();
        file.close().unwrap();

        let master = Arc::new(MemoryStore::new());
        let mut file = StorageFile::create(master.clone(), "master.nxs").unwrap();
        file.create_group("/", "entry", Some("NXentry")).unwrap();
        file.link_external("/entry", "data", "detector.nxs", "/entry/data")
            .unwrap();
        file.close().unwrap();

        let resolver = Arc::new(StorageFileResolver::new());
        resolver.register("detector.nxs", detector);
        let file = StorageFile::open(master, "master.nxs", OpenMode::ReadOnly)
            .unwrap()
            .with_resolver(resolver.clone());
        let array = file.get_data("/entry/data").unwrap();
        assert_eq!(
            array.realize().unwrap().to_elements::<u16>().unwrap(),
            vec![1, 2, 3, 4]
        );
        assert!(!file.get_dynamic_data("/entry/data").unwrap().is_dynamic());
        assert!(resolver.resolve_tree("missing.nxs").is_err());
    }

    #[test]
    fn storage_file_resolver_base_directory() {
        let path = tempfile::TempDir::new().unwrap();
        let store = Arc::new(FilesystemStore::new(path.path().join("scan.nxs")).unwrap());
        let mut file = StorageFile::create(store, "scan.nxs").unwrap();
        file.create_group("/", "entry", None).unwrap();
        file.close().unwrap();

        let resolver = StorageFileResolver::with_base_directory(path.path());
        let tree = resolver.resolve_tree("scan.nxs").unwrap();
        assert_eq!(tree.uri(), "scan.nxs");
        assert!(tree.find_by_path("/entry").is_some());
        assert!(Arc::ptr_eq(&tree, &resolver.resolve_tree("scan.nxs").unwrap()));
        resolver.clear();
        assert!(!Arc::ptr_eq(&tree, &resolver.resolve_tree("scan.nxs").unwrap()));
    }
}
