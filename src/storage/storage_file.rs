use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use derive_more::Display;
use thiserror::Error;

use crate::{
    array::{ArrayError, DynamicLazyArray, LazyArray, RealizedArray, WritableLazyArray},
    node::{
        Attribute, GroupNode, NoExternalTrees, NodeGraphError, NodeLink, NodeLocation, Oid,
        TreeFile, TreeFileResolver,
    },
    slice::SliceND,
};

use super::{
    dataset::{ChunkedDataset, DatasetBuilder, DatasetCreateError},
    tree_document::{DocumentShapeRefresher, TreeDocument, TreeDocumentError},
    ReadableWritableListableStorage, StorageError, StoreKey, StorePrefix,
};

/// How an existing file is opened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum OpenMode {
    /// Read a file which is no longer being written.
    ReadOnly,
    /// Modify a file.
    ReadWrite,
    /// Read a file which may still be written by an SWMR writer.
    SwmrRead,
}

/// The state of a [`StorageFile`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum StorageFileState {
    /// The file has been closed.
    Closed,
    /// The file is open for structural and data writes.
    OpenForWrite,
    /// The structure is frozen, data may still be written and grown.
    SwmrActive,
    /// The file is open for reading.
    OpenForRead,
}

/// A storage file error.
#[derive(Debug, Error)]
pub enum StorageFileError {
    /// The file has been closed.
    #[error("file {0} is not open")]
    NotOpen(String),
    /// A structural operation was attempted in SWMR mode.
    #[error("{0} is forbidden while SWMR mode is active")]
    StructuralMutationForbidden(&'static str),
    /// There is no suitable node at a path.
    #[error("node not found: {0}")]
    NodeNotFound(String),
    /// A write was attempted on a file opened for reading.
    #[error("file {0} is open for reading")]
    ReadOnly(String),
    /// The store failed.
    #[error(transparent)]
    IOFailure(#[from] StorageError),
    /// A node graph error.
    #[error(transparent)]
    NodeGraph(NodeGraphError),
    /// An array error.
    #[error(transparent)]
    Array(#[from] ArrayError),
    /// A dataset could not be created.
    #[error(transparent)]
    DatasetCreate(#[from] DatasetCreateError),
}

impl From<NodeGraphError> for StorageFileError {
    fn from(err: NodeGraphError) -> Self {
        match err {
            NodeGraphError::NodeNotFound(path) => Self::NodeNotFound(path),
            err => Self::NodeGraph(err),
        }
    }
}

impl From<TreeDocumentError> for StorageFileError {
    fn from(err: TreeDocumentError) -> Self {
        match err {
            TreeDocumentError::NodeGraph(err) => err.into(),
            TreeDocumentError::Array(err) => err.into(),
        }
    }
}

/// A hierarchical file of groups, datasets and links, persisted in a store.
///
/// Structural operations take `&mut self`. Data is written through the [`WritableLazyArray`]s returned by [`create_data`](StorageFile::create_data) and [`writable_array`](StorageFile::writable_array), which may be sent to other threads.
/// Changes to the structure and the shapes of datasets become visible to other handles on [`flush`](StorageFile::flush).
///
/// A writable file which is dropped without being closed is closed on drop, and any error is logged.
pub struct StorageFile {
    store: ReadableWritableListableStorage,
    tree: TreeFile,
    datasets: BTreeMap<Oid, Arc<ChunkedDataset>>,
    mode: OpenMode,
    state: StorageFileState,
    resolver: Arc<dyn TreeFileResolver + Send + Sync>,
}

impl Debug for StorageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageFile")
            .field("uri", &self.uri())
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("num_nodes", &self.tree.num_nodes())
            .finish_non_exhaustive()
    }
}

impl StorageFile {
    /// Create a new, empty file at `uri` in `store`, replacing any file already there.
    ///
    /// # Errors
    /// Returns [`StorageFileError::IOFailure`] if the store cannot be written.
    pub fn create(
        store: ReadableWritableListableStorage,
        uri: &str,
    ) -> Result<Self, StorageFileError> {
        store.erase(&StoreKey::tree_document())?;
        store.erase_prefix(&StorePrefix::datasets())?;
        let file = Self {
            store,
            tree: TreeFile::new(uri),
            datasets: BTreeMap::new(),
            mode: OpenMode::ReadWrite,
            state: StorageFileState::OpenForWrite,
            resolver: Arc::new(NoExternalTrees),
        };
        file.write_document(false, false)?;
        tracing::debug!(uri, "created file");
        Ok(file)
    }

    /// Open the file at `uri` in `store`.
    ///
    /// # Errors
    /// Returns [`StorageFileError::IOFailure`] if the file does not exist or its tree document is invalid.
    pub fn open(
        store: ReadableWritableListableStorage,
        uri: &str,
        mode: OpenMode,
    ) -> Result<Self, StorageFileError> {
        let document = TreeDocument::read(&*store)?
            .ok_or_else(|| StorageError::KeyNotFound(StoreKey::tree_document()))?;
        if mode == OpenMode::ReadWrite && document.swmr && !document.closed {
            tracing::warn!(uri, "opening a file whose SWMR writer did not close it");
        }
        let (tree, datasets) = document.into_tree(&store, mode != OpenMode::ReadWrite)?;
        let state = match mode {
            OpenMode::ReadWrite => StorageFileState::OpenForWrite,
            OpenMode::ReadOnly | OpenMode::SwmrRead => StorageFileState::OpenForRead,
        };
        tracing::debug!(uri, %mode, num_nodes = tree.num_nodes(), "opened file");
        Ok(Self {
            store,
            tree: TreeFile::from_tree(uri, tree),
            datasets,
            mode,
            state,
            resolver: Arc::new(NoExternalTrees),
        })
    }

    /// Resolve external links through `resolver`, such as a [`StorageFileResolver`](super::StorageFileResolver).
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn TreeFileResolver + Send + Sync>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Return the URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.tree.uri()
    }

    /// Return the state.
    #[must_use]
    pub fn state(&self) -> StorageFileState {
        self.state
    }

    /// Return the mode the file was opened with. Created files are [`OpenMode::ReadWrite`].
    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns true unless the file has been closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state != StorageFileState::Closed
    }

    /// Return the underlying store.
    #[must_use]
    pub fn store(&self) -> &ReadableWritableListableStorage {
        &self.store
    }

    /// Return the node tree.
    ///
    /// # Errors
    /// Returns [`StorageFileError::NotOpen`] if the file is closed.
    pub fn tree(&self) -> Result<&TreeFile, StorageFileError> {
        self.check_open()?;
        Ok(&self.tree)
    }

    fn check_open(&self) -> Result<(), StorageFileError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StorageFileError::NotOpen(self.uri().to_string()))
        }
    }

    fn check_writable(&self) -> Result<(), StorageFileError> {
        match self.state {
            StorageFileState::OpenForWrite | StorageFileState::SwmrActive => Ok(()),
            StorageFileState::OpenForRead => Err(StorageFileError::ReadOnly(self.uri().to_string())),
            StorageFileState::Closed => Err(StorageFileError::NotOpen(self.uri().to_string())),
        }
    }

    fn check_structural(&self, operation: &'static str) -> Result<(), StorageFileError> {
        self.check_writable()?;
        if self.state == StorageFileState::SwmrActive {
            return Err(StorageFileError::StructuralMutationForbidden(operation));
        }
        Ok(())
    }

    /// Resolve `path` to a node of this file.
    fn local_node(&self, path: &str) -> Result<Oid, StorageFileError> {
        match self.tree.resolve_path(path, &NoExternalTrees)? {
            NodeLocation::Local(oid) => Ok(oid),
            NodeLocation::External { .. } => Err(StorageFileError::NodeNotFound(path.to_string())),
        }
    }

    fn local_group(&self, path: &str) -> Result<Oid, StorageFileError> {
        let oid = self.local_node(path)?;
        self.tree.group(oid)?;
        Ok(oid)
    }

    fn local_dataset(&self, path: &str) -> Result<(Arc<ChunkedDataset>, String), StorageFileError> {
        let oid = self.local_node(path)?;
        match (self.datasets.get(&oid), self.tree.data(oid)?) {
            (Some(dataset), Some(data)) => Ok((dataset.clone(), data.array().name().to_string())),
            _ => Err(StorageFileError::NodeNotFound(path.to_string())),
        }
    }

    fn write_document(&self, swmr: bool, closed: bool) -> Result<(), StorageFileError> {
        let mut document = TreeDocument::from_tree(&self.tree, &self.datasets)?;
        document.swmr = swmr;
        document.closed = closed;
        document.write(&*self.store)?;
        Ok(())
    }

    /// Create a group `name` in the group at `parent_path`, with an optional NeXus class such as `NXentry`.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is not open for structural writes or the group cannot be created.
    pub fn create_group(
        &mut self,
        parent_path: &str,
        name: &str,
        nexus_class: Option<&str>,
    ) -> Result<Oid, StorageFileError> {
        self.check_structural("create_group")?;
        let parent = self.local_group(parent_path)?;
        Ok(self.tree.create_group(parent, name, nexus_class)?)
    }

    /// Create a chunked dataset `name` in the group at `parent_path` and return a writable array over it.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is not open for structural writes, the builder is invalid, or the node cannot be created.
    pub fn create_data(
        &mut self,
        parent_path: &str,
        name: &str,
        builder: &DatasetBuilder,
    ) -> Result<WritableLazyArray, StorageFileError> {
        self.check_structural("create_data")?;
        let parent = self.local_group(parent_path)?;
        let descriptor = builder.descriptor()?;
        let oid = self.tree.next_oid();
        let dataset = Arc::new(ChunkedDataset::new(
            self.store.clone(),
            oid,
            descriptor,
            false,
        ));
        let created = self
            .tree
            .create_data(parent, name, dataset.lazy_array(name)?)?;
        debug_assert_eq!(created, oid);
        for attribute in &builder.attributes {
            self.tree.set_attribute(oid, attribute.clone())?;
        }
        self.datasets.insert(oid, dataset.clone());
        tracing::debug!(uri = self.uri(), parent_path, name, %oid, "created dataset");
        Ok(dataset.writable(name)?)
    }

    /// Create a dataset `name` in the group at `parent_path` holding `data`.
    ///
    /// # Errors
    /// See [`create_data`](StorageFile::create_data).
    pub fn create_data_from(
        &mut self,
        parent_path: &str,
        name: &str,
        data: &RealizedArray,
    ) -> Result<WritableLazyArray, StorageFileError> {
        let mut builder = DatasetBuilder::new(data.shape().to_vec(), data.data_type());
        builder.elements_per_item(data.elements_per_item());
        let mut array = self.create_data(parent_path, name, &builder)?;
        array.set_slice(&SliceND::full(data.shape()), data)?;
        Ok(array)
    }

    /// Create a hard link `name` in the group at `parent_path` to the node at `target_path`.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is not open for structural writes or the link cannot be created.
    pub fn link(
        &mut self,
        parent_path: &str,
        name: &str,
        target_path: &str,
    ) -> Result<NodeLink, StorageFileError> {
        self.check_structural("link")?;
        let parent = self.local_group(parent_path)?;
        Ok(self.tree.link(parent, name, target_path)?)
    }

    /// Create a symbolic link `name` in the group at `parent_path` to `target_path` in this file.
    ///
    /// # Errors
    /// See [`link`](StorageFile::link).
    pub fn link_soft(
        &mut self,
        parent_path: &str,
        name: &str,
        target_path: &str,
    ) -> Result<Oid, StorageFileError> {
        self.check_structural("link_soft")?;
        let parent = self.local_group(parent_path)?;
        Ok(self.tree.link_soft(parent, name, target_path)?)
    }

    /// Create a symbolic link `name` in the group at `parent_path` to `target_path` in the file at `uri`.
    ///
    /// # Errors
    /// See [`link`](StorageFile::link).
    pub fn link_external(
        &mut self,
        parent_path: &str,
        name: &str,
        uri: &str,
        target_path: &str,
    ) -> Result<Oid, StorageFileError> {
        self.check_structural("link_external")?;
        let parent = self.local_group(parent_path)?;
        Ok(self.tree.link_external(parent, name, uri, target_path)?)
    }

    /// Set an attribute of the node at `path`, replacing any attribute with the same name.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is not open for structural writes or there is no such node.
    pub fn set_attribute(
        &mut self,
        path: &str,
        attribute: Attribute,
    ) -> Result<(), StorageFileError> {
        self.check_structural("set_attribute")?;
        let oid = self.local_node(path)?;
        Ok(self.tree.set_attribute(oid, attribute)?)
    }

    /// Flush and freeze the structure of the file, so that SWMR readers may follow the growth of its datasets.
    ///
    /// Activating SWMR mode again has no effect.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is not writable or cannot be flushed.
    pub fn activate_swmr_mode(&mut self) -> Result<(), StorageFileError> {
        match self.state {
            StorageFileState::SwmrActive => Ok(()),
            StorageFileState::OpenForWrite => {
                self.write_document(true, false)?;
                self.state = StorageFileState::SwmrActive;
                tracing::debug!(uri = self.uri(), "activated SWMR mode");
                Ok(())
            }
            _ => self.check_writable(),
        }
    }

    /// Persist the tree and the current shape of every dataset.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is not writable or the store fails.
    pub fn flush(&mut self) -> Result<(), StorageFileError> {
        self.check_writable()?;
        self.sync_data_arrays()?;
        self.write_document(self.state == StorageFileState::SwmrActive, false)?;
        tracing::debug!(uri = self.uri(), state = %self.state, "flushed");
        Ok(())
    }

    /// Update the arrays of the data nodes to the current shapes of their datasets.
    fn sync_data_arrays(&mut self) -> Result<(), StorageFileError> {
        for (oid, dataset) in &self.datasets {
            let Some(data) = self.tree.data(*oid)? else {
                continue;
            };
            if data.array().shape() != dataset.shape().as_slice() {
                let array = dataset.lazy_array(data.array().name())?;
                self.tree.set_data_array(*oid, array)?;
            }
        }
        Ok(())
    }

    /// Close the file. Writable files are flushed and their arrays stop accepting writes.
    ///
    /// # Errors
    /// Returns [`StorageFileError::NotOpen`] if the file is already closed, or another [`StorageFileError`] if it cannot be flushed.
    pub fn close(&mut self) -> Result<(), StorageFileError> {
        self.check_open()?;
        let result = if self.state == StorageFileState::OpenForRead {
            Ok(())
        } else {
            self.sync_data_arrays()
                .and_then(|()| self.write_document(self.state == StorageFileState::SwmrActive, true))
        };
        for dataset in self.datasets.values() {
            dataset.set_read_only();
        }
        self.state = StorageFileState::Closed;
        tracing::debug!(uri = self.uri(), "closed file");
        result
    }

    /// Return a copy of the group at `path`.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is closed or there is no group at `path`.
    pub fn get_group(&self, path: &str) -> Result<GroupNode, StorageFileError> {
        self.check_open()?;
        let location = self.tree.resolve_path(path, self.resolver.as_ref())?;
        location
            .node(&self.tree)
            .and_then(|node| node.as_group())
            .cloned()
            .ok_or_else(|| NodeGraphError::NotAGroup(path.to_string()).into())
    }

    /// Return a lazy array over the data node at `path`, at the most recently known shape of its dataset.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is closed or there is no data node at `path`.
    pub fn get_data(&self, path: &str) -> Result<LazyArray, StorageFileError> {
        self.check_open()?;
        let location = self.tree.resolve_path(path, self.resolver.as_ref())?;
        if let NodeLocation::Local(oid) = location {
            if let (Some(dataset), Some(data)) = (self.datasets.get(&oid), self.tree.data(oid)?) {
                return Ok(dataset.lazy_array(data.array().name())?);
            }
        }
        location
            .node(&self.tree)
            .and_then(|node| node.as_data())
            .map(|data| data.array().clone())
            .ok_or_else(|| StorageFileError::NodeNotFound(path.to_string()))
    }

    /// Return a dynamic lazy array over the data node at `path`.
    ///
    /// The array follows the growth of the dataset when the file is writable or opened with [`OpenMode::SwmrRead`], and is static otherwise.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is closed or there is no data node at `path`.
    pub fn get_dynamic_data(&self, path: &str) -> Result<DynamicLazyArray, StorageFileError> {
        let array = self.get_data(path)?;
        let location = self.tree.resolve_path(path, self.resolver.as_ref())?;
        let dataset = match location {
            NodeLocation::Local(oid) => self.datasets.get(&oid).cloned(),
            NodeLocation::External { .. } => None,
        };
        let Some(dataset) = dataset else {
            return Ok(DynamicLazyArray::new_static(array));
        };
        let max_shape = dataset.max_shape();
        let dynamic = match (self.state, self.mode) {
            (StorageFileState::OpenForWrite | StorageFileState::SwmrActive, _) => {
                DynamicLazyArray::new_dynamic(array, dataset, max_shape)?
            }
            (StorageFileState::OpenForRead, OpenMode::SwmrRead) => DynamicLazyArray::new_dynamic(
                array,
                Arc::new(DocumentShapeRefresher::new(self.store.clone(), dataset)),
                max_shape,
            )?,
            _ => DynamicLazyArray::new_static(array),
        };
        Ok(dynamic)
    }

    /// Return a writable lazy array over the dataset at `path`.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is not writable or there is no dataset at `path` in this file.
    pub fn writable_array(&self, path: &str) -> Result<WritableLazyArray, StorageFileError> {
        self.check_writable()?;
        let (dataset, name) = self.local_dataset(path)?;
        Ok(dataset.writable(&name)?)
    }

    /// Return the attribute named by a query of the form `/path@name`.
    ///
    /// # Errors
    /// Returns a [`StorageFileError`] if the file is closed or the query cannot be resolved.
    pub fn attribute(&self, query: &str) -> Result<Option<Attribute>, StorageFileError> {
        self.check_open()?;
        Ok(self.tree.resolve_attribute(query, self.resolver.as_ref())?)
    }

    /// Render the hierarchy of the file as a string.
    ///
    /// # Errors
    /// Returns [`StorageFileError::NotOpen`] if the file is closed.
    pub fn hierarchy_tree(&self) -> Result<String, StorageFileError> {
        self.check_open()?;
        Ok(self.tree.hierarchy_tree())
    }

    /// Close the file and return its tree, whose data nodes still read from the store.
    ///
    /// # Errors
    /// See [`close`](StorageFile::close).
    pub fn into_tree_file(mut self) -> Result<TreeFile, StorageFileError> {
        self.close()?;
        self.sync_data_arrays()?;
        Ok(std::mem::replace(&mut self.tree, TreeFile::new("")))
    }
}

impl Drop for StorageFile {
    fn drop(&mut self) {
        if matches!(
            self.state,
            StorageFileState::OpenForWrite | StorageFileState::SwmrActive
        ) {
            if let Err(err) = self.close() {
                tracing::warn!(uri = self.uri(), %err, "failed to close file on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{array::DataType, shape::UNLIMITED, storage::store::MemoryStore};

    fn new_file() -> (Arc<MemoryStore>, StorageFile) {
        let store = Arc::new(MemoryStore::new());
        let file = StorageFile::create(store.clone(), "test.nxs").unwrap();
        (store, file)
    }

    #[test]
    fn storage_file_states() {
        let (store, mut file) = new_file();
        assert_eq!(file.state(), StorageFileState::OpenForWrite);
        file.create_group("/", "entry", Some("NXentry")).unwrap();
        file.activate_swmr_mode().unwrap();
        assert_eq!(file.state(), StorageFileState::SwmrActive);
        file.activate_swmr_mode().unwrap();
        assert!(matches!(
            file.create_group("/entry", "other", None),
            Err(StorageFileError::StructuralMutationForbidden("create_group"))
        ));
        file.close().unwrap();
        assert_eq!(file.state(), StorageFileState::Closed);
        assert!(matches!(file.close(), Err(StorageFileError::NotOpen(_))));
        assert!(matches!(file.get_group("/entry"), Err(StorageFileError::NotOpen(_))));
        assert!(matches!(file.flush(), Err(StorageFileError::NotOpen(_))));

        let mut reader = StorageFile::open(store, "test.nxs", OpenMode::ReadOnly).unwrap();
        assert_eq!(reader.state(), StorageFileState::OpenForRead);
        assert_eq!(reader.get_group("/entry").unwrap().nexus_class(), Some("NXentry"));
        assert!(matches!(reader.flush(), Err(StorageFileError::ReadOnly(_))));
        assert!(matches!(
            reader.create_group("/", "more", None),
            Err(StorageFileError::ReadOnly(_))
        ));
        assert!(matches!(
            reader.activate_swmr_mode(),
            Err(StorageFileError::ReadOnly(_))
        ));
    }

    #[test]
    fn storage_file_missing() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            StorageFile::open(store, "missing.nxs", OpenMode::ReadOnly),
            Err(StorageFileError::IOFailure(StorageError::KeyNotFound(_)))
        ));
    }

    #[test]
    fn storage_file_data() {
        let (store, mut file) = new_file();
        file.create_group("/", "entry", Some("NXentry")).unwrap();
        let data = RealizedArray::from_elements(vec![2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        file.create_data_from("/entry", "image", &data).unwrap();
        file.set_attribute("/entry/image", Attribute::new("units", "counts"))
            .unwrap();
        assert!(matches!(
            file.get_data("/entry/missing"),
            Err(StorageFileError::NodeNotFound(_))
        ));
        assert!(matches!(
            file.get_data("/entry"),
            Err(StorageFileError::NodeNotFound(_))
        ));
        assert!(matches!(
            file.get_group("/entry/image"),
            Err(StorageFileError::NodeGraph(NodeGraphError::NotAGroup(_)))
        ));
        file.close().unwrap();

        let reader = StorageFile::open(store, "test.nxs", OpenMode::ReadOnly).unwrap();
        let image = reader.get_data("/entry/image").unwrap();
        assert_eq!(image.shape(), &[2, 3]);
        assert_eq!(image.data_type(), DataType::Float32);
        assert_eq!(
            image.realize().unwrap().to_elements::<f32>().unwrap(),
            data.to_elements::<f32>().unwrap()
        );
        assert_eq!(
            reader.attribute("/entry/image@units").unwrap().unwrap().value(),
            "counts"
        );
        assert!(!reader.get_dynamic_data("/entry/image").unwrap().is_dynamic());
        assert!(matches!(
            reader.writable_array("/entry/image"),
            Err(StorageFileError::ReadOnly(_))
        ));
    }

    #[test]
    fn storage_file_swmr_growth() {
        let (store, mut file) = new_file();
        file.create_group("/", "entry", None).unwrap();
        let mut builder = DatasetBuilder::new(vec![0, 2], DataType::UInt32);
        builder.max_shape(vec![UNLIMITED, 2]).chunk_shape(vec![4, 2]);
        let mut frames = file.create_data("/entry", "frames", &builder).unwrap();
        file.activate_swmr_mode().unwrap();

        let reader = StorageFile::open(store.clone(), "test.nxs", OpenMode::SwmrRead).unwrap();
        let mut dynamic = reader.get_dynamic_data("/entry/frames").unwrap();
        assert!(dynamic.is_dynamic());
        assert_eq!(dynamic.array().shape(), &[0, 2]);

        for frame in 0..3u32 {
            let row = RealizedArray::from_elements(vec![1, 2], &[frame, frame * 10]).unwrap();
            frames.set_slice_at(&[u64::from(frame), 0], &row).unwrap();
        }
        assert!(dynamic.refresh_shape());
        assert_eq!(dynamic.array().shape(), &[0, 2]);

        file.flush().unwrap();
        assert!(dynamic.refresh_shape());
        assert_eq!(dynamic.array().shape(), &[3, 2]);
        assert_eq!(
            dynamic.array().realize().unwrap().to_elements::<u32>().unwrap(),
            vec![0, 0, 1, 10, 2, 20]
        );
        assert!(!dynamic.is_complete());

        let writer_view = file.get_dynamic_data("/entry/frames").unwrap();
        assert_eq!(writer_view.array().shape(), &[3, 2]);

        file.close().unwrap();
        assert!(dynamic.refresh_shape());
        assert!(dynamic.is_complete());
        assert!(matches!(
            frames.set_slice_at(&[3, 0], &RealizedArray::from_elements(vec![1, 2], &[0u32, 0]).unwrap()),
            Err(ArrayError::ReadOnly)
        ));
    }

    #[test]
    fn storage_file_links() {
        let (_store, mut file) = new_file();
        file.create_group("/", "entry", Some("NXentry")).unwrap();
        file.create_group("/entry", "data", Some("NXdata")).unwrap();
        file.create_data_from("/entry/data", "x", &RealizedArray::from_elements(vec![3], &[1i8, 2, 3]).unwrap())
            .unwrap();
        let link = file.link("/entry", "x", "/entry/data/x").unwrap();
        assert_eq!(link.name(), "x");
        file.link_soft("/", "alias", "/entry/data").unwrap();
        assert_eq!(file.get_data("/alias/x").unwrap().shape(), &[3]);
        assert_eq!(file.get_data("/entry/x").unwrap().shape(), &[3]);
        file.link_external("/", "remote", "other.nxs", "/entry").unwrap();
        assert!(matches!(
            file.get_group("/remote"),
            Err(StorageFileError::NodeGraph(NodeGraphError::ExternalTree { .. }))
        ));
        assert!(matches!(
            file.create_group("/entry", "data", None),
            Err(StorageFileError::NodeGraph(NodeGraphError::NameExists(_)))
        ));
    }

    #[test]
    fn storage_file_close_on_drop() {
        let (store, mut file) = new_file();
        file.create_group("/", "entry", None).unwrap();
        drop(file);
        let reader = StorageFile::open(store, "test.nxs", OpenMode::ReadOnly).unwrap();
        assert!(reader.get_group("/entry").is_ok());
    }
}
