//! The JSON document describing the node tree of a file.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};

use crate::{
    array::{ArrayError, LoadError, ShapeRefresher},
    node::{Attribute, DataNode, GroupNode, LinkTarget, Node, NodeGraphError, NodeLink, Oid, SymbolicNode, Tree},
    shape::ArrayShape,
};

use super::{
    dataset::{ChunkedDataset, DatasetDescriptor},
    ReadableStorageTraits, ReadableWritableListableStorage, StorageError, StoreKey,
    WritableStorageTraits,
};

/// The current document version.
pub(crate) const TREE_DOCUMENT_VERSION: u32 = 1;

/// The `tree.json` document.
///
/// Nodes are keyed by their identity, so hard links are children of several groups with the same destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TreeDocument {
    pub version: u32,
    pub root: Oid,
    /// Set once the writer has entered SWMR mode.
    #[serde(default)]
    pub swmr: bool,
    /// Set when the writer closes the file.
    #[serde(default)]
    pub closed: bool,
    pub nodes: BTreeMap<Oid, NodeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum NodeDocument {
    Group {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nexus_class: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<Attribute>,
        #[serde(default)]
        children: Vec<LinkDocument>,
    },
    Data {
        name: String,
        dataset: DatasetDescriptor,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attributes: Vec<Attribute>,
    },
    Symbolic {
        target: LinkTarget,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LinkDocument {
    pub name: String,
    pub destination: Oid,
}

/// An error rebuilding a tree from its document.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TreeDocumentError {
    #[error(transparent)]
    NodeGraph(#[from] NodeGraphError),
    #[error(transparent)]
    Array(#[from] ArrayError),
}

impl TreeDocument {
    /// Describe `tree`, taking the dataset of each data node from `datasets`.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::NodeNotFound`] if a data node has no dataset.
    pub fn from_tree(
        tree: &Tree,
        datasets: &BTreeMap<Oid, Arc<ChunkedDataset>>,
    ) -> Result<Self, NodeGraphError> {
        let mut nodes = BTreeMap::new();
        for (oid, node) in tree.iter() {
            let document = match node {
                Node::Group(group) => NodeDocument::Group {
                    nexus_class: group.nexus_class().map(str::to_string),
                    attributes: node.attributes().to_vec(),
                    children: group
                        .children()
                        .iter()
                        .map(|link| LinkDocument {
                            name: link.name().to_string(),
                            destination: link.destination(),
                        })
                        .collect(),
                },
                Node::Data(data) => {
                    let dataset = datasets
                        .get(&oid)
                        .ok_or_else(|| NodeGraphError::NodeNotFound(format!("dataset of {oid}")))?;
                    NodeDocument::Data {
                        name: data.array().name().to_string(),
                        dataset: dataset.descriptor(),
                        attributes: node.attributes().to_vec(),
                    }
                }
                Node::Symbolic(symbolic) => NodeDocument::Symbolic {
                    target: symbolic.target().clone(),
                },
            };
            nodes.insert(oid, document);
        }
        Ok(Self {
            version: TREE_DOCUMENT_VERSION,
            root: tree.root(),
            swmr: false,
            closed: false,
            nodes,
        })
    }

    /// Read the document from `storage`, or [`None`] if there is none.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidDocument`] if the document cannot be parsed.
    pub fn read<TStorage: ?Sized + ReadableStorageTraits>(
        storage: &TStorage,
    ) -> Result<Option<Self>, StorageError> {
        let key = StoreKey::tree_document();
        let Some(bytes) = storage.get(&key)? else {
            return Ok(None);
        };
        let document: Self = serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::InvalidDocument(key.clone(), err.to_string()))?;
        if document.version > TREE_DOCUMENT_VERSION {
            return Err(StorageError::InvalidDocument(
                key,
                format!("unsupported version {}", document.version),
            ));
        }
        Ok(Some(document))
    }

    /// Replace the document in `storage`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the document cannot be stored.
    pub fn write<TStorage: ?Sized + WritableStorageTraits>(
        &self,
        storage: &TStorage,
    ) -> Result<(), StorageError> {
        let key = StoreKey::tree_document();
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| StorageError::InvalidDocument(key.clone(), err.to_string()))?;
        storage.set(&key, &bytes)
    }

    /// Return the shape of the dataset of data node `oid`.
    pub fn dataset_shape(&self, oid: Oid) -> Option<&ArrayShape> {
        match self.nodes.get(&oid)? {
            NodeDocument::Data { dataset, .. } => Some(&dataset.shape),
            _ => None,
        }
    }

    /// Rebuild the tree, with a [`ChunkedDataset`] in `store` behind each data node.
    ///
    /// # Errors
    /// Returns a [`TreeDocumentError`] if the nodes do not form a tree or a dataset description is invalid.
    pub fn into_tree(
        self,
        store: &ReadableWritableListableStorage,
        read_only: bool,
    ) -> Result<(Tree, BTreeMap<Oid, Arc<ChunkedDataset>>), TreeDocumentError> {
        let mut nodes = BTreeMap::new();
        let mut datasets = BTreeMap::new();
        for (oid, document) in self.nodes {
            let node: Node = match document {
                NodeDocument::Group {
                    nexus_class,
                    attributes,
                    children,
                } => {
                    let children = children
                        .into_iter()
                        .map(|link| NodeLink::new(link.name, Some(oid), link.destination))
                        .collect();
                    GroupNode::from_parts(nexus_class, attributes, children).into()
                }
                NodeDocument::Data {
                    name,
                    dataset,
                    attributes,
                } => {
                    let dataset = Arc::new(ChunkedDataset::new(
                        store.clone(),
                        oid,
                        dataset,
                        read_only,
                    ));
                    let array = dataset.lazy_array(&name)?;
                    datasets.insert(oid, dataset);
                    DataNode::with_attributes(array, attributes).into()
                }
                NodeDocument::Symbolic { target } => SymbolicNode::new(target).into(),
            };
            nodes.insert(oid, node);
        }
        let tree = Tree::from_nodes(self.root, nodes)?;
        Ok((tree, datasets))
    }
}

/// Refreshes the shape of a dataset from the latest document flushed by the writer.
pub(crate) struct DocumentShapeRefresher {
    store: ReadableWritableListableStorage,
    dataset: Arc<ChunkedDataset>,
    complete: AtomicBool,
}

impl Debug for DocumentShapeRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentShapeRefresher")
            .field("oid", &self.dataset.oid())
            .field("complete", &self.is_complete())
            .finish_non_exhaustive()
    }
}

impl DocumentShapeRefresher {
    pub fn new(store: ReadableWritableListableStorage, dataset: Arc<ChunkedDataset>) -> Self {
        Self {
            store,
            dataset,
            complete: AtomicBool::new(false),
        }
    }
}

impl ShapeRefresher for DocumentShapeRefresher {
    fn current_shape(&self) -> Result<ArrayShape, LoadError> {
        let document = TreeDocument::read(&*self.store)
            .map_err(LoadError::new)?
            .ok_or_else(|| LoadError::new(StorageError::KeyNotFound(StoreKey::tree_document())))?;
        let oid = self.dataset.oid();
        let shape = document
            .dataset_shape(oid)
            .ok_or_else(|| LoadError::new(NodeGraphError::NodeNotFound(oid.to_string())))?;
        self.dataset.observe_shape(shape);
        self.complete.store(document.closed, Ordering::Release);
        Ok(shape.clone())
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::DataType,
        storage::{store::MemoryStore, DatasetBuilder},
    };

    fn sample() -> (ReadableWritableListableStorage, Tree, BTreeMap<Oid, Arc<ChunkedDataset>>) {
        let store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
        let mut tree = Tree::new();
        let root = tree.root();
        let entry = tree.create_group(root, "entry", Some("NXentry")).unwrap();
        tree.create_attribute(entry, "default", "data").unwrap();
        let oid = tree.next_oid();
        let dataset = Arc::new(ChunkedDataset::new(
            store.clone(),
            oid,
            DatasetBuilder::new(vec![3, 4], DataType::UInt16)
                .descriptor()
                .unwrap(),
            false,
        ));
        let array = dataset.lazy_array("counts").unwrap();
        assert_eq!(tree.create_data(entry, "counts", array).unwrap(), oid);
        tree.link(root, "counts", "/entry/counts").unwrap();
        tree.link_soft(entry, "alias", "/entry/counts").unwrap();
        (store, tree, BTreeMap::from([(oid, dataset)]))
    }

    #[test]
    fn tree_document_json() {
        let (_store, tree, datasets) = sample();
        let document = TreeDocument::from_tree(&tree, &datasets).unwrap();
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["nodes"]["1"]["kind"], "group");
        assert_eq!(json["nodes"]["1"]["nexus_class"], "NXentry");
        assert_eq!(json["nodes"]["2"]["kind"], "data");
        assert_eq!(json["nodes"]["2"]["dataset"]["shape"], serde_json::json!([3, 4]));
        assert_eq!(json["nodes"]["3"]["kind"], "symbolic");
        assert_eq!(json["nodes"]["3"]["target"]["path"], "/entry/counts");
        let parsed: TreeDocument = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, document);
    }

    #[test]
    fn tree_document_rebuild() {
        let (store, tree, datasets) = sample();
        let document = TreeDocument::from_tree(&tree, &datasets).unwrap();
        document.write(&*store).unwrap();
        let document = TreeDocument::read(&*store).unwrap().unwrap();
        let (rebuilt, datasets) = document.into_tree(&store, true).unwrap();
        assert_eq!(rebuilt.num_nodes(), tree.num_nodes());
        assert_eq!(rebuilt.hierarchy_tree(), tree.hierarchy_tree());
        let counts = rebuilt.find_by_path("/entry/alias").unwrap();
        assert_eq!(Some(counts), rebuilt.find_by_path("/counts"));
        assert!(datasets[&counts].is_read_only());
        assert_eq!(
            rebuilt.find_attribute("/entry@default").unwrap().value(),
            "data"
        );
    }

    #[test]
    fn tree_document_missing_and_invalid() {
        let store = MemoryStore::new();
        assert!(TreeDocument::read(&store).unwrap().is_none());
        store.set(&StoreKey::tree_document(), b"{").unwrap();
        assert!(matches!(
            TreeDocument::read(&store),
            Err(StorageError::InvalidDocument(..))
        ));
    }

    #[test]
    fn tree_document_refresher() {
        let (store, tree, datasets) = sample();
        let oid = tree.find_by_path("/entry/counts").unwrap();
        let mut document = TreeDocument::from_tree(&tree, &datasets).unwrap();
        document.write(&*store).unwrap();

        let reader = Arc::new(ChunkedDataset::new(
            store.clone(),
            oid,
            datasets[&oid].descriptor(),
            true,
        ));
        let refresher = DocumentShapeRefresher::new(store.clone(), reader.clone());
        assert_eq!(refresher.current_shape().unwrap(), vec![3, 4]);
        assert!(!refresher.is_complete());

        document.closed = true;
        document.write(&*store).unwrap();
        refresher.current_shape().unwrap();
        assert!(refresher.is_complete());
    }
}
