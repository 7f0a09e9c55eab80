use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::{NodeGraphError, TreeFile};

/// Opens the trees of other files, by URI, when resolving external links.
pub trait TreeFileResolver {
    /// Return the tree of the file at `uri`.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::ExternalTree`] if the file cannot be opened.
    fn resolve_tree(&self, uri: &str) -> Result<Arc<TreeFile>, NodeGraphError>;
}

/// A resolver without any external trees.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExternalTrees;

impl TreeFileResolver for NoExternalTrees {
    fn resolve_tree(&self, uri: &str) -> Result<Arc<TreeFile>, NodeGraphError> {
        Err(NodeGraphError::external_tree(uri, "external trees are not available"))
    }
}

/// A registry of trees by URI.
#[derive(Debug, Default)]
pub struct TreeFileRegistry {
    trees: RwLock<HashMap<String, Arc<TreeFile>>>,
}

impl TreeFileRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tree` under its URI, replacing any tree with the same URI.
    pub fn register(&self, tree: TreeFile) -> Arc<TreeFile> {
        let tree = Arc::new(tree);
        self.trees
            .write()
            .insert(tree.uri().to_string(), tree.clone());
        tree
    }

    /// Return the tree registered under `uri`.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Arc<TreeFile>> {
        self.trees.read().get(uri).cloned()
    }
}

impl TreeFileResolver for TreeFileRegistry {
    fn resolve_tree(&self, uri: &str) -> Result<Arc<TreeFile>, NodeGraphError> {
        self.get(uri)
            .ok_or_else(|| NodeGraphError::external_tree(uri, "no tree registered"))
    }
}
