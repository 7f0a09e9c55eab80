//! Hierarchical node graphs.
//!
//! A [`Tree`] holds [`Node`]s in an arena keyed by their object identity ([`Oid`]).
//! A node is either a group ([`GroupNode`]), a data node wrapping a [`LazyArray`](crate::array::LazyArray) ([`DataNode`]), or a symbolic node standing in for another node ([`SymbolicNode`]).
//! Groups hold insertion-ordered [`NodeLink`]s to their children, and groups and data nodes hold [`Attribute`]s.
//!
//! Paths are `/` delimited. A trailing `/` requires a group and an `@` suffix names an attribute, e.g. `/entry/data@units`.
//! Symbolic nodes are resolved transparently when walking a path.
//! Symbolic nodes pointing into other files are resolved through a [`TreeFileResolver`], such as a [`TreeFileRegistry`].
//!
//! The [`Tree::hierarchy_tree`] function can be used to create a string representation of the hierarchy.

mod attribute;
mod node_name;
mod node_path;
mod tree;
mod tree_node;
mod tree_resolver;

use std::error::Error;

use thiserror::Error;

pub use attribute::Attribute;
pub use node_name::{NodeName, NodeNameError};
pub use node_path::{NodePath, NodePathError, PathQuery};
pub use tree::{NodeLocation, Tree, TreeFile};
pub use tree_node::{DataNode, GroupNode, LinkTarget, Node, NodeLink, Oid, SymbolicNode};
pub use tree_resolver::{NoExternalTrees, TreeFileRegistry, TreeFileResolver};

/// A node graph error.
#[derive(Debug, Error)]
pub enum NodeGraphError {
    /// A symbolic node was revisited while resolving a chain of symbolic nodes.
    #[error("cyclic symbolic link at node {oid} of {}", .uri.as_deref().unwrap_or("the local tree"))]
    CyclicLink {
        /// The file holding the revisited node, or [`None`] for the tree being searched.
        uri: Option<String>,
        /// The revisited node.
        oid: Oid,
    },
    /// A node or path does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),
    /// A node is not a group.
    #[error("node is not a group: {0}")]
    NotAGroup(String),
    /// A group already has a child with this name.
    #[error("a node named {0} already exists")]
    NameExists(String),
    /// An invalid node name.
    #[error(transparent)]
    InvalidName(#[from] NodeNameError),
    /// An invalid node path.
    #[error(transparent)]
    InvalidPath(#[from] NodePathError),
    /// The tree of another file could not be opened.
    #[error("cannot open external tree {uri}: {cause}")]
    ExternalTree {
        /// The URI of the file.
        uri: String,
        /// The underlying cause.
        #[source]
        cause: Box<dyn Error + Send + Sync>,
    },
    /// Symbolic nodes cannot hold attributes.
    #[error("node {0} cannot hold attributes")]
    NotAttributable(Oid),
}

impl NodeGraphError {
    /// Create a [`NodeGraphError::ExternalTree`] error.
    pub fn external_tree(uri: &str, cause: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::ExternalTree {
            uri: uri.to_string(),
            cause: cause.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{DataType, LazyArray, RealizedArray};

    fn array(shape: Vec<u64>) -> LazyArray {
        LazyArray::from(RealizedArray::zeros(DataType::Float64, shape))
    }

    fn sample_tree() -> Tree {
        let mut tree = Tree::new();
        let entry = tree.create_group(tree.root(), "entry", Some("NXentry")).unwrap();
        let data = tree.create_data(entry, "data", array(vec![10, 20])).unwrap();
        tree.create_attribute(data, "units", "counts").unwrap();
        tree.create_unsigned_attribute(entry, "count", 2).unwrap();
        tree.link_soft(entry, "detector", "/entry/data").unwrap();
        tree
    }

    #[test]
    fn tree_create() {
        let mut tree = sample_tree();
        let entry = tree.find_by_path("/entry").unwrap();
        assert_eq!(tree.group(entry).unwrap().nexus_class(), Some("NXentry"));
        assert!(matches!(
            tree.create_group(entry, "data", None),
            Err(NodeGraphError::NameExists(_))
        ));
        assert!(matches!(
            tree.create_group(entry, "a/b", None),
            Err(NodeGraphError::InvalidName(_))
        ));
        let data = tree.find_by_path("/entry/data").unwrap();
        assert!(matches!(
            tree.create_group(data, "child", None),
            Err(NodeGraphError::NotAGroup(_))
        ));
        let num_nodes = tree.num_nodes();
        assert!(tree.create_group(data, "child", None).is_err());
        assert_eq!(tree.num_nodes(), num_nodes);
    }

    #[test]
    fn tree_children_ordered() {
        let mut tree = Tree::new();
        for name in ["z", "a", "m", "b"] {
            tree.create_group(tree.root(), name, None).unwrap();
        }
        let names: Vec<_> = tree
            .group(tree.root())
            .unwrap()
            .children()
            .iter()
            .map(NodeLink::name)
            .collect();
        assert_eq!(names, vec!["z", "a", "m", "b"]);
    }

    #[test]
    fn tree_find_by_path() {
        let tree = sample_tree();
        let data = tree.find_by_path("/entry/data").unwrap();
        assert_eq!(tree.find_by_path("entry/data"), Some(data));
        assert_eq!(tree.find_by_path("/entry/detector"), Some(data));
        assert_eq!(tree.find_by_path("/entry/data/"), None);
        assert!(tree.find_by_path("/entry/").is_some());
        assert_eq!(tree.find_by_path("/entry/missing"), None);
        assert_eq!(tree.find_by_path("/"), Some(tree.root()));
        assert!(matches!(
            tree.resolve_path("/entry/data/", &NoExternalTrees),
            Err(NodeGraphError::NotAGroup(_))
        ));
    }

    #[test]
    fn tree_attributes() {
        let tree = sample_tree();
        assert_eq!(
            tree.find_attribute("/entry/data@units").unwrap().value(),
            "counts"
        );
        assert_eq!(
            tree.find_attribute("/entry/detector@units").unwrap().value(),
            "counts"
        );
        let count = tree.find_attribute("/entry/@count").unwrap();
        assert!(count.is_unsigned());
        assert!(tree.find_attribute("/entry/data@missing").is_none());
        assert!(tree.find_attribute("/entry/data").is_none());

        let mut tree = tree;
        let detector = tree.group(tree.root()).unwrap().children()[0].destination();
        let detector = tree.group(detector).unwrap().child("detector").unwrap().destination();
        assert!(matches!(
            tree.create_attribute(detector, "units", "mm"),
            Err(NodeGraphError::NotAttributable(_))
        ));
    }

    #[test]
    fn tree_hard_link() {
        let mut tree = sample_tree();
        let link = tree.link(tree.root(), "alias", "/entry/data").unwrap();
        assert_eq!(link.source(), Some(tree.root()));
        assert_eq!(Some(link.destination()), tree.find_by_path("/entry/data"));
        let soft = tree.link(tree.root(), "soft_alias", "/entry/detector").unwrap();
        assert!(tree.get(soft.destination()).unwrap().as_symbolic().is_some());
        assert!(tree.link(tree.root(), "missing", "/entry/missing").is_err());
    }

    #[test]
    fn tree_cyclic_link() {
        let mut tree = Tree::new();
        let a = tree.link_soft(tree.root(), "a", "/b").unwrap();
        tree.link_soft(tree.root(), "b", "/a").unwrap();
        assert!(matches!(
            tree.resolve(a, &NoExternalTrees),
            Err(NodeGraphError::CyclicLink { uri: None, .. })
        ));
        assert_eq!(tree.find_by_path("/a"), None);

        let own = tree.link_soft(tree.root(), "own", "/own").unwrap();
        assert!(matches!(
            tree.resolve(own, &NoExternalTrees),
            Err(NodeGraphError::CyclicLink { oid, .. }) if oid == own
        ));
    }

    #[test]
    fn tree_repeated_link_is_not_cyclic() {
        let mut tree = Tree::new();
        let g = tree.create_group(tree.root(), "g", None).unwrap();
        tree.link_soft(g, "up", "/g").unwrap();
        assert_eq!(tree.find_by_path("/g/up/up/up"), Some(g));
    }

    #[test]
    fn tree_external_link() {
        let registry = TreeFileRegistry::new();
        let mut other = TreeFile::new("scan.nxs");
        let root = other.root();
        let entry = other.create_group(root, "entry", None).unwrap();
        let data = other.create_data(entry, "data", array(vec![3])).unwrap();
        other.link_external(root, "back", "local.nxs", "/raw").unwrap();
        registry.register(other);

        let mut local = TreeFile::new("local.nxs");
        let root = local.root();
        let raw = local
            .link_external(root, "raw", "scan.nxs", "/entry/data")
            .unwrap();
        let location = local.resolve(raw, &registry).unwrap();
        assert!(location.is_external());
        assert_eq!(location.uri(), Some("scan.nxs"));
        assert_eq!(location.oid(), data);
        assert_eq!(
            location.node(&local).unwrap().as_data().unwrap().array().shape(),
            &[3]
        );

        let location = local.resolve_path("/raw", &registry).unwrap();
        assert_eq!(location.oid(), data);
        assert_eq!(local.find_by_path("/raw"), None);

        local.link_external(root, "loop", "scan.nxs", "/back").unwrap();
        local.link_soft(root, "raw2", "/loop").unwrap();
        let location = local.resolve_path("/raw2", &registry).unwrap();
        assert_eq!(location.oid(), data);

        let missing = local
            .link_external(root, "missing", "absent.nxs", "/entry")
            .unwrap();
        assert!(matches!(
            local.resolve(missing, &registry),
            Err(NodeGraphError::ExternalTree { .. })
        ));
    }

    #[test]
    fn tree_external_cycle() {
        let registry = TreeFileRegistry::new();
        let mut first = TreeFile::new("first.nxs");
        let root = first.root();
        first.link_external(root, "a", "second.nxs", "/b").unwrap();
        let mut second = TreeFile::new("second.nxs");
        second.link_external(root, "b", "first.nxs", "/a").unwrap();
        registry.register(second);
        let first = registry.register(first);
        let a = first.find_by_path("/a");
        assert_eq!(a, None);
        let a = first.group(first.root()).unwrap().children()[0].destination();
        assert!(matches!(
            first.resolve(a, &registry),
            Err(NodeGraphError::CyclicLink { .. })
        ));
    }

    #[test]
    fn tree_hierarchy() {
        let mut tree = sample_tree();
        tree.link_external(tree.root(), "raw", "scan.nxs", "/entry/data")
            .unwrap();
        tree.link(tree.root(), "again", "/").unwrap();
        assert_eq!(
            tree.hierarchy_tree(),
            r"/
  entry [NXentry]
    data [10, 20] float64
    detector -> /entry/data
  raw -> scan.nxs#/entry/data
  again (cycle)
"
        );
    }
}
