use std::{collections::BTreeMap, fmt::Write as _, sync::Arc};

use derive_more::{Deref, DerefMut};
use serde_json::Value;

use crate::array::LazyArray;

use super::{
    attribute::upsert_attribute, Attribute, DataNode, GroupNode, LinkTarget, Node, NodeGraphError,
    NodeLink, NodeName, NodePath, NoExternalTrees, Oid, PathQuery, SymbolicNode, TreeFileResolver,
};

/// A hierarchy of nodes held in an arena keyed by [`Oid`].
///
/// Groups refer to their children through [`NodeLink`]s, so a node may be reachable from several groups (hard links).
/// Symbolic nodes refer to their target by path, possibly in another file, and are followed by [`resolve`](Tree::resolve).
#[derive(Clone, Debug)]
pub struct Tree {
    root: Oid,
    nodes: BTreeMap<Oid, Node>,
    next_oid: u64,
}

/// Where a resolved node lives.
#[derive(Clone, Debug)]
pub enum NodeLocation {
    /// A node of the tree that was searched.
    Local(Oid),
    /// A node of another file.
    External {
        /// The tree of the other file.
        file: Arc<TreeFile>,
        /// The node within `file`.
        oid: Oid,
    },
}

impl NodeLocation {
    /// Return the node identity within its tree.
    #[must_use]
    pub fn oid(&self) -> Oid {
        match self {
            Self::Local(oid) | Self::External { oid, .. } => *oid,
        }
    }

    /// Return the URI of the file holding an external node.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::External { file, .. } => Some(file.uri()),
        }
    }

    /// Returns true if the node is in another file.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }

    /// Return the node, given the `local` tree that was searched.
    #[must_use]
    pub fn node<'a>(&'a self, local: &'a Tree) -> Option<&'a Node> {
        self.tree(local).node(self.oid())
    }

    fn tree<'a>(&'a self, local: &'a Tree) -> &'a Tree {
        match self {
            Self::Local(_) => local,
            Self::External { file, .. } => file,
        }
    }

    fn with_oid(&self, oid: Oid) -> Self {
        match self {
            Self::Local(_) => Self::Local(oid),
            Self::External { file, .. } => Self::External {
                file: file.clone(),
                oid,
            },
        }
    }
}

/// The state of one symbolic link resolution.
struct Resolution<'r> {
    local_uri: Option<&'r str>,
    resolver: &'r dyn TreeFileResolver,
    /// The symbolic nodes being followed, outermost first.
    chain: Vec<(Option<String>, Oid)>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding an empty root group.
    #[must_use]
    pub fn new() -> Self {
        let root = Oid(0);
        Self {
            root,
            nodes: BTreeMap::from([(root, Node::Group(GroupNode::default()))]),
            next_oid: 1,
        }
    }

    /// Rebuild a tree from its nodes.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::NodeNotFound`] if `root` or the destination of a link is missing.
    pub(crate) fn from_nodes(root: Oid, nodes: BTreeMap<Oid, Node>) -> Result<Self, NodeGraphError> {
        if !nodes.get(&root).is_some_and(Node::is_group) {
            return Err(NodeGraphError::NotAGroup(root.to_string()));
        }
        for node in nodes.values() {
            if let Node::Group(group) = node {
                if let Some(link) = group
                    .children()
                    .iter()
                    .find(|link| !nodes.contains_key(&link.destination()))
                {
                    return Err(NodeGraphError::NodeNotFound(link.destination().to_string()));
                }
            }
        }
        let next_oid = nodes.keys().next_back().map_or(0, |oid| oid.0) + 1;
        Ok(Self {
            root,
            nodes,
            next_oid,
        })
    }

    /// Return the root group.
    #[must_use]
    pub fn root(&self) -> Oid {
        self.root
    }

    /// The identity the next created node will receive.
    pub(crate) fn next_oid(&self) -> Oid {
        Oid(self.next_oid)
    }

    /// Return the number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return all nodes in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (Oid, &Node)> {
        self.nodes.iter().map(|(oid, node)| (*oid, node))
    }

    /// Return the node `oid`.
    #[must_use]
    pub fn node(&self, oid: Oid) -> Option<&Node> {
        self.nodes.get(&oid)
    }

    /// Return the node `oid`.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::NodeNotFound`] if there is no such node.
    pub fn get(&self, oid: Oid) -> Result<&Node, NodeGraphError> {
        self.nodes
            .get(&oid)
            .ok_or_else(|| NodeGraphError::NodeNotFound(oid.to_string()))
    }

    fn get_mut(&mut self, oid: Oid) -> Result<&mut Node, NodeGraphError> {
        self.nodes
            .get_mut(&oid)
            .ok_or_else(|| NodeGraphError::NodeNotFound(oid.to_string()))
    }

    /// Return the group `oid`.
    ///
    /// # Errors
    /// Returns a [`NodeGraphError`] if there is no such node or it is not a group.
    pub fn group(&self, oid: Oid) -> Result<&GroupNode, NodeGraphError> {
        self.get(oid)?
            .as_group()
            .ok_or_else(|| NodeGraphError::NotAGroup(oid.to_string()))
    }

    /// Return the data node `oid`, or [`None`] if it is not a data node.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::NodeNotFound`] if there is no such node.
    pub fn data(&self, oid: Oid) -> Result<Option<&DataNode>, NodeGraphError> {
        Ok(self.get(oid)?.as_data())
    }

    pub(crate) fn set_data_array(&mut self, oid: Oid, array: LazyArray) -> Result<(), NodeGraphError> {
        match self.get_mut(oid)? {
            Node::Data(data) => {
                data.set_array(array);
                Ok(())
            }
            _ => Err(NodeGraphError::NodeNotFound(oid.to_string())),
        }
    }

    /// Check that `parent` is a group without a child `name`.
    fn check_new_child(&self, parent: Oid, name: &str) -> Result<NodeName, NodeGraphError> {
        let name = NodeName::new(name)?;
        if self.group(parent)?.child(name.as_str()).is_some() {
            return Err(NodeGraphError::NameExists(name.to_string()));
        }
        Ok(name)
    }

    fn push_link(&mut self, parent: Oid, name: NodeName, destination: Oid) -> NodeLink {
        let link = NodeLink::new(name.to_string(), Some(parent), destination);
        if let Some(Node::Group(group)) = self.nodes.get_mut(&parent) {
            group.push_child(link.clone());
        }
        link
    }

    fn create_node(&mut self, parent: Oid, name: &str, node: Node) -> Result<Oid, NodeGraphError> {
        let name = self.check_new_child(parent, name)?;
        let oid = Oid(self.next_oid);
        self.next_oid += 1;
        self.nodes.insert(oid, node);
        self.push_link(parent, name, oid);
        Ok(oid)
    }

    /// Create a group `name` in `parent`, with an optional NeXus class such as `NXentry`.
    ///
    /// # Errors
    /// Returns a [`NodeGraphError`] if `parent` is not a group, `name` is invalid, or `parent` already has a child `name`.
    pub fn create_group(
        &mut self,
        parent: Oid,
        name: &str,
        nexus_class: Option<&str>,
    ) -> Result<Oid, NodeGraphError> {
        self.create_node(parent, name, GroupNode::new(nexus_class).into())
    }

    /// Create a data node `name` in `parent` wrapping `array`.
    ///
    /// # Errors
    /// See [`create_group`](Tree::create_group).
    pub fn create_data(
        &mut self,
        parent: Oid,
        name: &str,
        array: LazyArray,
    ) -> Result<Oid, NodeGraphError> {
        self.create_node(parent, name, DataNode::new(array).into())
    }

    /// Set the attribute `name` of `node` to `value`.
    ///
    /// # Errors
    /// Returns a [`NodeGraphError`] if there is no such node or it is symbolic.
    pub fn create_attribute(
        &mut self,
        node: Oid,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), NodeGraphError> {
        self.set_attribute(node, Attribute::new(name, value))
    }

    /// Set the unsigned integer attribute `name` of `node` to `value`.
    ///
    /// # Errors
    /// See [`create_attribute`](Tree::create_attribute).
    pub fn create_unsigned_attribute(
        &mut self,
        node: Oid,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), NodeGraphError> {
        self.set_attribute(node, Attribute::new_unsigned(name, value))
    }

    /// Set an attribute of `node`, replacing any attribute with the same name.
    ///
    /// # Errors
    /// See [`create_attribute`](Tree::create_attribute).
    pub fn set_attribute(&mut self, node: Oid, attribute: Attribute) -> Result<(), NodeGraphError> {
        let attributes = self
            .get_mut(node)?
            .attributes_mut()
            .ok_or(NodeGraphError::NotAttributable(node))?;
        upsert_attribute(attributes, attribute);
        Ok(())
    }

    /// Return the attributes of `node`.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::NodeNotFound`] if there is no such node.
    pub fn attributes(&self, node: Oid) -> Result<&[Attribute], NodeGraphError> {
        Ok(self.get(node)?.attributes())
    }

    /// Return the attribute `name` of `node`.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::NodeNotFound`] if there is no such node.
    pub fn attribute(&self, node: Oid, name: &str) -> Result<Option<&Attribute>, NodeGraphError> {
        Ok(self.get(node)?.attribute(name))
    }

    /// Create a hard link `name` in `parent` to the node at `target_path`.
    ///
    /// A symbolic node at the end of `target_path` is linked itself rather than its target.
    ///
    /// # Errors
    /// Returns a [`NodeGraphError`] if the target cannot be found in this tree or the link cannot be created.
    pub fn link(
        &mut self,
        parent: Oid,
        name: &str,
        target_path: &str,
    ) -> Result<NodeLink, NodeGraphError> {
        let query: PathQuery = target_path.parse()?;
        let mut resolution = Resolution::new(None, &NoExternalTrees);
        let location = self.walk(NodeLocation::Local(self.root), query.path(), false, &mut resolution)?;
        let NodeLocation::Local(destination) = location else {
            return Err(NodeGraphError::external_tree(
                location.uri().unwrap_or_default(),
                "hard links cannot cross files",
            ));
        };
        let name = self.check_new_child(parent, name)?;
        Ok(self.push_link(parent, name, destination))
    }

    /// Create a symbolic node `name` in `parent` pointing at `target_path` in this tree.
    ///
    /// The target need not exist yet.
    ///
    /// # Errors
    /// Returns a [`NodeGraphError`] if `target_path` is invalid or the node cannot be created.
    pub fn link_soft(
        &mut self,
        parent: Oid,
        name: &str,
        target_path: &str,
    ) -> Result<Oid, NodeGraphError> {
        let query: PathQuery = target_path.parse()?;
        let target = LinkTarget {
            uri: None,
            path: query.path().clone(),
        };
        self.create_node(parent, name, SymbolicNode::new(target).into())
    }

    /// Create a symbolic node `name` in `parent` pointing at `target_path` in the file at `uri`.
    ///
    /// # Errors
    /// See [`link_soft`](Tree::link_soft).
    pub fn link_external(
        &mut self,
        parent: Oid,
        name: &str,
        uri: &str,
        target_path: &str,
    ) -> Result<Oid, NodeGraphError> {
        let query: PathQuery = target_path.parse()?;
        let target = LinkTarget {
            uri: Some(uri.to_string()),
            path: query.path().clone(),
        };
        self.create_node(parent, name, SymbolicNode::new(target).into())
    }

    /// Follow `oid` through any chain of symbolic nodes to a group or data node.
    ///
    /// Non-symbolic nodes resolve to themselves.
    ///
    /// # Errors
    /// Returns [`NodeGraphError::CyclicLink`] if a symbolic node is revisited while resolving, or another [`NodeGraphError`] if a target is missing or an external tree cannot be opened.
    pub fn resolve(
        &self,
        oid: Oid,
        resolver: &dyn TreeFileResolver,
    ) -> Result<NodeLocation, NodeGraphError> {
        self.resolve_in(None, oid, resolver)
    }

    fn resolve_in(
        &self,
        local_uri: Option<&str>,
        oid: Oid,
        resolver: &dyn TreeFileResolver,
    ) -> Result<NodeLocation, NodeGraphError> {
        self.follow(
            NodeLocation::Local(oid),
            &mut Resolution::new(local_uri, resolver),
        )
    }

    /// Find the node at `path`, resolving symbolic nodes within this tree.
    ///
    /// Returns [`None`] if there is no such node, resolution fails, or the path leads into another file.
    #[must_use]
    pub fn find_by_path(&self, path: &str) -> Option<Oid> {
        match self.resolve_path(path, &NoExternalTrees) {
            Ok(NodeLocation::Local(oid)) => Some(oid),
            _ => None,
        }
    }

    /// Resolve `path` to a node, following symbolic nodes into other files through `resolver`.
    ///
    /// A trailing `/` requires the node to be a group.
    ///
    /// # Errors
    /// Returns a [`NodeGraphError`] if the path is invalid or cannot be resolved.
    pub fn resolve_path(
        &self,
        path: &str,
        resolver: &dyn TreeFileResolver,
    ) -> Result<NodeLocation, NodeGraphError> {
        self.resolve_query(None, &path.parse()?, resolver)
    }

    fn resolve_query(
        &self,
        local_uri: Option<&str>,
        query: &PathQuery,
        resolver: &dyn TreeFileResolver,
    ) -> Result<NodeLocation, NodeGraphError> {
        let mut resolution = Resolution::new(local_uri, resolver);
        let location = self.walk(NodeLocation::Local(self.root), query.path(), true, &mut resolution)?;
        if query.requires_group() && !location.node(self).is_some_and(Node::is_group) {
            return Err(NodeGraphError::NotAGroup(query.path().to_string()));
        }
        Ok(location)
    }

    /// Find the attribute named by a query of the form `/path@name`, within this tree.
    #[must_use]
    pub fn find_attribute(&self, query: &str) -> Option<&Attribute> {
        let query: PathQuery = query.parse().ok()?;
        let name = query.attribute()?;
        match self.resolve_query(None, &query, &NoExternalTrees).ok()? {
            NodeLocation::Local(oid) => self.node(oid)?.attribute(name),
            NodeLocation::External { .. } => None,
        }
    }

    /// Resolve the attribute named by a query of the form `/path@name`, following symbolic nodes into other files.
    ///
    /// # Errors
    /// Returns a [`NodeGraphError`] if the query has no attribute name or its path cannot be resolved.
    pub fn resolve_attribute(
        &self,
        query: &str,
        resolver: &dyn TreeFileResolver,
    ) -> Result<Option<Attribute>, NodeGraphError> {
        let parsed: PathQuery = query.parse()?;
        let name = parsed
            .attribute()
            .ok_or_else(|| NodeGraphError::NodeNotFound(query.to_string()))?;
        let location = self.resolve_query(None, &parsed, resolver)?;
        Ok(location
            .node(self)
            .and_then(|node| node.attribute(name))
            .cloned())
    }

    fn follow(
        &self,
        location: NodeLocation,
        resolution: &mut Resolution,
    ) -> Result<NodeLocation, NodeGraphError> {
        let target = match location.tree(self).get(location.oid())? {
            Node::Symbolic(symbolic) => symbolic.target().clone(),
            _ => return Ok(location),
        };
        let key = (
            location.uri().or(resolution.local_uri).map(str::to_string),
            location.oid(),
        );
        if resolution.chain.contains(&key) {
            let (uri, oid) = key;
            return Err(NodeGraphError::CyclicLink { uri, oid });
        }
        let start = match target.uri.as_deref() {
            Some(uri) if Some(uri) == resolution.local_uri => NodeLocation::Local(self.root),
            Some(uri) if Some(uri) != location.uri() => {
                let file = resolution.resolver.resolve_tree(uri)?;
                NodeLocation::External {
                    oid: file.root(),
                    file,
                }
            }
            _ => location.with_oid(location.tree(self).root()),
        };
        resolution.chain.push(key);
        let resolved = self.walk(start, &target.path, true, resolution);
        resolution.chain.pop();
        resolved
    }

    fn walk(
        &self,
        start: NodeLocation,
        path: &NodePath,
        resolve_last: bool,
        resolution: &mut Resolution,
    ) -> Result<NodeLocation, NodeGraphError> {
        let mut location = self.follow(start, resolution)?;
        let mut components = path.components().peekable();
        while let Some(name) = components.next() {
            let Node::Group(group) = location.tree(self).get(location.oid())? else {
                return Err(NodeGraphError::NotAGroup(path.to_string()));
            };
            let child = group
                .child(name)
                .ok_or_else(|| NodeGraphError::NodeNotFound(path.to_string()))?
                .destination();
            let next = location.with_oid(child);
            location = if components.peek().is_none() && !resolve_last {
                next
            } else {
                self.follow(next, resolution)?
            };
        }
        Ok(location)
    }

    /// Return a tree representation of the hierarchy as a string.
    ///
    /// Groups are annotated with their NeXus class, data nodes with their shape and data type, and symbolic nodes with their target.
    /// For example:
    /// ```text
    /// /
    ///   entry [NXentry]
    ///     data [10, 20] float64
    ///     detector -> /entry/data
    ///     raw -> scan.nxs#/entry/data
    /// ```
    #[must_use]
    pub fn hierarchy_tree(&self) -> String {
        fn print_node(name: &str, string: &mut String, node: Option<&Node>) {
            string.push_str(name);
            match node {
                Some(Node::Group(group)) => {
                    if let Some(nexus_class) = group.nexus_class() {
                        let _ = write!(string, " [{nexus_class}]");
                    }
                }
                Some(Node::Data(data)) => {
                    let array = data.array();
                    let _ = write!(string, " {:?} {}", array.shape(), array.data_type());
                }
                Some(Node::Symbolic(symbolic)) => {
                    let _ = write!(string, " -> {}", symbolic.target());
                }
                None => string.push_str(" (missing)"),
            }
            string.push('\n');
        }

        fn update_tree(tree: &Tree, string: &mut String, group: &GroupNode, ancestors: &mut Vec<Oid>) {
            for link in group.children() {
                string.push_str(&" ".repeat(ancestors.len() * 2));
                let node = tree.node(link.destination());
                if ancestors.contains(&link.destination()) {
                    let _ = writeln!(string, "{} (cycle)", link.name());
                    continue;
                }
                print_node(link.name(), string, node);
                if let Some(Node::Group(child)) = node {
                    ancestors.push(link.destination());
                    update_tree(tree, string, child, ancestors);
                    ancestors.pop();
                }
            }
        }

        let mut string = String::default();
        string.push_str("/\n");
        if let Some(Node::Group(root)) = self.node(self.root) {
            update_tree(self, &mut string, root, &mut vec![self.root]);
        }
        string
    }
}

impl<'r> Resolution<'r> {
    fn new(local_uri: Option<&'r str>, resolver: &'r dyn TreeFileResolver) -> Self {
        Self {
            local_uri,
            resolver,
            chain: Vec::new(),
        }
    }
}

/// A [`Tree`] and the URI of the file it came from.
///
/// Dereferences to the [`Tree`].
#[derive(Clone, Debug, Deref, DerefMut)]
pub struct TreeFile {
    uri: String,
    #[deref]
    #[deref_mut]
    tree: Tree,
}

impl TreeFile {
    /// Create an empty tree for the file at `uri`.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self::from_tree(uri, Tree::new())
    }

    /// Associate `tree` with the file at `uri`.
    #[must_use]
    pub fn from_tree(uri: impl Into<String>, tree: Tree) -> Self {
        Self {
            uri: uri.into(),
            tree,
        }
    }

    /// Return the URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Return the tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Consume and return the tree.
    #[must_use]
    pub fn into_tree(self) -> Tree {
        self.tree
    }

    /// Follow `oid` through any chain of symbolic nodes.
    ///
    /// External links back to this file's URI resolve within this tree.
    ///
    /// # Errors
    /// See [`Tree::resolve`].
    pub fn resolve(
        &self,
        oid: Oid,
        resolver: &dyn TreeFileResolver,
    ) -> Result<NodeLocation, NodeGraphError> {
        self.tree.resolve_in(Some(&self.uri), oid, resolver)
    }

    /// Resolve `path` to a node.
    ///
    /// # Errors
    /// See [`Tree::resolve_path`].
    pub fn resolve_path(
        &self,
        path: &str,
        resolver: &dyn TreeFileResolver,
    ) -> Result<NodeLocation, NodeGraphError> {
        self.tree
            .resolve_query(Some(&self.uri), &path.parse()?, resolver)
    }
}
