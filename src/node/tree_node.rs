use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::array::LazyArray;

use super::{Attribute, NodePath};

/// The object identity of a node, unique within a [`Tree`](super::Tree).
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[display("#{_0}")]
#[serde(transparent)]
pub struct Oid(pub(crate) u64);

impl Oid {
    /// Return the raw identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A named link from a group to a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLink {
    name: String,
    source: Option<Oid>,
    destination: Oid,
}

impl NodeLink {
    pub(crate) fn new(name: String, source: Option<Oid>, destination: Oid) -> Self {
        Self {
            name,
            source,
            destination,
        }
    }

    /// Return the link name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the group holding the link, if known.
    #[must_use]
    pub fn source(&self) -> Option<Oid> {
        self.source
    }

    /// Return the linked node.
    #[must_use]
    pub fn destination(&self) -> Oid {
        self.destination
    }
}

/// A group node.
///
/// Children are kept in creation order.
#[derive(Clone, Debug, Default)]
pub struct GroupNode {
    nexus_class: Option<String>,
    attributes: Vec<Attribute>,
    children: Vec<NodeLink>,
}

impl GroupNode {
    /// Create an empty group with an optional NeXus class such as `NXentry`.
    #[must_use]
    pub fn new(nexus_class: Option<&str>) -> Self {
        Self {
            nexus_class: nexus_class.map(str::to_string),
            ..Self::default()
        }
    }

    /// Return the NeXus class.
    #[must_use]
    pub fn nexus_class(&self) -> Option<&str> {
        self.nexus_class.as_deref()
    }

    /// Return the links to the children in creation order.
    #[must_use]
    pub fn children(&self) -> &[NodeLink] {
        &self.children
    }

    /// Return the link to the child `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&NodeLink> {
        self.children.iter().find(|link| link.name == name)
    }

    /// Returns true if the group has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn from_parts(
        nexus_class: Option<String>,
        attributes: Vec<Attribute>,
        children: Vec<NodeLink>,
    ) -> Self {
        Self {
            nexus_class,
            attributes,
            children,
        }
    }

    pub(crate) fn push_child(&mut self, link: NodeLink) {
        self.children.push(link);
    }
}

/// A data node wrapping a lazy array.
#[derive(Clone, Debug)]
pub struct DataNode {
    array: LazyArray,
    attributes: Vec<Attribute>,
}

impl DataNode {
    /// Create a data node.
    #[must_use]
    pub fn new(array: LazyArray) -> Self {
        Self {
            array,
            attributes: Vec::new(),
        }
    }

    pub(crate) fn with_attributes(array: LazyArray, attributes: Vec<Attribute>) -> Self {
        Self { array, attributes }
    }

    /// Return the lazy array.
    #[must_use]
    pub fn array(&self) -> &LazyArray {
        &self.array
    }

    pub(crate) fn set_array(&mut self, array: LazyArray) {
        self.array = array;
    }
}

/// The target of a symbolic node.
#[derive(Clone, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[display("{}{path}", uri.as_ref().map(|uri| format!("{uri}#")).unwrap_or_default())]
pub struct LinkTarget {
    /// The URI of the file holding the target, or [`None`] for the same file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// The path of the target within its file.
    pub path: NodePath,
}

/// A node standing in for another node, in the same tree or in another file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolicNode {
    target: LinkTarget,
}

impl SymbolicNode {
    /// Create a symbolic node.
    #[must_use]
    pub fn new(target: LinkTarget) -> Self {
        Self { target }
    }

    /// Return the link target.
    #[must_use]
    pub fn target(&self) -> &LinkTarget {
        &self.target
    }

    /// Returns true if the target is in another file.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.target.uri.is_some()
    }
}

/// A node of a [`Tree`](super::Tree).
#[derive(Clone, Debug, From)]
pub enum Node {
    /// A group.
    Group(GroupNode),
    /// A data node.
    Data(DataNode),
    /// A symbolic node.
    Symbolic(SymbolicNode),
}

impl Node {
    /// Return the group, if this is a group node.
    #[must_use]
    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Return the data node, if this is a data node.
    #[must_use]
    pub fn as_data(&self) -> Option<&DataNode> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Return the symbolic node, if this is a symbolic node.
    #[must_use]
    pub fn as_symbolic(&self) -> Option<&SymbolicNode> {
        match self {
            Self::Symbolic(symbolic) => Some(symbolic),
            _ => None,
        }
    }

    /// Returns true if this is a group node.
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Return the attributes. Symbolic nodes have none.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        match self {
            Self::Group(group) => &group.attributes,
            Self::Data(data) => &data.attributes,
            Self::Symbolic(_) => &[],
        }
    }

    /// Return the attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes().iter().find(|attribute| attribute.name() == name)
    }

    pub(crate) fn attributes_mut(&mut self) -> Option<&mut Vec<Attribute>> {
        match self {
            Self::Group(group) => Some(&mut group.attributes),
            Self::Data(data) => Some(&mut data.attributes),
            Self::Symbolic(_) => None,
        }
    }
}
