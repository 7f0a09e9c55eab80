use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::NodeName;

/// An absolute node path.
///
/// A node path is a `/` delimited sequence of [`NodeName`]s from the root group.
/// The root path is `/`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
#[display("{}", _0)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

/// An invalid node path.
#[derive(Debug, Error)]
#[error("invalid node path {0:?}")]
pub struct NodePathError(String);

impl NodePath {
    /// Create a new node path from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NodePathError`] if `path` is not valid according to [`NodePath::validate`()].
    pub fn new(path: &str) -> Result<Self, NodePathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(NodePathError(path.to_string()))
        }
    }

    /// The root node.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Extracts a string slice containing the node path `String`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Return the names along the path, outermost first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|name| !name.is_empty())
    }

    /// Return the last name of the path, or [`None`] for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.components().last()
    }

    /// Return the parent path, or [`None`] for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (parent, _) = self.0.rsplit_once('/')?;
        if self.is_root() {
            None
        } else if parent.is_empty() {
            Some(Self::root())
        } else {
            Some(Self(parent.to_string()))
        }
    }

    /// Return the path of the child `name`.
    #[must_use]
    pub fn join(&self, name: &NodeName) -> Self {
        if self.is_root() {
            Self(format!("/{name}"))
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }

    /// Validates a path:
    /// - A path always starts with `/`,
    /// - a non-root path cannot end with `/`, and
    /// - every name along the path is a valid [`NodeName`].
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path == "/"
            || (path.starts_with('/')
                && path[1..].split('/').all(NodeName::validate))
    }
}

impl TryFrom<&str> for NodePath {
    type Error = NodePathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl TryFrom<String> for NodePath {
    type Error = NodePathError;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        if Self::validate(&path) {
            Ok(Self(path))
        } else {
            Err(NodePathError(path))
        }
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl FromStr for NodePath {
    type Err = NodePathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        Self::new(path)
    }
}

/// A parsed path query of the form `/a/b`, `/a/b/` or `/a/b@name`.
///
/// The leading `/` may be omitted.
/// A trailing `/` requires the node to be a group.
/// An `@` suffix names an attribute of the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathQuery {
    path: NodePath,
    group: bool,
    attribute: Option<String>,
}

impl PathQuery {
    /// Return the node path.
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Returns true if the node must be a group.
    #[must_use]
    pub fn requires_group(&self) -> bool {
        self.group
    }

    /// Return the attribute name, if any.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
}

impl FromStr for PathQuery {
    type Err = NodePathError;

    fn from_str(query: &str) -> Result<Self, Self::Err> {
        let (path, attribute) = match query.rsplit_once('@') {
            Some((_, "")) => return Err(NodePathError(query.to_string())),
            Some((path, attribute)) => (path, Some(attribute.to_string())),
            None => (query, None),
        };
        let group = path.len() > 1 && path.ends_with('/');
        let path = path.strip_suffix('/').filter(|_| group).unwrap_or(path);
        let path = match path {
            "" | "/" => NodePath::root(),
            path if path.starts_with('/') => NodePath::new(path)?,
            path => NodePath::new(&format!("/{path}"))?,
        };
        Ok(Self {
            group: group || path.is_root(),
            path,
            attribute,
        })
    }
}
