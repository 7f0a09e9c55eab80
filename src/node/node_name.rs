use derive_more::Display;
use thiserror::Error;

/// A node name.
///
/// A node name is the name of a link from a group to one of its children.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct NodeName(String);

/// An invalid node name.
#[derive(Debug, Error)]
#[error("invalid node name {0:?}")]
pub struct NodeNameError(String);

impl NodeName {
    /// Create a new node name from `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NodeNameError`] if `name` is not valid according to [`NodeName::validate`()].
    pub fn new(name: &str) -> Result<Self, NodeNameError> {
        if Self::validate(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(NodeNameError(name.to_string()))
        }
    }

    /// Extracts a string slice containing the node name `String`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a node name:
    /// - must not be the empty string (""),
    /// - must not include the path separator "/" or the attribute separator "@", and
    /// - must not be a string composed only of period characters, e.g. "." or "..".
    #[must_use]
    pub fn validate(node_name: &str) -> bool {
        !node_name.is_empty()
            && !node_name.contains(['/', '@'])
            && !node_name.chars().all(|c| c == '.')
    }
}

impl TryFrom<&str> for NodeName {
    type Error = NodeNameError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl AsRef<str> for NodeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name() {
        assert!(NodeName::new("entry").is_ok());
        assert!(NodeName::new("data.0").is_ok());
        assert!(NodeName::new("").is_err());
        assert!(NodeName::new("..").is_err());
        assert!(NodeName::new("a/b").is_err());
        assert!(NodeName::new("a@b").is_err());
        assert_eq!(
            NodeName::new("a/b").unwrap_err().to_string(),
            "invalid node name \"a/b\""
        );
    }
}
