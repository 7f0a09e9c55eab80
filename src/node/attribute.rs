use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named attribute of a group or data node.
///
/// Attribute values are JSON values.
/// Integers may be flagged as unsigned, matching the unsigned integer attributes of NeXus files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    value: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_unsigned: bool,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_unsigned: false,
        }
    }

    /// Create a new attribute holding unsigned integers.
    pub fn new_unsigned(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_unsigned: true,
        }
    }

    /// Return the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns true if the value holds unsigned integers.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        self.is_unsigned
    }
}

/// Insert `attribute` into `attributes`, replacing any attribute with the same name in place.
pub(crate) fn upsert_attribute(attributes: &mut Vec<Attribute>, attribute: Attribute) {
    match attributes.iter_mut().find(|a| a.name == attribute.name) {
        Some(existing) => *existing = attribute,
        None => attributes.push(attribute),
    }
}
