use std::any::Any;

use serde::{Deserialize, Serialize};

use super::{Metadata, MetadataKind};

/// The file and dataset an array was read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMetadata {
    file_path: String,
    dataset_path: String,
}

impl OriginMetadata {
    /// The metadata kind.
    pub const KIND: MetadataKind = MetadataKind::new("origin");

    /// Create origin metadata.
    #[must_use]
    pub fn new(file_path: impl Into<String>, dataset_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            dataset_path: dataset_path.into(),
        }
    }

    /// Return the path (or URI) of the originating file.
    #[must_use]
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Return the path of the dataset within the originating file.
    #[must_use]
    pub fn dataset_path(&self) -> &str {
        &self.dataset_path
    }
}

impl Metadata for OriginMetadata {
    fn kind(&self) -> MetadataKind {
        Self::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
