//! Metadata attached to lazy and realized arrays.
//!
//! Metadata instances are grouped by [`MetadataKind`] in a [`MetadataMap`].
//! Instances that describe individual axes of their owner are *axis-aware* (see [`Metadata::is_axis_aware`]): they are re-sliced whenever their owner is sliced and reshaped whenever their owner is reshaped, so that axis `i` of the metadata always describes axis `i` of the owner.
//!
//! Built-in kinds:
//!  - [`AxesMetadata`]: per-axis companion arrays (axis-aware),
//!  - [`OriginMetadata`]: the file and dataset an array was read from, and
//!  - [`SliceInfo`](crate::iteration::SliceInfo): slice iteration provenance.

mod axes_metadata;
mod metadata_map;
mod origin_metadata;

pub use axes_metadata::AxesMetadata;
pub use metadata_map::MetadataMap;
pub use origin_metadata::OriginMetadata;

use std::any::Any;

use derive_more::Display;

use crate::{array::ArrayError, slice::SliceND};

/// The kind of a metadata instance, a static string tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{_0}")]
pub struct MetadataKind(&'static str);

impl MetadataKind {
    /// Create a metadata kind.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Return the name of the kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

/// Metadata attached to an array.
pub trait Metadata: dyn_clone::DynClone + core::fmt::Debug + Send + Sync + Any {
    /// Return the kind of this metadata.
    fn kind(&self) -> MetadataKind;

    /// Returns true if this metadata describes the axes of its owner.
    fn is_axis_aware(&self) -> bool {
        false
    }

    /// Return this metadata sliced by `slice`, a slice of its owner.
    ///
    /// [`None`] means the metadata is unaffected by slicing.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the metadata is incompatible with `slice`.
    fn sliced(&self, slice: &SliceND) -> Result<Option<Box<dyn Metadata>>, ArrayError> {
        let _ = slice;
        Ok(None)
    }

    /// Return this metadata reshaped from `old_shape` to `new_shape`, which differ only by unit dimensions.
    ///
    /// [`None`] means the metadata is unaffected by reshaping.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the metadata is incompatible with the reshape.
    fn reshaped(
        &self,
        old_shape: &[u64],
        new_shape: &[u64],
    ) -> Result<Option<Box<dyn Metadata>>, ArrayError> {
        let _ = (old_shape, new_shape);
        Ok(None)
    }

    /// Return this metadata for an owner grown from `old_shape` to `new_shape`, which have the same rank.
    ///
    /// [`None`] means the metadata is unaffected by growth.
    fn resized(&self, old_shape: &[u64], new_shape: &[u64]) -> Option<Box<dyn Metadata>> {
        let _ = (old_shape, new_shape);
        None
    }

    /// Return `self` as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

dyn_clone::clone_trait_object!(Metadata);
