use std::collections::BTreeMap;

use crate::{array::ArrayError, shape, slice::SliceND};

use super::{Metadata, MetadataKind};

/// Metadata instances grouped by kind.
///
/// Instances of one kind keep their insertion order.
#[derive(Clone, Debug, Default)]
pub struct MetadataMap {
    entries: BTreeMap<MetadataKind, Vec<Box<dyn Metadata>>>,
}

impl MetadataMap {
    /// Create an empty metadata map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metadata instance after any existing instances of its kind.
    pub fn add(&mut self, metadata: Box<dyn Metadata>) {
        self.entries.entry(metadata.kind()).or_default().push(metadata);
    }

    /// Replace all instances of the kind of `metadata` with `metadata`.
    pub fn set(&mut self, metadata: Box<dyn Metadata>) {
        self.entries.insert(metadata.kind(), vec![metadata]);
    }

    /// Return the instances of `kind`.
    #[must_use]
    pub fn get(&self, kind: MetadataKind) -> &[Box<dyn Metadata>] {
        self.entries.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Return the first instance of `kind`.
    #[must_use]
    pub fn first(&self, kind: MetadataKind) -> Option<&dyn Metadata> {
        self.get(kind).first().map(|metadata| metadata.as_ref())
    }

    /// Return the first instance of type `T`.
    #[must_use]
    pub fn first_as<T: Metadata>(&self) -> Option<&T> {
        self.iter().find_map(|metadata| metadata.as_any().downcast_ref::<T>())
    }

    /// Remove all instances of `kind`, returning them.
    pub fn clear(&mut self, kind: MetadataKind) -> Vec<Box<dyn Metadata>> {
        self.entries.remove(&kind).unwrap_or_default()
    }

    /// Returns true if there are no metadata instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Return the number of metadata instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Return the kinds with at least one instance.
    pub fn kinds(&self) -> impl Iterator<Item = MetadataKind> + '_ {
        self.entries
            .iter()
            .filter(|(_, instances)| !instances.is_empty())
            .map(|(kind, _)| *kind)
    }

    /// Iterate over every metadata instance.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Metadata> {
        self.entries.values().flatten().map(|metadata| metadata.as_ref())
    }

    /// Return the metadata of an array sliced by `slice`.
    ///
    /// Axis-aware instances are sliced, all others are copied.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if an axis-aware instance cannot be sliced.
    pub fn sliced(&self, slice: &SliceND) -> Result<Self, ArrayError> {
        self.map_axis_aware(|metadata| metadata.sliced(slice))
    }

    /// Return the metadata of an array reshaped from `old_shape` to `new_shape`.
    ///
    /// Axis-aware instances are reshaped when the shapes differ only by unit dimensions and dropped otherwise.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if an axis-aware instance cannot be reshaped.
    pub fn reshaped(&self, old_shape: &[u64], new_shape: &[u64]) -> Result<Self, ArrayError> {
        if old_shape == new_shape {
            return Ok(self.clone());
        }
        if shape::is_unit_reshape(old_shape, new_shape) {
            self.map_axis_aware(|metadata| metadata.reshaped(old_shape, new_shape))
        } else {
            let mut map = self.clone();
            for instances in map.entries.values_mut() {
                instances.retain(|metadata| !metadata.is_axis_aware());
            }
            Ok(map)
        }
    }

    /// Return the metadata of an array grown from `old_shape` to `new_shape`.
    ///
    /// Axis-aware instances follow the new shape, all others are copied.
    #[must_use]
    pub fn resized(&self, old_shape: &[u64], new_shape: &[u64]) -> Self {
        if old_shape == new_shape {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .map(|(kind, instances)| {
                let instances = instances
                    .iter()
                    .map(|metadata| {
                        if metadata.is_axis_aware() {
                            metadata
                                .resized(old_shape, new_shape)
                                .unwrap_or_else(|| metadata.clone())
                        } else {
                            metadata.clone()
                        }
                    })
                    .collect();
                (*kind, instances)
            })
            .collect();
        Self { entries }
    }

    fn map_axis_aware<F>(&self, f: F) -> Result<Self, ArrayError>
    where
        F: Fn(&dyn Metadata) -> Result<Option<Box<dyn Metadata>>, ArrayError>,
    {
        let mut entries = BTreeMap::new();
        for (kind, instances) in &self.entries {
            let instances = instances
                .iter()
                .map(|metadata| {
                    if metadata.is_axis_aware() {
                        Ok(f(metadata.as_ref())?.unwrap_or_else(|| metadata.clone()))
                    } else {
                        Ok(metadata.clone())
                    }
                })
                .collect::<Result<Vec<_>, ArrayError>>()?;
            entries.insert(*kind, instances);
        }
        Ok(Self { entries })
    }
}
