use std::{fmt::Debug, sync::Arc};

use derive_more::{Deref, Display};

use crate::{
    metadata::Metadata,
    shape::{self, ArrayShape, MaxShape},
};

use super::{ArrayError, LazyArray, LoadError};

/// Reports the current shape of a growing data source.
pub trait ShapeRefresher: Send + Sync + Debug {
    /// Return the current shape of the source.
    ///
    /// # Errors
    /// Returns a [`LoadError`] if the shape cannot be queried at the moment.
    fn current_shape(&self) -> Result<ArrayShape, LoadError>;

    /// Returns true if the source has finished growing.
    fn is_complete(&self) -> bool {
        false
    }
}

/// The state of a [`DynamicLazyArray`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum DynamicState {
    /// The shape is fixed.
    #[display("static")]
    Static,
    /// The shape may grow.
    #[display("dynamic")]
    Dynamic,
}

/// A lazy array whose shape may grow.
///
/// A [`Static`](DynamicState::Static) array has a fixed shape.
/// A [`Dynamic`](DynamicState::Dynamic) array queries a [`ShapeRefresher`] on [`refresh_shape`](DynamicLazyArray::refresh_shape), growing each axis up to its maximum shape.
/// Axis lengths never decrease.
///
/// Dereferences to the current [`LazyArray`].
#[derive(Clone, Debug, Deref)]
pub struct DynamicLazyArray {
    #[deref]
    array: LazyArray,
    max_shape: MaxShape,
    refresher: Option<Arc<dyn ShapeRefresher>>,
}

impl DynamicLazyArray {
    /// Create a static array.
    #[must_use]
    pub fn new_static(array: LazyArray) -> Self {
        Self {
            max_shape: array.shape().to_vec(),
            array,
            refresher: None,
        }
    }

    /// Create a dynamic array growing up to `max_shape`, where [`UNLIMITED`](crate::shape::UNLIMITED) marks an axis without bound.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the shape of `array` exceeds `max_shape`, or `array` is a view.
    pub fn new_dynamic(
        array: LazyArray,
        refresher: Arc<dyn ShapeRefresher>,
        max_shape: MaxShape,
    ) -> Result<Self, ArrayError> {
        if !array.is_base() {
            return Err(ArrayError::ShapeMismatch {
                expected: array.view().source_shape().to_vec(),
                got: array.shape().to_vec(),
            });
        }
        let array = array.with_max_shape(max_shape.clone())?;
        Ok(Self {
            array,
            max_shape,
            refresher: Some(refresher),
        })
    }

    /// Convert into a dynamic array.
    ///
    /// # Errors
    /// See [`new_dynamic`](DynamicLazyArray::new_dynamic).
    pub fn into_dynamic(
        self,
        refresher: Arc<dyn ShapeRefresher>,
        max_shape: MaxShape,
    ) -> Result<Self, ArrayError> {
        Self::new_dynamic(self.array, refresher, max_shape)
    }

    /// Add a metadata instance to the current array.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Metadata) -> Self {
        self.array.add_metadata(metadata);
        self
    }

    /// Return the state.
    #[must_use]
    pub fn state(&self) -> DynamicState {
        if self.refresher.is_some() {
            DynamicState::Dynamic
        } else {
            DynamicState::Static
        }
    }

    /// Returns true if the shape may grow.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.refresher.is_some()
    }

    /// Return the current shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.array.shape()
    }

    /// Return the maximum shape.
    #[must_use]
    pub fn max_shape(&self) -> &[u64] {
        &self.max_shape
    }

    /// Return the current lazy array.
    #[must_use]
    pub fn array(&self) -> &LazyArray {
        &self.array
    }

    /// Consume and return the current lazy array.
    #[must_use]
    pub fn into_array(self) -> LazyArray {
        self.array
    }

    /// Returns true if the source has finished growing. Static arrays are always complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.refresher
            .as_ref()
            .map_or(true, |refresher| refresher.is_complete())
    }

    /// Query the source for its current shape and grow to it.
    ///
    /// Each axis becomes the larger of its current and reported lengths, bounded by the maximum shape.
    /// Returns false if the source could not be queried.
    /// Refreshing a static array does nothing and returns true.
    pub fn refresh_shape(&mut self) -> bool {
        let Some(refresher) = &self.refresher else {
            return true;
        };
        let candidate = match refresher.current_shape() {
            Ok(candidate) => candidate,
            Err(err) => {
                tracing::warn!(name = self.array.name(), error = %err, "shape refresh failed");
                return false;
            }
        };
        if candidate.len() != self.array.rank() {
            tracing::warn!(
                name = self.array.name(),
                shape = ?candidate,
                rank = self.array.rank(),
                "refreshed shape has the wrong rank"
            );
            return false;
        }
        let grown = shape::grow_shape(self.array.shape(), &candidate, &self.max_shape);
        if grown.as_slice() != self.array.shape() {
            tracing::debug!(
                name = self.array.name(),
                from = ?self.array.shape(),
                to = ?grown,
                "shape refreshed"
            );
            self.array = self.array.resized(grown);
        }
        true
    }
}

impl From<LazyArray> for DynamicLazyArray {
    fn from(array: LazyArray) -> Self {
        Self::new_static(array)
    }
}
