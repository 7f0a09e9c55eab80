use std::{fmt::Debug, sync::Arc};

use derive_more::Deref;

use crate::{
    array_subset::IncompatibleDimensionalityError,
    shape::{self, ArrayShape},
    slice::SliceND,
};

use super::{ArrayError, LazyArray, RealizedArray, WriteError};

/// Writes blocks of array data.
pub trait ArrayWriter: Send + Sync + Debug {
    /// Write `data` into the elements selected by `slice`.
    ///
    /// `slice` is resolved against the current shape of the writer, and `data` holds `slice.num_elements()` items of the array data type.
    ///
    /// # Errors
    /// Returns a [`WriteError`] if the data cannot be written.
    fn write(&self, slice: &SliceND, data: &RealizedArray) -> Result<(), WriteError>;

    /// Grow the array to `shape`.
    ///
    /// # Errors
    /// Returns a [`WriteError`] if the array cannot be resized.
    fn resize(&self, shape: &[u64]) -> Result<(), WriteError>;

    /// Return the shape the writer currently holds, which other handles may have grown.
    ///
    /// [`None`] means the writer does not track a shape.
    fn stored_shape(&self) -> Option<ArrayShape> {
        None
    }

    /// Returns true if the writer no longer accepts writes.
    fn is_read_only(&self) -> bool {
        false
    }
}

/// A lazy array that also accepts writes.
///
/// Dereferences to the underlying [`LazyArray`], which reads back written data through its loader.
/// Writes may grow the array along axes whose maximum shape allows it.
///
/// Writes are not locked internally: callers must serialise writes to overlapping regions.
#[derive(Clone, Debug, Deref)]
pub struct WritableLazyArray {
    #[deref]
    array: LazyArray,
    writer: Arc<dyn ArrayWriter>,
}

impl WritableLazyArray {
    /// Create a writable array from a base (non-view) lazy `array` and the `writer` of its data.
    ///
    /// # Errors
    /// Returns [`ArrayError::ReadOnly`] if `array` is a view.
    pub fn new(array: LazyArray, writer: Arc<dyn ArrayWriter>) -> Result<Self, ArrayError> {
        if array.is_base() {
            Ok(Self { array, writer })
        } else {
            Err(ArrayError::ReadOnly)
        }
    }

    /// Return the lazy array.
    #[must_use]
    pub fn array(&self) -> &LazyArray {
        &self.array
    }

    /// Consume and return the lazy array.
    #[must_use]
    pub fn into_array(self) -> LazyArray {
        self.array
    }

    /// Return the writer.
    #[must_use]
    pub fn writer(&self) -> &Arc<dyn ArrayWriter> {
        &self.writer
    }

    /// Write `data` into the elements selected by `slice`.
    ///
    /// `slice` may be resolved against a shape larger than the current shape, in which case the array is first grown to contain it.
    /// `data` must hold the items selected by `slice`, its shape may differ from the slice shape by unit dimensions.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if:
    ///  - the writer is read only,
    ///  - the rank of `slice` does not match,
    ///  - the data type or number of items of `data` does not match,
    ///  - growing would exceed the maximum shape, or
    ///  - the writer fails.
    pub fn set_slice(&mut self, slice: &SliceND, data: &RealizedArray) -> Result<(), ArrayError> {
        if self.writer.is_read_only() {
            return Err(ArrayError::ReadOnly);
        }
        if slice.rank() != self.rank() {
            return Err(IncompatibleDimensionalityError::new(slice.rank(), self.rank()).into());
        }
        self.sync_shape();
        if data.data_type() != self.data_type() {
            return Err(ArrayError::IncompatibleDataType {
                expected: self.data_type(),
                got: data.data_type(),
            });
        }
        if data.elements_per_item() != self.elements_per_item() {
            return Err(ArrayError::IncompatibleElementsPerItem {
                expected: self.elements_per_item(),
                got: data.elements_per_item(),
            });
        }
        if data.size() != slice.num_elements() {
            return Err(ArrayError::ShapeMismatch {
                expected: slice.shape(),
                got: data.shape().to_vec(),
            });
        }
        if slice.source_shape() != self.shape() {
            let grown = shape::grow_shape(self.shape(), slice.source_shape(), self.max_shape());
            if std::iter::zip(&grown, slice.source_shape()).any(|(grown, source)| grown < source) {
                return Err(ArrayError::ExceedsMaxShape(
                    slice.source_shape().to_vec(),
                    self.max_shape().to_vec(),
                ));
            }
            self.grow(grown)?;
        }
        if slice.is_empty() {
            return Ok(());
        }
        let slice = slice.with_source_shape(self.shape().to_vec());
        self.writer.write(&slice, data)?;
        Ok(())
    }

    /// Write `data` with its origin at `start`, growing the array if needed.
    ///
    /// # Errors
    /// See [`set_slice`](WritableLazyArray::set_slice).
    pub fn set_slice_at(&mut self, start: &[u64], data: &RealizedArray) -> Result<(), ArrayError> {
        if start.len() != self.rank() || data.rank() != self.rank() {
            return Err(IncompatibleDimensionalityError::new(start.len(), self.rank()).into());
        }
        self.sync_shape();
        let end: ArrayShape = std::iter::zip(start, data.shape())
            .map(|(start, length)| start + length)
            .collect();
        let source: ArrayShape = std::iter::zip(self.shape(), &end)
            .map(|(&current, &end)| current.max(end))
            .collect();
        let to_i64 = |values: &[u64]| -> Vec<i64> {
            values
                .iter()
                .map(|&value| i64::try_from(value).unwrap_or(i64::MAX))
                .collect()
        };
        let slice = SliceND::resolve(&source, Some(&to_i64(start)), Some(&to_i64(&end)), None)?;
        self.set_slice(&slice, data)
    }

    /// Grow the array to `shape`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `shape` exceeds the maximum shape or would shrink an axis, or the writer fails.
    pub fn resize(&mut self, shape: ArrayShape) -> Result<(), ArrayError> {
        if self.writer.is_read_only() {
            return Err(ArrayError::ReadOnly);
        }
        shape::validate_max_shape(&shape, self.max_shape())?;
        self.sync_shape();
        if std::iter::zip(&shape, self.shape()).any(|(new, old)| new < old) {
            return Err(ArrayError::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: shape,
            });
        }
        self.grow(shape)
    }

    /// Catch up with growth made through other handles to the same writer.
    fn sync_shape(&mut self) {
        let Some(stored) = self.writer.stored_shape() else {
            return;
        };
        if stored.len() != self.rank() {
            return;
        }
        let grown = shape::grow_shape(self.shape(), &stored, self.max_shape());
        if grown.as_slice() != self.shape() {
            tracing::debug!(
                name = self.name(),
                from = ?self.shape(),
                to = ?grown,
                "caught up with writer shape"
            );
            self.array = self.array.resized(grown);
        }
    }

    fn grow(&mut self, shape: ArrayShape) -> Result<(), ArrayError> {
        if shape.as_slice() == self.shape() {
            return Ok(());
        }
        self.writer.resize(&shape)?;
        tracing::debug!(name = self.name(), shape = ?shape, "grew writable array");
        self.array = self.array.resized(shape);
        Ok(())
    }
}
