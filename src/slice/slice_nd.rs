use itertools::izip;

use crate::{
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    shape::ArrayShape,
};

use super::{Slice, SliceDescriptor, SliceError};

/// An N-dimensional slice resolved against a source shape.
///
/// The output shape of the slice is the per-axis [`Slice::count`].
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SliceND {
    source_shape: ArrayShape,
    slices: Vec<Slice>,
}

impl SliceND {
    /// The identity slice of `shape`.
    #[must_use]
    pub fn full(shape: &[u64]) -> Self {
        Self {
            source_shape: shape.to_vec(),
            slices: shape.iter().map(|&length| Slice::full(length)).collect(),
        }
    }

    /// Resolve optional per-axis `starts`, `stops` and `steps` against `shape`.
    ///
    /// # Errors
    /// Returns [`SliceError::ShapeMismatch`] if a provided array does not have one entry per axis of `shape`, or [`SliceError::InvalidStep`] if any step is zero.
    pub fn resolve(
        shape: &[u64],
        starts: Option<&[i64]>,
        stops: Option<&[i64]>,
        steps: Option<&[i64]>,
    ) -> Result<Self, SliceError> {
        for values in [starts, stops, steps].into_iter().flatten() {
            if values.len() != shape.len() {
                return Err(IncompatibleDimensionalityError::new(values.len(), shape.len()).into());
            }
        }
        let slices = shape
            .iter()
            .enumerate()
            .map(|(axis, &length)| {
                Slice::resolve(
                    length,
                    starts.map(|s| s[axis]),
                    stops.map(|s| s[axis]),
                    steps.map(|s| s[axis]),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source_shape: shape.to_vec(),
            slices,
        })
    }

    /// Resolve one [`SliceDescriptor`] per axis of `shape`.
    ///
    /// # Errors
    /// Returns [`SliceError::ShapeMismatch`] if the number of descriptors does not match the dimensionality of `shape`, or [`SliceError::InvalidStep`] if any step is zero.
    pub fn from_descriptors(
        shape: &[u64],
        descriptors: &[SliceDescriptor],
    ) -> Result<Self, SliceError> {
        if descriptors.len() != shape.len() {
            return Err(IncompatibleDimensionalityError::new(descriptors.len(), shape.len()).into());
        }
        let slices = std::iter::zip(shape, descriptors)
            .map(|(&length, descriptor)| descriptor.resolve(length))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source_shape: shape.to_vec(),
            slices,
        })
    }

    /// Create an N-dimensional slice from already resolved `slices` of `source_shape`.
    ///
    /// # Errors
    /// Returns [`SliceError::ShapeMismatch`] if the number of slices does not match the dimensionality of `source_shape`.
    pub fn from_slices(source_shape: ArrayShape, slices: Vec<Slice>) -> Result<Self, SliceError> {
        if source_shape.len() == slices.len() {
            Ok(Self {
                source_shape,
                slices,
            })
        } else {
            Err(IncompatibleDimensionalityError::new(slices.len(), source_shape.len()).into())
        }
    }

    /// Return the shape the slice was resolved against.
    #[must_use]
    pub fn source_shape(&self) -> &[u64] {
        &self.source_shape
    }

    /// Return the per-axis slices.
    #[must_use]
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Return the slice of `axis`.
    #[must_use]
    pub fn slice(&self, axis: usize) -> Option<&Slice> {
        self.slices.get(axis)
    }

    /// Replace the slice of `axis`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `axis` is out of bounds.
    pub fn set_slice(&mut self, axis: usize, slice: Slice) -> Result<(), IncompatibleDimensionalityError> {
        let rank = self.rank();
        let target = self
            .slices
            .get_mut(axis)
            .ok_or(IncompatibleDimensionalityError::new(axis, rank))?;
        *target = slice;
        Ok(())
    }

    /// Return the dimensionality.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.slices.len()
    }

    /// Return the output shape.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.slices.iter().map(Slice::count).collect()
    }

    /// Return the number of selected elements.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.slices.iter().map(Slice::count).product()
    }

    /// Returns true if no elements are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.iter().any(Slice::is_empty)
    }

    /// Returns true if this is the identity slice of its source shape.
    #[must_use]
    pub fn is_full(&self) -> bool {
        std::iter::zip(&self.slices, &self.source_shape).all(|(slice, &length)| slice.is_full(length))
    }

    /// Return the source indices of the element at output `indices`.
    #[must_use]
    pub fn source_indices(&self, indices: &[u64]) -> Vec<u64> {
        std::iter::zip(&self.slices, indices)
            .map(|(slice, &i)| slice.index(i))
            .collect()
    }

    /// Compose `inner`, a slice of this slice's output, into a single slice of the source shape.
    ///
    /// # Errors
    /// Returns [`SliceError::ShapeMismatch`] if the dimensionality of `inner` does not match.
    ///
    /// # Panics
    /// Panics in debug builds if `inner` was not resolved against the output shape of `self`.
    pub fn compose(&self, inner: &Self) -> Result<Self, SliceError> {
        if inner.rank() != self.rank() {
            return Err(IncompatibleDimensionalityError::new(inner.rank(), self.rank()).into());
        }
        debug_assert_eq!(inner.source_shape, self.shape());
        let slices = izip!(&self.slices, &inner.slices, &self.source_shape)
            .map(|(outer, inner, &length)| outer.compose(inner, length))
            .collect();
        Ok(Self {
            source_shape: self.source_shape.clone(),
            slices,
        })
    }

    /// Return the smallest [`ArraySubset`] of the source containing every selected element, or [`None`] if the slice is empty.
    #[must_use]
    pub fn bounding_subset(&self) -> Option<ArraySubset> {
        let (start, end_inc): (Vec<u64>, Vec<u64>) = self
            .slices
            .iter()
            .map(Slice::bounds)
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .unzip();
        ArraySubset::new_with_start_end_inc(start, end_inc).ok()
    }

    /// Re-target this slice to `subset`, which must contain every selected element.
    #[must_use]
    pub fn relative_to(&self, subset: &ArraySubset) -> Self {
        debug_assert_eq!(subset.dimensionality(), self.rank());
        let slices = izip!(&self.slices, subset.start(), subset.shape())
            .map(|(slice, &offset, &length)| slice.shifted(offset, length))
            .collect();
        Self {
            source_shape: subset.shape().to_vec(),
            slices,
        }
    }

    /// Return the same selection against a different (typically grown) source shape.
    ///
    /// Every selected element must lie within `source_shape`.
    #[must_use]
    pub fn with_source_shape(&self, source_shape: ArrayShape) -> Self {
        debug_assert_eq!(source_shape.len(), self.rank());
        Self {
            source_shape,
            slices: self.slices.clone(),
        }
    }
}

impl std::fmt::Display for SliceND {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, slice) in self.slices.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{slice}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_nd_resolve() {
        let slice =
            SliceND::resolve(&[10, 20, 30, 40], Some(&[0, 0, 0, 0]), Some(&[1, 20, 5, 5]), None)
                .unwrap();
        assert_eq!(slice.shape(), vec![1, 20, 5, 5]);
        assert_eq!(slice.num_elements(), 500);
        assert!(!slice.is_full());
        assert!(SliceND::full(&[3, 4]).is_full());
    }

    #[test]
    fn slice_nd_shape_mismatch() {
        assert!(matches!(
            SliceND::resolve(&[10, 20], Some(&[0]), None, None),
            Err(SliceError::ShapeMismatch(_))
        ));
        assert!(matches!(
            SliceND::resolve(&[10, 20], None, None, Some(&[1, 0])),
            Err(SliceError::InvalidStep)
        ));
        assert!(SliceND::from_descriptors(&[10], &[]).is_err());
    }

    #[test]
    fn slice_nd_compose() {
        let outer = SliceND::resolve(&[10, 8], Some(&[2, 7]), None, Some(&[1, -1])).unwrap();
        assert_eq!(outer.shape(), vec![8, 8]);
        let inner = SliceND::resolve(&outer.shape(), Some(&[1, 0]), Some(&[7, 8]), Some(&[3, 2]))
            .unwrap();
        let composed = outer.compose(&inner).unwrap();
        assert_eq!(composed.shape(), inner.shape());
        assert_eq!(composed.source_indices(&[0, 0]), vec![3, 7]);
        assert_eq!(composed.source_indices(&[1, 1]), vec![6, 5]);
    }

    #[test]
    fn slice_nd_bounding_subset() {
        let slice = SliceND::resolve(&[10, 8], Some(&[2, 6]), Some(&[9, 0]), Some(&[3, -2])).unwrap();
        let subset = slice.bounding_subset().unwrap();
        assert_eq!(subset.start(), &[2, 2]);
        assert_eq!(subset.shape(), &[7, 5]);
        let relative = slice.relative_to(&subset);
        assert_eq!(relative.shape(), slice.shape());
        assert_eq!(relative.source_indices(&[1, 0]), vec![3, 4]);
        assert!(SliceND::resolve(&[0, 3], None, None, None)
            .unwrap()
            .bounding_subset()
            .is_none());
    }
}
