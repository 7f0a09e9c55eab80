use std::iter::FusedIterator;

use crate::{array_subset::ArraySubset, shape::ravel_indices};

use super::ContiguousIndicesIterator;

/// Iterates over contiguous linearised element indices in an array subset.
///
/// The iterator item is a tuple: (linearised index, # contiguous elements).
pub struct ContiguousLinearisedIndicesIterator {
    inner: ContiguousIndicesIterator,
    array_shape: Vec<u64>,
}

impl ContiguousLinearisedIndicesIterator {
    /// Create a new contiguous linearised indices iterator.
    ///
    /// `array_shape` must encapsulate `subset`.
    #[must_use]
    pub fn new(subset: &ArraySubset, array_shape: &[u64]) -> Self {
        Self {
            inner: ContiguousIndicesIterator::new(subset, array_shape),
            array_shape: array_shape.to_vec(),
        }
    }

    /// Return the number of contiguous elements (fixed on each iteration).
    #[must_use]
    pub fn contiguous_elements(&self) -> u64 {
        self.inner.contiguous_elements()
    }
}

impl Iterator for ContiguousLinearisedIndicesIterator {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(indices, elements)| (ravel_indices(&indices, &self.array_shape), elements))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ContiguousLinearisedIndicesIterator {}

impl FusedIterator for ContiguousLinearisedIndicesIterator {}
