use std::iter::FusedIterator;

use crate::{
    array_subset::{ArraySubset, IncompatibleDimensionalityError},
    shape::{ArrayIndices, ArrayShape},
};

use super::IndicesIterator;

/// Iterates over the regular sized chunks overlapping an array subset.
/// All chunks have the same size, and may extend over the bounds of the array subset.
///
/// The iterator item is a ([`ArrayIndices`], [`ArraySubset`]) tuple corresponding to the chunk indices and chunk subset.
pub struct ChunksIterator {
    inner: IndicesIterator,
    chunk_shape: ArrayShape,
}

impl ChunksIterator {
    /// Create a new chunks iterator.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleDimensionalityError`] if `chunk_shape` does not match the dimensionality of `subset` or has a zero length axis.
    pub fn new(
        subset: &ArraySubset,
        chunk_shape: &[u64],
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if subset.dimensionality() != chunk_shape.len() || chunk_shape.contains(&0) {
            return Err(IncompatibleDimensionalityError::new(
                chunk_shape.len(),
                subset.dimensionality(),
            ));
        }
        let subset_chunks = if subset.is_empty() {
            ArraySubset::new_with_shape(vec![0; chunk_shape.len()])
        } else {
            let chunk_start: ArrayIndices = std::iter::zip(subset.start(), chunk_shape)
                .map(|(s, c)| s / c)
                .collect();
            let chunk_end_inc: ArrayIndices = std::iter::zip(subset.end_inc(), chunk_shape)
                .map(|(e, c)| e / c)
                .collect();
            ArraySubset::new_with_start_end_inc(chunk_start, chunk_end_inc)?
        };
        Ok(Self {
            inner: IndicesIterator::new(subset_chunks),
            chunk_shape: chunk_shape.to_vec(),
        })
    }
}

impl Iterator for ChunksIterator {
    type Item = (ArrayIndices, ArraySubset);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|chunk_indices| {
            let start = std::iter::zip(&chunk_indices, &self.chunk_shape)
                .map(|(i, c)| i * c)
                .collect();
            let chunk_subset = ArraySubset {
                start,
                shape: self.chunk_shape.clone(),
            };
            (chunk_indices, chunk_subset)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ChunksIterator {}

impl FusedIterator for ChunksIterator {}
