use std::any::Any;

use crate::{
    metadata::{Metadata, MetadataKind},
    shape::ArrayShape,
    slice::SliceND,
};

/// Where a view produced by a [`SliceViewIterator`](super::SliceViewIterator) came from.
///
/// Attached to each view as metadata. It is not axis-aware and is not adjusted when the view is sliced further.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceInfo {
    slice_in_current_iteration: SliceND,
    slice_in_output_space: SliceND,
    sampling_region: SliceND,
    data_axes: Vec<usize>,
    total: i64,
    current_index: u64,
}

impl SliceInfo {
    /// The metadata kind.
    pub const KIND: MetadataKind = MetadataKind::new("slice_info");

    /// Create slice provenance.
    #[must_use]
    pub fn new(
        slice_in_current_iteration: SliceND,
        slice_in_output_space: SliceND,
        sampling_region: SliceND,
        data_axes: Vec<usize>,
        total: i64,
        current_index: u64,
    ) -> Self {
        Self {
            slice_in_current_iteration,
            slice_in_output_space,
            sampling_region,
            data_axes,
            total,
            current_index,
        }
    }

    /// Return the slice of the source that produced the view.
    #[must_use]
    pub fn slice_in_current_iteration(&self) -> &SliceND {
        &self.slice_in_current_iteration
    }

    /// Return where the view lands in the output space, an array of the shape of the sampling region.
    #[must_use]
    pub fn slice_in_output_space(&self) -> &SliceND {
        &self.slice_in_output_space
    }

    /// Return the region of the source being iterated.
    #[must_use]
    pub fn sampling_region(&self) -> &SliceND {
        &self.sampling_region
    }

    /// Return the shape of the output space.
    #[must_use]
    pub fn output_shape(&self) -> ArrayShape {
        self.sampling_region.shape()
    }

    /// Return the axes kept whole in each view.
    #[must_use]
    pub fn data_axes(&self) -> &[usize] {
        &self.data_axes
    }

    /// Return the total number of views, or `-1` if the source may still grow.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Return the zero based position of the view in the iteration.
    #[must_use]
    pub fn current_index(&self) -> u64 {
        self.current_index
    }

    /// Returns true if this is known to be the final view.
    #[must_use]
    pub fn is_last(&self) -> bool {
        u64::try_from(self.total).is_ok_and(|total| self.current_index + 1 == total)
    }
}

impl Metadata for SliceInfo {
    fn kind(&self) -> MetadataKind {
        Self::KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
