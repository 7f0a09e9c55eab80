use std::any::Any;

use crate::{
    array::{ArrayError, LazyArray},
    array_subset::IncompatibleDimensionalityError,
    shape::{self, ArrayShape},
    slice::{Slice, SliceND},
};

use super::{Metadata, MetadataKind};

/// Companion arrays labelling each axis of an array.
///
/// Each axis holds a list of lazy arrays. A companion array is either 1-D with the length of its axis, or has the rank of the owner with every other axis either matching the owner or of length 1.
#[derive(Clone, Debug)]
pub struct AxesMetadata {
    shape: ArrayShape,
    axes: Vec<Vec<LazyArray>>,
}

impl AxesMetadata {
    /// The metadata kind.
    pub const KIND: MetadataKind = MetadataKind::new("axes");

    /// Create empty axes metadata for an owner of `shape`.
    #[must_use]
    pub fn new(shape: &[u64]) -> Self {
        Self {
            shape: shape.to_vec(),
            axes: vec![Vec::new(); shape.len()],
        }
    }

    /// Return the owner shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Return the companion arrays of `axis`.
    #[must_use]
    pub fn axis(&self, axis: usize) -> &[LazyArray] {
        self.axes.get(axis).map_or(&[], Vec::as_slice)
    }

    /// Add a companion `array` to `axis`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `axis` is out of bounds or `array` does not fit the axis.
    pub fn add_axis(&mut self, axis: usize, array: LazyArray) -> Result<(), ArrayError> {
        self.validate(axis, &array)?;
        self.axes[axis].push(array);
        Ok(())
    }

    /// Replace the companion arrays of `axis`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `axis` is out of bounds or an array does not fit the axis.
    pub fn set_axis(&mut self, axis: usize, arrays: Vec<LazyArray>) -> Result<(), ArrayError> {
        for array in &arrays {
            self.validate(axis, array)?;
        }
        self.axes[axis] = arrays;
        Ok(())
    }

    /// Builder style [`add_axis`](Self::add_axis).
    ///
    /// # Errors
    /// See [`add_axis`](Self::add_axis).
    pub fn with_axis(mut self, axis: usize, array: LazyArray) -> Result<Self, ArrayError> {
        self.add_axis(axis, array)?;
        Ok(self)
    }

    fn validate(&self, axis: usize, array: &LazyArray) -> Result<(), ArrayError> {
        let Some(&length) = self.shape.get(axis) else {
            return Err(IncompatibleDimensionalityError::new(axis, self.rank()).into());
        };
        let fits = if array.rank() == 1 {
            array.shape()[0] == length
        } else {
            array.rank() == self.rank()
                && array.shape()[axis] == length
                && std::iter::zip(array.shape(), &self.shape)
                    .all(|(&companion, &owner)| companion == owner || companion == 1)
        };
        if fits {
            Ok(())
        } else {
            Err(ArrayError::ShapeMismatch {
                expected: self.shape.clone(),
                got: array.shape().to_vec(),
            })
        }
    }
}

fn slice_companion(array: &LazyArray, axis: usize, slice: &SliceND) -> Result<LazyArray, ArrayError> {
    let slices: Vec<Slice> = if array.rank() == 1 {
        vec![slice.slices()[axis]]
    } else {
        std::iter::zip(array.shape(), slice.slices())
            .zip(slice.source_shape())
            .map(|((&companion, &slice), &owner)| {
                if companion == owner {
                    slice
                } else {
                    Slice::full(companion)
                }
            })
            .collect()
    };
    array.slice_view(&SliceND::from_slices(array.shape().to_vec(), slices)?)
}

impl Metadata for AxesMetadata {
    fn kind(&self) -> MetadataKind {
        Self::KIND
    }

    fn is_axis_aware(&self) -> bool {
        true
    }

    fn sliced(&self, slice: &SliceND) -> Result<Option<Box<dyn Metadata>>, ArrayError> {
        if slice.source_shape() != self.shape.as_slice() {
            return Err(ArrayError::ShapeMismatch {
                expected: self.shape.clone(),
                got: slice.source_shape().to_vec(),
            });
        }
        let axes = self
            .axes
            .iter()
            .enumerate()
            .map(|(axis, arrays)| {
                arrays
                    .iter()
                    .map(|array| slice_companion(array, axis, slice))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Box::new(Self {
            shape: slice.shape(),
            axes,
        })))
    }

    fn reshaped(
        &self,
        old_shape: &[u64],
        new_shape: &[u64],
    ) -> Result<Option<Box<dyn Metadata>>, ArrayError> {
        let axis_map = shape::unit_reshape_axes(old_shape, new_shape)?;
        let axes = axis_map
            .iter()
            .map(|old_axis| {
                let Some(old_axis) = *old_axis else {
                    return Ok(Vec::new());
                };
                self.axes[old_axis]
                    .iter()
                    .map(|array| {
                        if array.rank() == 1 {
                            Ok(array.clone())
                        } else {
                            let companion_shape = axis_map
                                .iter()
                                .map(|axis| axis.map_or(1, |axis| array.shape()[axis]))
                                .collect();
                            array.reshape(companion_shape)
                        }
                    })
                    .collect::<Result<Vec<_>, ArrayError>>()
            })
            .collect::<Result<Vec<_>, ArrayError>>()?;
        Ok(Some(Box::new(Self {
            shape: new_shape.to_vec(),
            axes,
        })))
    }

    fn resized(&self, old_shape: &[u64], new_shape: &[u64]) -> Option<Box<dyn Metadata>> {
        let mut grown = Self::new(new_shape);
        for (axis, arrays) in self.axes.iter().enumerate() {
            for array in arrays {
                if grown.validate(axis, array).is_ok() {
                    grown.axes[axis].push(array.clone());
                } else {
                    tracing::debug!(
                        axis,
                        companion = array.name(),
                        from = ?old_shape,
                        to = ?new_shape,
                        "dropped companion array that no longer fits its grown axis"
                    );
                }
            }
        }
        Some(Box::new(grown))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::RealizedArray;

    fn axis_array(values: &[f64]) -> LazyArray {
        LazyArray::from(RealizedArray::from_elements(vec![values.len() as u64], values).unwrap())
    }

    #[test]
    fn axes_metadata_slice() {
        let metadata = AxesMetadata::new(&[3, 4])
            .with_axis(1, axis_array(&[0.0, 0.5, 1.0, 1.5]))
            .unwrap();
        assert!(AxesMetadata::new(&[3, 4])
            .with_axis(0, axis_array(&[0.0]))
            .is_err());
        let slice = SliceND::resolve(&[3, 4], None, None, Some(&[1, -2])).unwrap();
        let sliced = metadata.sliced(&slice).unwrap().unwrap();
        let sliced = sliced.as_any().downcast_ref::<AxesMetadata>().unwrap();
        assert_eq!(sliced.shape(), &[3, 2]);
        let values = sliced.axis(1)[0]
            .slice(&SliceND::full(&[2]))
            .unwrap()
            .to_elements::<f64>()
            .unwrap();
        assert_eq!(values, vec![1.5, 0.5]);
        assert!(sliced.axis(0).is_empty());
    }

    #[test]
    fn axes_metadata_resize() {
        let metadata = AxesMetadata::new(&[2, 3])
            .with_axis(0, axis_array(&[0.0, 1.0]))
            .unwrap()
            .with_axis(1, axis_array(&[0.0, 0.5, 1.0]))
            .unwrap();
        let resized = metadata.resized(&[2, 3], &[5, 3]).unwrap();
        let resized = resized.as_any().downcast_ref::<AxesMetadata>().unwrap();
        assert_eq!(resized.shape(), &[5, 3]);
        assert!(resized.axis(0).is_empty());
        assert_eq!(resized.axis(1).len(), 1);
        let slice = SliceND::resolve(&[5, 3], Some(&[4, 0]), None, None).unwrap();
        assert!(resized.sliced(&slice).is_ok());
    }

    #[test]
    fn axes_metadata_reshape() {
        let metadata = AxesMetadata::new(&[1, 4])
            .with_axis(1, axis_array(&[0.0, 0.5, 1.0, 1.5]))
            .unwrap();
        let reshaped = metadata.reshaped(&[1, 4], &[4]).unwrap().unwrap();
        let reshaped = reshaped.as_any().downcast_ref::<AxesMetadata>().unwrap();
        assert_eq!(reshaped.rank(), 1);
        assert_eq!(reshaped.axis(0).len(), 1);
    }
}
