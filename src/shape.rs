//! Array shapes.
//!
//! A shape is an ordered list of dimension lengths. An empty shape describes a scalar with a single element.
//! A *max shape* accompanies the shape of a growable array and bounds each axis, where [`UNLIMITED`] marks an axis without a bound.

use itertools::izip;
use thiserror::Error;

use crate::array_subset::IncompatibleDimensionalityError;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The maximum shape of a growable array. See [`UNLIMITED`].
pub type MaxShape = Vec<u64>;

/// The max shape sentinel of an axis that can grow without bound.
pub const UNLIMITED: u64 = u64::MAX;

/// Returns true if `max_length` is the [`UNLIMITED`] sentinel.
#[must_use]
pub const fn is_unlimited(max_length: u64) -> bool {
    max_length == UNLIMITED
}

/// A shape error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// Shapes have different dimensionality.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// An axis exceeds its maximum length.
    #[error("shape {0:?} exceeds max shape {1:?}")]
    ExceedsMaxShape(ArrayShape, MaxShape),
    /// Shapes hold a different number of elements.
    #[error("cannot reshape {0:?} to {1:?}")]
    InvalidReshape(ArrayShape, ArrayShape),
}

/// Return the number of elements of `shape`. A scalar (empty shape) has one element.
#[must_use]
pub fn num_elements(shape: &[u64]) -> u64 {
    shape.iter().product()
}

/// Returns true if `shape` describes a scalar.
#[must_use]
pub fn is_scalar(shape: &[u64]) -> bool {
    shape.is_empty()
}

/// Remove every unit dimension of `shape`.
#[must_use]
pub fn squeeze(shape: &[u64]) -> ArrayShape {
    shape.iter().copied().filter(|&length| length != 1).collect()
}

/// Remove leading and trailing unit dimensions of `shape`.
#[must_use]
pub fn squeeze_ends(shape: &[u64]) -> ArrayShape {
    let first = shape.iter().position(|&length| length != 1);
    let last = shape.iter().rposition(|&length| length != 1);
    match (first, last) {
        (Some(first), Some(last)) => shape[first..=last].to_vec(),
        _ => ArrayShape::new(),
    }
}

/// Returns true if `from` can be reshaped to `to` (both hold the same number of elements).
#[must_use]
pub fn reshape_is_compatible(from: &[u64], to: &[u64]) -> bool {
    num_elements(from) == num_elements(to)
}

/// Returns true if `from` and `to` differ only by the insertion or removal of unit dimensions.
#[must_use]
pub fn is_unit_reshape(from: &[u64], to: &[u64]) -> bool {
    squeeze(from) == squeeze(to)
}

/// Map the axes of `to` onto the axes of `from`, for shapes that differ only by unit dimensions.
///
/// Entry `i` of the result is the axis of `from` that holds the non-unit axis `i` of `to`, or [`None`] if axis `i` of `to` is a unit dimension.
///
/// # Errors
/// Returns [`ShapeError::InvalidReshape`] if the shapes differ by more than unit dimensions.
pub fn unit_reshape_axes(from: &[u64], to: &[u64]) -> Result<Vec<Option<usize>>, ShapeError> {
    if !is_unit_reshape(from, to) {
        return Err(ShapeError::InvalidReshape(from.to_vec(), to.to_vec()));
    }
    let mut from_axes = from
        .iter()
        .enumerate()
        .filter(|(_, &length)| length != 1)
        .map(|(axis, _)| axis);
    Ok(to
        .iter()
        .map(|&length| if length == 1 { None } else { from_axes.next() })
        .collect())
}

/// Validate that `shape` lies within `max_shape`.
///
/// # Errors
/// Returns a [`ShapeError`] if the dimensionality differs or any axis exceeds its bound.
pub fn validate_max_shape(shape: &[u64], max_shape: &[u64]) -> Result<(), ShapeError> {
    if shape.len() != max_shape.len() {
        return Err(IncompatibleDimensionalityError::new(max_shape.len(), shape.len()).into());
    }
    if std::iter::zip(shape, max_shape).all(|(&length, &max)| is_unlimited(max) || length <= max) {
        Ok(())
    } else {
        Err(ShapeError::ExceedsMaxShape(shape.to_vec(), max_shape.to_vec()))
    }
}

/// Grow `current` towards `candidate` without shrinking any axis or exceeding `max_shape`.
#[must_use]
pub fn grow_shape(current: &[u64], candidate: &[u64], max_shape: &[u64]) -> ArrayShape {
    izip!(current, candidate, max_shape)
        .map(|(&current, &candidate, &max)| {
            let grown = current.max(candidate);
            if is_unlimited(max) {
                grown
            } else {
                grown.min(max.max(current))
            }
        })
        .collect()
}

/// Convert ND `indices` of an array with `shape` into a linearised (row-major) index.
#[must_use]
pub fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

/// Convert a linearised (row-major) `index` into ND indices of an array with `shape`.
#[must_use]
pub fn unravel_index(mut index: u64, shape: &[u64]) -> Vec<u64> {
    let mut indices = vec![0; shape.len()];
    for (i, &s) in std::iter::zip(indices.iter_mut(), shape).rev() {
        if s > 0 {
            *i = index % s;
            index /= s;
        }
    }
    indices
}

/// Return the row-major strides (in elements) of `shape`.
#[must_use]
pub fn strides(shape: &[u64]) -> Vec<u64> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_unravel_index() {
        let shape = [2, 3, 4];
        for index in 0..24 {
            assert_eq!(ravel_indices(&unravel_index(index, &shape), &shape), index);
        }
        assert_eq!(unravel_index(23, &shape), vec![1, 2, 3]);
        assert_eq!(unravel_index(0, &[]), Vec::<u64>::new());
    }

    #[test]
    fn shape_squeeze() {
        assert_eq!(squeeze(&[1, 20, 1, 5, 1]), vec![20, 5]);
        assert_eq!(squeeze_ends(&[1, 20, 1, 5, 1]), vec![20, 1, 5]);
        assert_eq!(squeeze(&[1, 1]), Vec::<u64>::new());
        assert_eq!(num_elements(&[]), 1);
        assert_eq!(num_elements(&[3, 0]), 0);
    }

    #[test]
    fn shape_unit_reshape_axes() {
        assert_eq!(
            unit_reshape_axes(&[1, 20, 5, 1], &[20, 1, 5]).unwrap(),
            vec![Some(1), None, Some(2)]
        );
        assert!(unit_reshape_axes(&[4, 5], &[5, 4]).is_err());
        assert!(reshape_is_compatible(&[4, 5], &[5, 4]));
    }

    #[test]
    fn shape_max_shape() {
        assert!(validate_max_shape(&[3, 4], &[UNLIMITED, 4]).is_ok());
        assert!(validate_max_shape(&[3, 5], &[UNLIMITED, 4]).is_err());
        assert!(validate_max_shape(&[3], &[UNLIMITED, 4]).is_err());
        assert_eq!(grow_shape(&[3, 4], &[2, 9], &[UNLIMITED, 6]), vec![3, 6]);
    }

    #[test]
    fn shape_ravel() {
        assert_eq!(ravel_indices(&[1, 2], &[4, 5]), 7);
        assert_eq!(strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(strides(&[]), Vec::<u64>::new());
    }
}
