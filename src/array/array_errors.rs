use thiserror::Error;

use crate::{
    array_subset::{ArrayExtractBytesError, ArrayStoreBytesError, IncompatibleDimensionalityError},
    shape::{ArrayShape, MaxShape, ShapeError},
    slice::{SliceDescriptorParseError, SliceError},
};

use super::{data_type::DataType, LoadError, WriteError};

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// The rank of a slice or shape does not match the array.
    #[error("shape mismatch: {0}")]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A slice or block does not match the expected shape.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: ArrayShape,
        /// The shape that was provided.
        got: ArrayShape,
    },
    /// A slice step of zero.
    #[error("slice step cannot be zero")]
    InvalidStep,
    /// Slice text could not be parsed.
    #[error(transparent)]
    InvalidSlice(#[from] SliceDescriptorParseError),
    /// A subset is out of bounds of a realized array.
    #[error(transparent)]
    InvalidArraySubset(#[from] ArrayExtractBytesError),
    /// A loader failed.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// A writer failed.
    #[error(transparent)]
    Write(#[from] WriteError),
    /// A data type or element type does not match the array.
    #[error("incompatible data type {got}, expected {expected}")]
    IncompatibleDataType {
        /// The array data type.
        expected: DataType,
        /// The provided data type.
        got: DataType,
    },
    /// The number of elements per item does not match the array.
    #[error("incompatible elements per item {got}, expected {expected}")]
    IncompatibleElementsPerItem {
        /// The array elements per item.
        expected: usize,
        /// The provided elements per item.
        got: usize,
    },
    /// An invalid reshape.
    #[error("cannot reshape {0:?} to {1:?}")]
    InvalidReshape(ArrayShape, ArrayShape),
    /// A shape exceeds the maximum shape of an array.
    #[error("shape {0:?} exceeds max shape {1:?}")]
    ExceedsMaxShape(ArrayShape, MaxShape),
    /// Invalid bytes length.
    #[error("got bytes with length {0}, expected {1}")]
    InvalidBytesLength(usize, usize),
    /// The array no longer accepts writes.
    #[error("array is read only")]
    ReadOnly,
}

impl From<SliceError> for ArrayError {
    fn from(err: SliceError) -> Self {
        match err {
            SliceError::InvalidStep => Self::InvalidStep,
            SliceError::ShapeMismatch(err) => Self::IncompatibleDimensionality(err),
            SliceError::Parse(err) => Self::InvalidSlice(err),
        }
    }
}

impl From<ShapeError> for ArrayError {
    fn from(err: ShapeError) -> Self {
        match err {
            ShapeError::IncompatibleDimensionality(err) => Self::IncompatibleDimensionality(err),
            ShapeError::ExceedsMaxShape(shape, max_shape) => Self::ExceedsMaxShape(shape, max_shape),
            ShapeError::InvalidReshape(from, to) => Self::InvalidReshape(from, to),
        }
    }
}

impl From<ArrayStoreBytesError> for ArrayError {
    fn from(err: ArrayStoreBytesError) -> Self {
        match err {
            ArrayStoreBytesError::InvalidSubsetBytes(got, expected)
            | ArrayStoreBytesError::InvalidArrayBytes(got, expected) => {
                Self::InvalidBytesLength(got, expected)
            }
            ArrayStoreBytesError::InvalidArrayShape(subset, shape) => Self::ShapeMismatch {
                expected: shape,
                got: subset.end_exc(),
            },
        }
    }
}

impl ArrayError {
    /// Returns true if this error is a shape or rank mismatch.
    #[must_use]
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleDimensionality(_) | Self::ShapeMismatch { .. }
        )
    }
}
