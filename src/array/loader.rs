use std::{error::Error, fmt::Debug};

use thiserror::Error;

use crate::{shape::ArrayShape, slice::SliceND};

use super::{ArrayError, RealizedArray};

type BoxedError = Box<dyn Error + Send + Sync>;

/// A loader error.
///
/// Wraps the failure of an [`ArrayLoader`].
#[derive(Debug, Error)]
#[error("failed to load array data: {cause}")]
pub struct LoadError {
    #[source]
    cause: BoxedError,
}

impl LoadError {
    /// Create a new loader error from its `cause`.
    pub fn new(cause: impl Into<BoxedError>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// Return the cause of the error.
    #[must_use]
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

/// A writer error.
///
/// Wraps the failure of an [`ArrayWriter`](super::ArrayWriter).
#[derive(Debug, Error)]
#[error("failed to write array data: {cause}")]
pub struct WriteError {
    #[source]
    cause: BoxedError,
}

impl WriteError {
    /// Create a new writer error from its `cause`.
    pub fn new(cause: impl Into<BoxedError>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// Return the cause of the error.
    #[must_use]
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

/// Loads realized blocks of array data.
///
/// A loader is shared between a lazy array and all of its views and clones, so it must be safe to call [`load`](ArrayLoader::load) concurrently.
pub trait ArrayLoader: Send + Sync + Debug {
    /// Load the block selected by `slice`.
    ///
    /// `slice` is fully resolved against the shape of the loader, and the returned array must hold `slice.num_elements()` items.
    ///
    /// # Errors
    /// Returns a [`LoadError`] if the block cannot be loaded.
    fn load(&self, slice: &SliceND) -> Result<RealizedArray, LoadError>;
}

/// A loader over an in-memory [`RealizedArray`].
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    array: RealizedArray,
}

impl MemoryLoader {
    /// Create a new memory loader.
    #[must_use]
    pub fn new(array: RealizedArray) -> Self {
        Self { array }
    }

    /// Return the shape of the backing array.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        self.array.shape()
    }
}

impl ArrayLoader for MemoryLoader {
    fn load(&self, slice: &SliceND) -> Result<RealizedArray, LoadError> {
        self.array.slice(slice).map_err(LoadError::new)
    }
}

type LoadFn = dyn Fn(&SliceND) -> Result<RealizedArray, LoadError> + Send + Sync;

/// A loader calling a closure.
pub struct FnLoader {
    shape: ArrayShape,
    load_fn: Box<LoadFn>,
}

impl FnLoader {
    /// Create a new closure loader for an array of `shape`.
    pub fn new<F>(shape: ArrayShape, load_fn: F) -> Self
    where
        F: Fn(&SliceND) -> Result<RealizedArray, LoadError> + Send + Sync + 'static,
    {
        Self {
            shape,
            load_fn: Box::new(load_fn),
        }
    }
}

impl Debug for FnLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnLoader")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl ArrayLoader for FnLoader {
    fn load(&self, slice: &SliceND) -> Result<RealizedArray, LoadError> {
        (self.load_fn)(slice)
    }
}

impl From<ArrayError> for LoadError {
    fn from(err: ArrayError) -> Self {
        match err {
            ArrayError::Load(err) => err,
            err => Self::new(err),
        }
    }
}
