//! Slice arithmetic.
//!
//! A [`Slice`] is a normalised `(start, stop, step, count)` selection along a single axis of known length.
//! Unresolved selections are described with a [`SliceDescriptor`] whose components are all optional, and an N-dimensional selection is a [`SliceND`].
//!
//! Resolution follows Python slicing semantics:
//!  - `step` defaults to 1 and must be non-zero,
//!  - negative `start`/`stop` values are offsets from the axis length,
//!  - out-of-range values are clamped, never rejected.
//!
//! ```rust
//! # use nxlazy::slice::Slice;
//! let slice = Slice::resolve(7, None, Some(-6), Some(-2))?;
//! assert_eq!((slice.start(), slice.stop(), slice.count()), (6, 1, 3));
//! # Ok::<(), nxlazy::slice::SliceError>(())
//! ```

mod slice_descriptor;
mod slice_nd;

pub use slice_descriptor::{parse_slices, SliceDescriptor, SliceDescriptorParseError};
pub use slice_nd::SliceND;

use thiserror::Error;

use crate::array_subset::IncompatibleDimensionalityError;

/// A resolved slice along one axis.
///
/// `stop` is exclusive. For negative steps a `stop` of `-1` means "through index 0".
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Slice {
    start: i64,
    stop: i64,
    step: i64,
    count: u64,
}

/// A slice error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SliceError {
    /// A step of zero was requested.
    #[error("slice step cannot be zero")]
    InvalidStep,
    /// The number of slices does not match the array dimensionality.
    #[error(transparent)]
    ShapeMismatch(#[from] IncompatibleDimensionalityError),
    /// Slice text could not be parsed.
    #[error(transparent)]
    Parse(#[from] SliceDescriptorParseError),
}

impl Slice {
    /// Resolve an optional `start`, `stop` and `step` against an axis of length `length`.
    ///
    /// # Errors
    /// Returns [`SliceError::InvalidStep`] if `step` is zero.
    pub fn resolve(
        length: u64,
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    ) -> Result<Self, SliceError> {
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(SliceError::InvalidStep);
        }
        let n = i64::try_from(length).unwrap_or(i64::MAX);
        let (lower, upper) = if step > 0 { (0, n) } else { (-1, n - 1) };
        let clamp = |value: i64| {
            let value = if value < 0 {
                value.saturating_add(n)
            } else {
                value
            };
            value.clamp(lower, upper)
        };
        let start = start.map_or(if step > 0 { 0 } else { n - 1 }, clamp);
        let stop = stop.map_or(if step > 0 { n } else { -1 }, clamp);
        Ok(Self::from_bounds(start, stop, step))
    }

    /// The slice selecting every element of an axis of length `length`.
    #[must_use]
    pub fn full(length: u64) -> Self {
        let n = i64::try_from(length).unwrap_or(i64::MAX);
        Self::from_bounds(0, n, 1)
    }

    /// The slice selecting the single element at `index`.
    #[must_use]
    pub fn single(index: u64) -> Self {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        Self::from_bounds(index, index.saturating_add(1), 1)
    }

    /// Create a slice from already normalised bounds, computing the element count.
    fn from_bounds(start: i64, stop: i64, step: i64) -> Self {
        let count = count_elements(start, stop, step);
        Self {
            start,
            stop,
            step,
            count,
        }
    }

    /// Return the (inclusive) start index.
    #[must_use]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// Return the (exclusive) stop index.
    #[must_use]
    pub const fn stop(&self) -> i64 {
        self.stop
    }

    /// Return the step.
    #[must_use]
    pub const fn step(&self) -> i64 {
        self.step
    }

    /// Return the number of selected elements.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Returns true if the slice selects no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Return the source index of the `i`-th selected element.
    ///
    /// The result is only meaningful for `i < self.count()`.
    #[must_use]
    pub fn index(&self, i: u64) -> u64 {
        let i = i64::try_from(i).unwrap_or(i64::MAX);
        u64::try_from(self.start + i * self.step).unwrap_or_default()
    }

    /// Return the smallest and largest selected source indices, or [`None`] for an empty slice.
    #[must_use]
    pub fn bounds(&self) -> Option<(u64, u64)> {
        if self.count == 0 {
            None
        } else {
            let first = self.index(0);
            let last = self.index(self.count - 1);
            Some((first.min(last), first.max(last)))
        }
    }

    /// Returns true if this slice selects all of an axis of length `length` in order.
    #[must_use]
    pub fn is_full(&self, length: u64) -> bool {
        self.step == 1 && self.start == 0 && self.count == length
    }

    /// Return the slice equivalent to applying `inner` to the elements selected by `self`.
    ///
    /// `inner` must be resolved against an axis of length `self.count()`, and `length` is the source axis length of `self`.
    #[must_use]
    pub fn compose(&self, inner: &Self, length: u64) -> Self {
        let n = i64::try_from(length).unwrap_or(i64::MAX);
        let step = self.step * inner.step;
        let (lower, upper) = if step > 0 { (0, n) } else { (-1, n - 1) };
        if inner.count == 0 {
            let start = self.start.clamp(lower, upper);
            return Self::from_bounds(start, start, step);
        }
        let start = self.start + inner.start * self.step;
        let count = i64::try_from(inner.count).unwrap_or(i64::MAX);
        let stop = (start + count * step).clamp(lower, upper);
        let composed = Self::from_bounds(start, stop, step);
        debug_assert_eq!(composed.count, inner.count);
        composed
    }

    /// Shift the slice by `-offset`, re-targeting it to an axis of length `length`.
    ///
    /// `offset` must not exceed the smallest selected index.
    #[must_use]
    pub(crate) fn shifted(&self, offset: u64, length: u64) -> Self {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let n = i64::try_from(length).unwrap_or(i64::MAX);
        if self.count == 0 {
            return Self::from_bounds(0, 0, self.step);
        }
        let start = self.start - offset;
        let (lower, upper) = if self.step > 0 { (0, n) } else { (-1, n - 1) };
        let stop = (self.stop - offset).clamp(lower, upper);
        Self::from_bounds(start, stop, self.step)
    }
}

impl std::fmt::Display for Slice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.stop < 0 {
            write!(f, "{}::{}", self.start, self.step)
        } else {
            write!(f, "{}:{}:{}", self.start, self.stop, self.step)
        }
    }
}

/// `max(0, ceil((stop - start) / step))`.
fn count_elements(start: i64, stop: i64, step: i64) -> u64 {
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let count = if step > 0 && stop > start {
        (stop - start + step - 1) / step
    } else if step < 0 && start > stop {
        (start - stop - step - 1) / -step
    } else {
        0
    };
    u64::try_from(count).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(n: u64, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> (i64, i64, u64) {
        let slice = Slice::resolve(n, start, stop, step).unwrap();
        (slice.start(), slice.stop(), slice.count())
    }

    #[test]
    fn slice_defaults() {
        assert_eq!(resolved(7, None, None, None), (0, 7, 7));
        assert_eq!(resolved(7, None, None, Some(-1)), (6, -1, 7));
        assert_eq!(resolved(0, None, None, None), (0, 0, 0));
        assert_eq!(resolved(0, None, None, Some(-1)), (-1, -1, 0));
    }

    #[test]
    fn slice_invalid_step() {
        assert_eq!(
            Slice::resolve(7, None, None, Some(0)),
            Err(SliceError::InvalidStep)
        );
    }

    #[test]
    fn slice_clamping() {
        // start -8 clamps to 0, so the count is ceil(7 / 1) = 7, not 4
        assert_eq!(resolved(7, Some(-8), None, Some(1)), (0, 7, 7));
        assert_eq!(resolved(7, Some(-8), None, Some(2)), (0, 7, 4));
        assert_eq!(resolved(7, Some(8), None, Some(1)), (7, 7, 0));
        assert_eq!(resolved(7, Some(3), Some(100), None), (3, 7, 4));
        assert_eq!(resolved(7, Some(100), None, Some(-1)), (6, -1, 7));
        assert_eq!(resolved(7, None, Some(-100), Some(-1)), (6, -1, 7));
    }

    #[test]
    fn slice_negative_step() {
        assert_eq!(resolved(7, None, Some(-6), Some(-2)), (6, 1, 3));
        assert_eq!(resolved(7, Some(-1), None, Some(-3)), (6, -1, 3));
        assert_eq!(resolved(7, Some(2), Some(5), Some(-1)), (2, 5, 0));
        let slice = Slice::resolve(7, None, Some(-6), Some(-2)).unwrap();
        assert_eq!(
            (0..slice.count()).map(|i| slice.index(i)).collect::<Vec<_>>(),
            vec![6, 4, 2]
        );
        assert_eq!(slice.bounds(), Some((2, 6)));
    }

    #[test]
    fn slice_count_matches_ceil() {
        for n in 0..20u64 {
            for step in 1..6i64 {
                let expected = n.div_ceil(step.unsigned_abs());
                assert_eq!(Slice::resolve(n, None, None, Some(step)).unwrap().count(), expected);
                assert_eq!(Slice::resolve(n, None, None, Some(-step)).unwrap().count(), expected);
            }
        }
    }

    #[test]
    fn slice_compose() {
        let outer = Slice::resolve(10, Some(1), Some(9), Some(2)).unwrap(); // 1 3 5 7
        let inner = Slice::resolve(outer.count(), None, None, Some(-1)).unwrap(); // 7 5 3 1
        let composed = outer.compose(&inner, 10);
        assert_eq!(
            (0..composed.count()).map(|i| composed.index(i)).collect::<Vec<_>>(),
            vec![7, 5, 3, 1]
        );
        let empty = Slice::resolve(outer.count(), Some(3), Some(3), None).unwrap();
        assert!(outer.compose(&empty, 10).is_empty());
    }

    #[test]
    fn slice_display() {
        assert_eq!(Slice::resolve(7, None, None, None).unwrap().to_string(), "0:7:1");
        assert_eq!(Slice::resolve(7, None, None, Some(-2)).unwrap().to_string(), "6::-2");
    }
}
