use std::str::FromStr;

use thiserror::Error;

use super::{Slice, SliceError};

/// An unresolved slice along one axis, with optional `start`, `stop` and `step`.
///
/// Descriptors parse from and display as Python-style slice text, e.g. `"1:7:2"`, `"::-1"`, or `"3"` for a single index.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SliceDescriptor {
    /// The start index.
    pub start: Option<i64>,
    /// The stop index (exclusive).
    pub stop: Option<i64>,
    /// The step.
    pub step: Option<i64>,
}

/// A slice descriptor parse error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid slice descriptor {0:?}")]
pub struct SliceDescriptorParseError(String);

impl SliceDescriptor {
    /// Create a new slice descriptor.
    #[must_use]
    pub const fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// A descriptor selecting the whole axis.
    #[must_use]
    pub const fn all() -> Self {
        Self::new(None, None, None)
    }

    /// A descriptor selecting `start..stop`.
    #[must_use]
    pub const fn range(start: i64, stop: i64) -> Self {
        Self::new(Some(start), Some(stop), None)
    }

    /// A descriptor selecting the single element at `index` (negative indices count from the end).
    #[must_use]
    pub const fn index(index: i64) -> Self {
        if index == -1 {
            Self::new(Some(index), None, None)
        } else {
            Self::new(Some(index), Some(index + 1), None)
        }
    }

    /// Resolve against an axis of length `length`.
    ///
    /// # Errors
    /// Returns [`SliceError::InvalidStep`] if the step is zero.
    pub fn resolve(&self, length: u64) -> Result<Slice, SliceError> {
        Slice::resolve(length, self.start, self.stop, self.step)
    }
}

impl FromStr for SliceDescriptor {
    type Err = SliceDescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SliceDescriptorParseError(s.to_string());
        let parse = |component: &str| -> Result<Option<i64>, SliceDescriptorParseError> {
            let component = component.trim();
            if component.is_empty() {
                Ok(None)
            } else {
                component.parse().map(Some).map_err(|_| err())
            }
        };
        let components: Vec<&str> = s.split(':').collect();
        match components.as_slice() {
            [index] => match parse(index)? {
                Some(index) => Ok(Self::index(index)),
                None => Ok(Self::all()),
            },
            [start, stop] => Ok(Self::new(parse(start)?, parse(stop)?, None)),
            [start, stop, step] => Ok(Self::new(parse(start)?, parse(stop)?, parse(step)?)),
            _ => Err(err()),
        }
    }
}

impl std::fmt::Display for SliceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_opt = |value: Option<i64>| value.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{}:{}", fmt_opt(self.start), fmt_opt(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}

/// Parse a comma separated list of slice descriptors, e.g. `"0:2, ::-1, 5"`.
///
/// # Errors
/// Returns [`SliceDescriptorParseError`] if any component is invalid.
pub fn parse_slices(s: &str) -> Result<Vec<SliceDescriptor>, SliceDescriptorParseError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_descriptor_parse() {
        assert_eq!("1:7:2".parse(), Ok(SliceDescriptor::new(Some(1), Some(7), Some(2))));
        assert_eq!("::-1".parse(), Ok(SliceDescriptor::new(None, None, Some(-1))));
        assert_eq!(":".parse(), Ok(SliceDescriptor::all()));
        assert_eq!("3".parse(), Ok(SliceDescriptor::range(3, 4)));
        assert_eq!("-1".parse(), Ok(SliceDescriptor::new(Some(-1), None, None)));
        assert!("a:b".parse::<SliceDescriptor>().is_err());
        assert!("1:2:3:4".parse::<SliceDescriptor>().is_err());
    }

    #[test]
    fn slice_descriptor_display() {
        assert_eq!(SliceDescriptor::new(None, Some(-6), Some(-2)).to_string(), ":-6:-2");
        assert_eq!(SliceDescriptor::range(1, 4).to_string(), "1:4");
    }

    #[test]
    fn slice_descriptor_parse_list() {
        let descriptors = parse_slices("0:2, ::-1, 5").unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[2].resolve(10).unwrap().count(), 1);
        assert_eq!(descriptors[1].resolve(10).unwrap().start(), 9);
        assert!(parse_slices("").unwrap().is_empty());
    }
}
