//! Fill values.

use serde::{Deserialize, Serialize};

use super::{data_type::DataType, element::Element};

/// The fill value of a dataset.
///
/// Provides an element value to use for unwritten portions of a dataset.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

macro_rules! impl_fill_value_from {
    ($($type:ty),*) => {
        $(
            impl From<$type> for FillValue {
                fn from(value: $type) -> Self {
                    Self(<$type as Element>::into_bytes(&[value]))
                }
            }
        )*
    };
}

impl_fill_value_from!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl FillValue {
    /// Create a new fill value composed of `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The zero fill value of `data_type`.
    #[must_use]
    pub fn zero(data_type: DataType) -> Self {
        Self(vec![0; data_type.size()])
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the byte representation of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if the bytes are equal to a sequence of the fill value.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        if self.0.is_empty() {
            return bytes.is_empty();
        }
        bytes.len() % self.0.len() == 0
            && bytes.chunks_exact(self.0.len()).all(|element| element == self.0.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_value() {
        let fill_value = FillValue::from(-1i16);
        assert_eq!(fill_value.size(), 2);
        assert!(fill_value.equals_all(&i16::into_bytes(&[-1, -1, -1])));
        assert!(!fill_value.equals_all(&i16::into_bytes(&[-1, 0])));
        assert_eq!(FillValue::zero(DataType::Float64).as_ne_bytes(), &[0; 8]);
        assert_eq!(FillValue::from(true).as_ne_bytes(), &[1]);
    }
}
