use super::data_type::DataType;

/// A Rust type that can be stored as the element of an array with a matching [`DataType`].
///
/// Elements are stored in native endianness.
pub trait Element: Copy + Send + Sync + std::fmt::Debug + 'static {
    /// The data type corresponding to this element type.
    const DATA_TYPE: DataType;

    /// Convert elements to their byte representation.
    fn into_bytes(elements: &[Self]) -> Vec<u8>;

    /// Convert bytes to elements.
    ///
    /// The length of `bytes` must be a multiple of the element size.
    fn from_bytes(bytes: &[u8]) -> Vec<Self>;
}

impl Element for bool {
    const DATA_TYPE: DataType = DataType::Bool;

    fn into_bytes(elements: &[Self]) -> Vec<u8> {
        elements.iter().map(|&element| u8::from(element)).collect()
    }

    fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes.iter().map(|&byte| byte != 0).collect()
    }
}

macro_rules! impl_element_pod {
    ($type:ty, $data_type:expr) => {
        impl Element for $type {
            const DATA_TYPE: DataType = $data_type;

            fn into_bytes(elements: &[Self]) -> Vec<u8> {
                bytemuck::cast_slice(elements).to_vec()
            }

            fn from_bytes(bytes: &[u8]) -> Vec<Self> {
                bytemuck::pod_collect_to_vec(bytes)
            }
        }
    };
}

impl_element_pod!(i8, DataType::Int8);
impl_element_pod!(i16, DataType::Int16);
impl_element_pod!(i32, DataType::Int32);
impl_element_pod!(i64, DataType::Int64);
impl_element_pod!(u8, DataType::UInt8);
impl_element_pod!(u16, DataType::UInt16);
impl_element_pod!(u32, DataType::UInt32);
impl_element_pod!(u64, DataType::UInt64);
impl_element_pod!(f32, DataType::Float32);
impl_element_pod!(f64, DataType::Float64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_bytes() {
        let bytes = u16::into_bytes(&[1, 256]);
        assert_eq!(bytes.len(), 4);
        assert_eq!(u16::from_bytes(&bytes), vec![1, 256]);
        assert_eq!(bool::from_bytes(&[0, 2, 1]), vec![false, true, true]);
        assert_eq!(f64::from_bytes(&f64::into_bytes(&[1.5])), vec![1.5]);
        assert_eq!(<i32 as Element>::DATA_TYPE, DataType::Int32);
    }
}
