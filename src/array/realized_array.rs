use crate::{
    array_subset::ArraySubset,
    metadata::{Metadata, MetadataKind, MetadataMap},
    shape::{self, ArrayShape},
    slice::SliceND,
};

use super::{data_type::DataType, element::Element, fill_value::FillValue, ArrayError};

/// An in-memory block of array data.
///
/// Items are stored contiguously in row-major order, each item holding `elements_per_item` elements of the data type.
#[derive(Clone, Debug)]
pub struct RealizedArray {
    name: String,
    data_type: DataType,
    elements_per_item: usize,
    shape: ArrayShape,
    bytes: Vec<u8>,
    metadata: MetadataMap,
}

impl RealizedArray {
    /// Create a realized array from raw native-endian `bytes`.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidBytesLength`] if the length of `bytes` does not match the shape and data type.
    pub fn new(data_type: DataType, shape: ArrayShape, bytes: Vec<u8>) -> Result<Self, ArrayError> {
        Self::new_items(data_type, 1, shape, bytes)
    }

    /// Create a realized array of compound items from raw native-endian `bytes`.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidBytesLength`] if the length of `bytes` does not match the shape, data type and `elements_per_item`.
    pub fn new_items(
        data_type: DataType,
        elements_per_item: usize,
        shape: ArrayShape,
        bytes: Vec<u8>,
    ) -> Result<Self, ArrayError> {
        let elements_per_item = elements_per_item.max(1);
        let expected = expected_bytes_length(&shape, data_type.size() * elements_per_item);
        if bytes.len() as u64 != expected {
            return Err(ArrayError::InvalidBytesLength(
                bytes.len(),
                usize::try_from(expected).unwrap_or(usize::MAX),
            ));
        }
        Ok(Self {
            name: String::new(),
            data_type,
            elements_per_item,
            shape,
            bytes,
            metadata: MetadataMap::default(),
        })
    }

    /// Create a realized array from `elements`.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidBytesLength`] if the number of elements does not match `shape`.
    pub fn from_elements<T: Element>(shape: ArrayShape, elements: &[T]) -> Result<Self, ArrayError> {
        Self::new_items(T::DATA_TYPE, 1, shape, T::into_bytes(elements))
    }

    /// Create a realized array of compound items from `elements`.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidBytesLength`] if the number of elements does not match `shape` and `elements_per_item`.
    pub fn from_items<T: Element>(
        shape: ArrayShape,
        elements_per_item: usize,
        elements: &[T],
    ) -> Result<Self, ArrayError> {
        Self::new_items(T::DATA_TYPE, elements_per_item, shape, T::into_bytes(elements))
    }

    /// Create a realized array with every element set to `fill_value`.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidBytesLength`] if the size of `fill_value` does not match the data type.
    pub fn filled(
        data_type: DataType,
        elements_per_item: usize,
        shape: ArrayShape,
        fill_value: &FillValue,
    ) -> Result<Self, ArrayError> {
        if fill_value.size() != data_type.size() {
            return Err(ArrayError::InvalidBytesLength(
                fill_value.size(),
                data_type.size(),
            ));
        }
        let elements_per_item = elements_per_item.max(1);
        let num_elements = shape::num_elements(&shape) * elements_per_item as u64;
        let bytes = fill_value
            .as_ne_bytes()
            .repeat(usize::try_from(num_elements).unwrap_or(usize::MAX));
        Self::new_items(data_type, elements_per_item, shape, bytes)
    }

    /// Create a realized array of zeros.
    #[must_use]
    pub fn zeros(data_type: DataType, shape: ArrayShape) -> Self {
        let length = expected_bytes_length(&shape, data_type.size());
        Self {
            name: String::new(),
            data_type,
            elements_per_item: 1,
            shape,
            bytes: vec![0; usize::try_from(length).unwrap_or_default()],
            metadata: MetadataMap::default(),
        }
    }

    /// Create a scalar (rank 0) realized array.
    #[must_use]
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            name: String::new(),
            data_type: T::DATA_TYPE,
            elements_per_item: 1,
            shape: ArrayShape::new(),
            bytes: T::into_bytes(&[value]),
            metadata: MetadataMap::default(),
        }
    }

    /// Return the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Return the data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Return the number of elements per item.
    #[must_use]
    pub const fn elements_per_item(&self) -> usize {
        self.elements_per_item
    }

    /// Return the size in bytes of an item.
    #[must_use]
    pub const fn item_size(&self) -> usize {
        self.data_type.size() * self.elements_per_item
    }

    /// Return the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Return the number of items.
    #[must_use]
    pub fn size(&self) -> u64 {
        shape::num_elements(&self.shape)
    }

    /// Returns true if the array holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Return the underlying bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the array and return its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Return the elements.
    ///
    /// # Errors
    /// Returns [`ArrayError::IncompatibleDataType`] if `T` does not match the data type.
    pub fn to_elements<T: Element>(&self) -> Result<Vec<T>, ArrayError> {
        self.check_element::<T>()?;
        Ok(T::from_bytes(&self.bytes))
    }

    /// Return the first element of the item at `indices`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `T` does not match the data type or `indices` are out of bounds.
    pub fn get<T: Element>(&self, indices: &[u64]) -> Result<T, ArrayError> {
        self.check_element::<T>()?;
        let subset = ArraySubset::new_with_start_shape(indices.to_vec(), vec![1; indices.len()])?;
        let bytes = subset.extract_bytes(&self.bytes, &self.shape, self.item_size())?;
        T::from_bytes(&bytes[..self.data_type.size()])
            .first()
            .copied()
            .ok_or(ArrayError::InvalidBytesLength(bytes.len(), self.item_size()))
    }

    fn check_element<T: Element>(&self) -> Result<(), ArrayError> {
        if T::DATA_TYPE == self.data_type {
            Ok(())
        } else {
            Err(ArrayError::IncompatibleDataType {
                expected: self.data_type,
                got: T::DATA_TYPE,
            })
        }
    }

    /// Return the metadata.
    #[must_use]
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// Return a mutable reference to the metadata.
    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.metadata
    }

    /// Replace the metadata.
    pub fn set_metadata(&mut self, metadata: MetadataMap) {
        self.metadata = metadata;
    }

    /// Add a metadata instance.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Metadata) -> Self {
        self.metadata.add(Box::new(metadata));
        self
    }

    /// Return the first metadata instance of `kind`.
    #[must_use]
    pub fn first_metadata(&self, kind: MetadataKind) -> Option<&dyn Metadata> {
        self.metadata.first(kind)
    }

    /// Return the first metadata instance of type `T`.
    #[must_use]
    pub fn first_metadata_as<T: Metadata>(&self) -> Option<&T> {
        self.metadata.first_as::<T>()
    }

    /// Return the items selected by `slice`, which must be resolved against the shape of this array.
    ///
    /// Axis-aware metadata is sliced alongside the data.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `slice` does not match the shape of this array.
    pub fn slice(&self, slice: &SliceND) -> Result<Self, ArrayError> {
        self.check_slice(slice)?;
        let bytes = gather(&self.bytes, &self.shape, self.item_size(), slice)?;
        Ok(Self {
            name: self.name.clone(),
            data_type: self.data_type,
            elements_per_item: self.elements_per_item,
            shape: slice.shape(),
            bytes,
            metadata: self.metadata.sliced(slice)?,
        })
    }

    /// Write `value` into the items selected by `slice`.
    ///
    /// `value` must have the same data type and number of items as the slice selects; its shape may differ by unit dimensions.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `slice` or `value` are incompatible with this array.
    pub fn set_slice(&mut self, slice: &SliceND, value: &Self) -> Result<(), ArrayError> {
        self.check_slice(slice)?;
        if value.data_type != self.data_type {
            return Err(ArrayError::IncompatibleDataType {
                expected: self.data_type,
                got: value.data_type,
            });
        }
        if value.elements_per_item != self.elements_per_item {
            return Err(ArrayError::IncompatibleElementsPerItem {
                expected: self.elements_per_item,
                got: value.elements_per_item,
            });
        }
        if value.size() != slice.num_elements() {
            return Err(ArrayError::ShapeMismatch {
                expected: slice.shape(),
                got: value.shape.clone(),
            });
        }
        let item_size = self.item_size();
        scatter(&mut self.bytes, &self.shape, item_size, slice, &value.bytes)
    }

    fn check_slice(&self, slice: &SliceND) -> Result<(), ArrayError> {
        if slice.source_shape() == self.shape.as_slice() {
            Ok(())
        } else if slice.rank() == self.rank() {
            Err(ArrayError::ShapeMismatch {
                expected: self.shape.clone(),
                got: slice.source_shape().to_vec(),
            })
        } else {
            Err(crate::array_subset::IncompatibleDimensionalityError::new(
                slice.rank(),
                self.rank(),
            )
            .into())
        }
    }

    /// Reshape to `shape`, which must hold the same number of items.
    ///
    /// Axis-aware metadata is reshaped if `shape` differs only by unit dimensions, and dropped otherwise.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidReshape`] if the number of items differs.
    pub fn reshape(mut self, shape: ArrayShape) -> Result<Self, ArrayError> {
        if !shape::reshape_is_compatible(&self.shape, &shape) {
            return Err(ArrayError::InvalidReshape(self.shape, shape));
        }
        self.metadata = self.metadata.reshaped(&self.shape, &shape)?;
        self.shape = shape;
        Ok(self)
    }

    /// Remove all unit dimensions.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if axis-aware metadata cannot be reshaped.
    pub fn squeeze(self) -> Result<Self, ArrayError> {
        let shape = shape::squeeze(&self.shape);
        self.reshape(shape)
    }

    /// Convert to an [`ndarray::ArrayD`] of elements (compound items add a trailing axis).
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if `T` does not match the data type.
    #[cfg(feature = "ndarray")]
    pub fn to_ndarray<T: Element>(&self) -> Result<ndarray::ArrayD<T>, ArrayError> {
        let elements = self.to_elements::<T>()?;
        let mut shape: Vec<usize> = self
            .shape
            .iter()
            .map(|&length| usize::try_from(length).unwrap_or(usize::MAX))
            .collect();
        if self.elements_per_item > 1 {
            shape.push(self.elements_per_item);
        }
        ndarray::ArrayD::from_shape_vec(shape, elements).map_err(|_| {
            ArrayError::InvalidBytesLength(self.bytes.len(), self.bytes.len())
        })
    }
}

fn expected_bytes_length(shape: &[u64], item_size: usize) -> u64 {
    shape::num_elements(shape) * item_size as u64
}

fn all_unit_step(slice: &SliceND) -> bool {
    slice.slices().iter().all(|slice| slice.step() == 1)
}

/// Copy the items of `bytes` (with `shape`) selected by `slice` into a new buffer.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn gather(
    bytes: &[u8],
    shape: &[u64],
    item_size: usize,
    slice: &SliceND,
) -> Result<Vec<u8>, ArrayError> {
    let Some(subset) = slice.bounding_subset() else {
        return Ok(Vec::new());
    };
    if all_unit_step(slice) {
        return Ok(subset.extract_bytes(bytes, shape, item_size)?);
    }
    if !subset.inbounds(shape) {
        return Err(ArrayError::ShapeMismatch {
            expected: shape.to_vec(),
            got: subset.end_exc(),
        });
    }
    // every offset is below `bytes.len()`, so fits in a usize
    let mut out = Vec::with_capacity(slice.num_elements() as usize * item_size);
    for indices in ArraySubset::new_with_shape(slice.shape()).iter_indices() {
        let offset = shape::ravel_indices(&slice.source_indices(&indices), shape) as usize * item_size;
        out.extend_from_slice(&bytes[offset..offset + item_size]);
    }
    Ok(out)
}

/// Copy `value` into the items of `bytes` (with `shape`) selected by `slice`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn scatter(
    bytes: &mut [u8],
    shape: &[u64],
    item_size: usize,
    slice: &SliceND,
    value: &[u8],
) -> Result<(), ArrayError> {
    let Some(subset) = slice.bounding_subset() else {
        return Ok(());
    };
    if all_unit_step(slice) {
        return Ok(subset.store_bytes(value, bytes, shape, item_size)?);
    }
    if !subset.inbounds(shape) {
        return Err(ArrayError::ShapeMismatch {
            expected: shape.to_vec(),
            got: subset.end_exc(),
        });
    }
    for (i, indices) in ArraySubset::new_with_shape(slice.shape())
        .iter_indices()
        .enumerate()
    {
        let offset = shape::ravel_indices(&slice.source_indices(&indices), shape) as usize * item_size;
        let source = i * item_size;
        bytes[offset..offset + item_size].copy_from_slice(&value[source..source + item_size]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arange(shape: &[u64]) -> RealizedArray {
        let n = shape::num_elements(shape);
        let elements: Vec<i32> = (0..n).map(|i| i32::try_from(i).unwrap()).collect();
        RealizedArray::from_elements(shape.to_vec(), &elements).unwrap()
    }

    #[test]
    fn realized_array_new() {
        assert!(RealizedArray::new(DataType::UInt16, vec![2, 3], vec![0; 12]).is_ok());
        assert!(matches!(
            RealizedArray::new(DataType::UInt16, vec![2, 3], vec![0; 11]),
            Err(ArrayError::InvalidBytesLength(11, 12))
        ));
        let rgb = RealizedArray::from_items(vec![2], 3, &[1u8, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(rgb.item_size(), 3);
        assert_eq!(rgb.size(), 2);
        let filled =
            RealizedArray::filled(DataType::Float32, 1, vec![2, 2], &FillValue::from(2.5f32)).unwrap();
        assert_eq!(filled.to_elements::<f32>().unwrap(), vec![2.5; 4]);
        assert!(filled.to_elements::<f64>().is_err());
        assert_eq!(RealizedArray::scalar(7u8).size(), 1);
    }

    #[test]
    fn realized_array_slice() {
        let array = arange(&[4, 5]);
        let slice = SliceND::resolve(&[4, 5], Some(&[1, 4]), Some(&[3, 0]), Some(&[1, -2])).unwrap();
        let sliced = array.slice(&slice).unwrap();
        assert_eq!(sliced.shape(), &[2, 2]);
        assert_eq!(sliced.to_elements::<i32>().unwrap(), vec![9, 7, 14, 12]);

        let contiguous = SliceND::resolve(&[4, 5], Some(&[1, 1]), Some(&[3, 3]), None).unwrap();
        assert_eq!(
            array.slice(&contiguous).unwrap().to_elements::<i32>().unwrap(),
            vec![6, 7, 11, 12]
        );
        assert!(array.slice(&SliceND::full(&[4])).is_err());
        assert!(array
            .slice(&SliceND::resolve(&[4, 5], Some(&[2, 2]), Some(&[2, 2]), None).unwrap())
            .unwrap()
            .is_empty());
        assert_eq!(array.get::<i32>(&[2, 3]).unwrap(), 13);
        assert!(array.get::<i32>(&[4, 0]).is_err());
    }

    #[test]
    fn realized_array_set_slice() {
        let mut array = RealizedArray::zeros(DataType::Int32, vec![3, 3]);
        let slice = SliceND::resolve(&[3, 3], None, None, Some(&[2, -2])).unwrap();
        let value = RealizedArray::from_elements(vec![4], &[1i32, 2, 3, 4]).unwrap();
        array.set_slice(&slice, &value).unwrap();
        assert_eq!(
            array.to_elements::<i32>().unwrap(),
            vec![2, 0, 1, 0, 0, 0, 4, 0, 3]
        );
        let wrong = RealizedArray::from_elements(vec![3], &[1i32, 2, 3]).unwrap();
        assert!(array.set_slice(&slice, &wrong).is_err());
        let wrong_type = RealizedArray::from_elements(vec![4], &[1u8, 2, 3, 4]).unwrap();
        assert!(matches!(
            array.set_slice(&slice, &wrong_type),
            Err(ArrayError::IncompatibleDataType { .. })
        ));
    }

    #[test]
    fn realized_array_reshape() {
        let array = arange(&[1, 4, 1, 5]);
        let squeezed = array.clone().squeeze().unwrap();
        assert_eq!(squeezed.shape(), &[4, 5]);
        assert_eq!(squeezed.bytes(), array.bytes());
        assert!(array.reshape(vec![3, 7]).is_err());
    }
}
