use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::RwLock;

use crate::{
    array_subset::ArraySubset,
    shape::{self, ArrayShape},
    slice::SliceND,
};

use super::{
    ArrayError, ArrayLoader, ArrayWriter, FillValue, LazyArray, LoadError, RealizedArray, ShapeRefresher,
    WritableLazyArray, WriteError,
};

/// A growable in-memory array.
///
/// Acts as the loader, writer and shape source of the lazy arrays it creates, so that data written through a [`WritableLazyArray`] is visible to every reader and a [`DynamicLazyArray`](super::DynamicLazyArray) observes its growth.
#[derive(Debug)]
pub struct MemoryArray {
    data: RwLock<RealizedArray>,
    fill_value: FillValue,
    complete: AtomicBool,
}

impl MemoryArray {
    /// Create a new memory array holding `data`, which is grown with `fill_value`.
    #[must_use]
    pub fn new(data: RealizedArray, fill_value: FillValue) -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(data),
            fill_value,
            complete: AtomicBool::new(false),
        })
    }

    /// Return the current shape.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.data.read().shape().to_vec()
    }

    /// Mark the array as complete: it will not grow any further.
    pub fn set_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    /// Return a lazy array over the current contents.
    #[must_use]
    pub fn lazy_array(self: &Arc<Self>, name: &str) -> LazyArray {
        let data = self.data.read();
        LazyArray::new(
            name,
            data.data_type(),
            data.shape().to_vec(),
            self.clone(),
        )
        .with_elements_per_item(data.elements_per_item())
    }

    /// Return a writable lazy array over the current contents, growable up to `max_shape`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the current shape exceeds `max_shape`.
    pub fn writable(
        self: &Arc<Self>,
        name: &str,
        max_shape: ArrayShape,
    ) -> Result<WritableLazyArray, ArrayError> {
        let array = self.lazy_array(name).with_max_shape(max_shape)?;
        WritableLazyArray::new(array, self.clone())
    }
}

impl ArrayLoader for MemoryArray {
    fn load(&self, slice: &SliceND) -> Result<RealizedArray, LoadError> {
        let data = self.data.read();
        // readers may hold a stale, smaller shape
        let slice = slice.with_source_shape(data.shape().to_vec());
        Ok(data.slice(&slice)?)
    }
}

impl ArrayWriter for MemoryArray {
    fn write(&self, slice: &SliceND, data: &RealizedArray) -> Result<(), WriteError> {
        let mut array = self.data.write();
        let slice = slice.with_source_shape(array.shape().to_vec());
        array.set_slice(&slice, data).map_err(WriteError::new)
    }

    fn resize(&self, requested: &[u64]) -> Result<(), WriteError> {
        let mut array = self.data.write();
        let grown_shape = shape::grow_shape(array.shape(), requested, requested);
        let shape = grown_shape.as_slice();
        if shape == array.shape() {
            return Ok(());
        }
        let grown = RealizedArray::filled(
            array.data_type(),
            array.elements_per_item(),
            shape.to_vec(),
            &self.fill_value,
        )
        .map_err(WriteError::new)?;
        let item_size = grown.item_size();
        let mut bytes = grown.into_bytes();
        ArraySubset::new_with_shape(array.shape().to_vec())
            .store_bytes(array.bytes(), &mut bytes, shape, item_size)
            .map_err(WriteError::new)?;
        *array = RealizedArray::new_items(
            array.data_type(),
            array.elements_per_item(),
            shape.to_vec(),
            bytes,
        )
        .map_err(WriteError::new)?;
        Ok(())
    }

    fn stored_shape(&self) -> Option<ArrayShape> {
        Some(self.shape())
    }
}

impl ShapeRefresher for MemoryArray {
    fn current_shape(&self) -> Result<ArrayShape, LoadError> {
        Ok(self.shape())
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{array::DataType, shape::UNLIMITED};

    #[test]
    fn memory_array_write_and_grow() {
        let memory = MemoryArray::new(
            RealizedArray::zeros(DataType::Int32, vec![0, 3]),
            FillValue::from(-1i32),
        );
        let mut writable = memory.writable("frames", vec![UNLIMITED, 3]).unwrap();
        let row = RealizedArray::from_elements(vec![1, 3], &[1i32, 2, 3]).unwrap();
        writable.set_slice_at(&[0, 0], &row).unwrap();
        writable.set_slice_at(&[2, 0], &row).unwrap();
        assert_eq!(writable.shape(), &[3, 3]);
        assert_eq!(memory.shape(), vec![3, 3]);
        assert_eq!(
            writable.realize().unwrap().to_elements::<i32>().unwrap(),
            vec![1, 2, 3, -1, -1, -1, 1, 2, 3]
        );

        let stale = memory.lazy_array("frames");
        writable.set_slice_at(&[3, 0], &row).unwrap();
        assert_eq!(stale.shape(), &[3, 3]);
        assert_eq!(
            stale.slice(&SliceND::full(&[3, 3])).unwrap().size(),
            9
        );

        let wide = RealizedArray::from_elements(vec![1, 4], &[0i32; 4]).unwrap();
        assert!(writable.set_slice_at(&[0, 0], &wide).is_err());
    }

    #[test]
    fn memory_array_handles_never_shrink() {
        let memory = MemoryArray::new(
            RealizedArray::zeros(DataType::UInt8, vec![1, 2]),
            FillValue::from(0u8),
        );
        let mut first = memory.writable("rows", vec![UNLIMITED, 2]).unwrap();
        let mut second = memory.writable("rows", vec![UNLIMITED, 2]).unwrap();
        let row = RealizedArray::from_elements(vec![1, 2], &[7u8, 8]).unwrap();
        first.set_slice_at(&[4, 0], &row).unwrap();
        second.set_slice_at(&[0, 0], &row).unwrap();
        assert_eq!(memory.shape(), vec![5, 2]);
        assert_eq!(second.shape(), &[5, 2]);
        memory.resize(&[2, 2]).unwrap();
        assert_eq!(memory.shape(), vec![5, 2]);
    }
}
