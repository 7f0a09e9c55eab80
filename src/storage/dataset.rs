use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    array::{
        ArrayError, ArrayLoader, ArrayWriter, DataType, FillValue, LazyArray, LoadError,
        RealizedArray, ShapeRefresher, WritableLazyArray, WriteError,
    },
    array_subset::{
        ArrayExtractBytesError, ArrayStoreBytesError, ArraySubset, IncompatibleDimensionalityError,
    },
    config::global_config,
    node::{Attribute, Oid},
    shape::{self, ArrayShape, MaxShape, ShapeError},
    slice::SliceND,
};

use super::{ReadableWritableListableStorage, StorageError, StoreKey};

/// A [`ChunkedDataset`] builder.
///
/// The dataset builder is initialised from a shape and data type.
///  - The maximum shape defaults to the shape, so the dataset cannot grow.
///  - The chunk shape defaults to whole trailing axes holding up to the [default chunk elements](crate::config::Config#default-chunk-elements).
///  - The fill value defaults to zero.
///  - Attributes are empty.
///
/// Use the methods in the dataset builder to change the configuration away from these defaults, and then create the dataset with [`StorageFile::create_data`](super::StorageFile::create_data).
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    /// Dataset shape.
    pub shape: ArrayShape,
    /// Data type.
    pub data_type: DataType,
    /// Elements per item.
    pub elements_per_item: usize,
    /// Maximum shape, [`UNLIMITED`](crate::shape::UNLIMITED) along axes without a bound.
    pub max_shape: Option<MaxShape>,
    /// Chunk shape.
    pub chunk_shape: Option<ArrayShape>,
    /// Fill value.
    pub fill_value: Option<FillValue>,
    /// Attributes.
    pub attributes: Vec<Attribute>,
}

/// A dataset creation error.
#[derive(Debug, Error)]
pub enum DatasetCreateError {
    /// Invalid shape or maximum shape.
    #[error(transparent)]
    Shape(#[from] ShapeError),
    /// The chunk shape has the wrong rank or a zero length axis.
    #[error("invalid chunk shape {0:?} for a dataset of shape {1:?}")]
    InvalidChunkShape(ArrayShape, ArrayShape),
    /// The fill value size does not match the data type.
    #[error("fill value {0} is incompatible with data type {1}")]
    IncompatibleFillValue(FillValue, DataType),
}

impl DatasetBuilder {
    /// Create a new dataset builder for a dataset of `shape` and `data_type`.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType) -> Self {
        Self {
            shape,
            data_type,
            elements_per_item: 1,
            max_shape: None,
            chunk_shape: None,
            fill_value: None,
            attributes: Vec::new(),
        }
    }

    /// Set the shape.
    pub fn shape(&mut self, shape: ArrayShape) -> &mut Self {
        self.shape = shape;
        self
    }

    /// Set the data type.
    pub fn data_type(&mut self, data_type: DataType) -> &mut Self {
        self.data_type = data_type;
        self
    }

    /// Set the number of elements per item.
    pub fn elements_per_item(&mut self, elements_per_item: usize) -> &mut Self {
        self.elements_per_item = elements_per_item.max(1);
        self
    }

    /// Set the maximum shape.
    pub fn max_shape(&mut self, max_shape: MaxShape) -> &mut Self {
        self.max_shape = Some(max_shape);
        self
    }

    /// Set the chunk shape.
    pub fn chunk_shape(&mut self, chunk_shape: ArrayShape) -> &mut Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }

    /// Set the fill value.
    pub fn fill_value(&mut self, fill_value: FillValue) -> &mut Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// Set the attributes.
    pub fn attributes(&mut self, attributes: Vec<Attribute>) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Add an attribute.
    pub fn attribute(&mut self, attribute: Attribute) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    /// Validate the configuration and return the stored description of the dataset.
    pub(crate) fn descriptor(&self) -> Result<DatasetDescriptor, DatasetCreateError> {
        let max_shape = self.max_shape.clone().unwrap_or_else(|| self.shape.clone());
        shape::validate_max_shape(&self.shape, &max_shape)?;
        let chunk_shape = self.chunk_shape.clone().unwrap_or_else(|| {
            default_chunk_shape(
                &self.shape,
                global_config().default_chunk_elements() / self.elements_per_item as u64,
            )
        });
        if chunk_shape.len() != self.shape.len() || chunk_shape.contains(&0) {
            return Err(DatasetCreateError::InvalidChunkShape(
                chunk_shape,
                self.shape.clone(),
            ));
        }
        let fill_value = self
            .fill_value
            .clone()
            .unwrap_or_else(|| FillValue::zero(self.data_type));
        if fill_value.size() != self.data_type.size() {
            return Err(DatasetCreateError::IncompatibleFillValue(
                fill_value,
                self.data_type,
            ));
        }
        Ok(DatasetDescriptor {
            shape: self.shape.clone(),
            max_shape,
            data_type: self.data_type,
            elements_per_item: self.elements_per_item.max(1),
            chunk_shape,
            fill_value,
        })
    }
}

/// Pick a chunk shape for `shape` holding at most `elements` elements, filling trailing axes first.
///
/// Zero length axes get a chunk length of one.
#[must_use]
pub(crate) fn default_chunk_shape(shape: &[u64], elements: u64) -> ArrayShape {
    let mut budget = elements.max(1);
    let mut chunk_shape = vec![1; shape.len()];
    for (chunk, &length) in std::iter::zip(chunk_shape.iter_mut(), shape).rev() {
        *chunk = length.clamp(1, budget);
        budget /= *chunk;
    }
    chunk_shape
}

fn default_elements_per_item() -> usize {
    1
}

/// The stored description of a chunked dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DatasetDescriptor {
    pub shape: ArrayShape,
    pub max_shape: MaxShape,
    pub data_type: DataType,
    #[serde(default = "default_elements_per_item")]
    pub elements_per_item: usize,
    pub chunk_shape: ArrayShape,
    pub fill_value: FillValue,
}

impl DatasetDescriptor {
    fn item_size(&self) -> usize {
        self.data_type.size() * self.elements_per_item
    }

    fn chunk_bytes_len(&self) -> usize {
        usize::try_from(shape::num_elements(&self.chunk_shape)).unwrap_or(usize::MAX)
            * self.item_size()
    }

    fn fill_chunk(&self) -> Vec<u8> {
        self.fill_value
            .as_ne_bytes()
            .repeat(self.chunk_bytes_len() / self.data_type.size().max(1))
    }
}

#[derive(Debug, Error)]
enum ChunkError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Array(#[from] ArrayError),
    #[error(transparent)]
    Dimensionality(#[from] IncompatibleDimensionalityError),
    #[error(transparent)]
    Extract(#[from] ArrayExtractBytesError),
    #[error(transparent)]
    Store(#[from] ArrayStoreBytesError),
    #[error("chunk {0} has {1} bytes, expected {2}")]
    InvalidChunkLength(StoreKey, usize, usize),
}

/// A dataset stored as fixed size chunks in a store.
///
/// Acts as the [`ArrayLoader`], [`ArrayWriter`] and [`ShapeRefresher`] of the lazy arrays of a data node.
/// Loading only reads the chunks intersecting the bounding box of a slice, and chunks which do not exist read as the fill value.
/// Writes read, modify and replace whole chunks. Chunks holding only the fill value are erased.
pub struct ChunkedDataset {
    store: ReadableWritableListableStorage,
    oid: Oid,
    descriptor: RwLock<DatasetDescriptor>,
    write_lock: Mutex<()>,
    read_only: AtomicBool,
}

impl Debug for ChunkedDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedDataset")
            .field("oid", &self.oid)
            .field("descriptor", &*self.descriptor.read())
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}

impl ChunkedDataset {
    pub(crate) fn new(
        store: ReadableWritableListableStorage,
        oid: Oid,
        descriptor: DatasetDescriptor,
        read_only: bool,
    ) -> Self {
        Self {
            store,
            oid,
            descriptor: RwLock::new(descriptor),
            write_lock: Mutex::new(()),
            read_only: AtomicBool::new(read_only),
        }
    }

    /// Return the node identity of the dataset.
    #[must_use]
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Return the current shape.
    #[must_use]
    pub fn shape(&self) -> ArrayShape {
        self.descriptor.read().shape.clone()
    }

    /// Return the maximum shape.
    #[must_use]
    pub fn max_shape(&self) -> MaxShape {
        self.descriptor.read().max_shape.clone()
    }

    /// Return the chunk shape.
    #[must_use]
    pub fn chunk_shape(&self) -> ArrayShape {
        self.descriptor.read().chunk_shape.clone()
    }

    /// Return the data type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.descriptor.read().data_type
    }

    /// Return the fill value.
    #[must_use]
    pub fn fill_value(&self) -> FillValue {
        self.descriptor.read().fill_value.clone()
    }

    /// Returns true if the dataset no longer accepts writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    pub(crate) fn set_read_only(&self) {
        self.read_only.store(true, Ordering::Release);
    }

    pub(crate) fn descriptor(&self) -> DatasetDescriptor {
        self.descriptor.read().clone()
    }

    /// Adopt a shape observed elsewhere, without shrinking.
    pub(crate) fn observe_shape(&self, shape: &[u64]) {
        let mut descriptor = self.descriptor.write();
        if shape.len() == descriptor.shape.len() {
            descriptor.shape = shape::grow_shape(&descriptor.shape, shape, &descriptor.max_shape);
        }
    }

    /// Return a lazy array named `name` over the current shape of the dataset.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the stored shape exceeds the maximum shape.
    pub fn lazy_array(self: &Arc<Self>, name: &str) -> Result<LazyArray, ArrayError> {
        let descriptor = self.descriptor();
        LazyArray::new(name, descriptor.data_type, descriptor.shape, self.clone())
            .with_elements_per_item(descriptor.elements_per_item)
            .with_max_shape(descriptor.max_shape)
    }

    /// Return a writable lazy array named `name` over the current shape of the dataset.
    ///
    /// # Errors
    /// Returns [`ArrayError::ReadOnly`] if the dataset is read only.
    pub fn writable(self: &Arc<Self>, name: &str) -> Result<WritableLazyArray, ArrayError> {
        if self.is_read_only() {
            return Err(ArrayError::ReadOnly);
        }
        WritableLazyArray::new(self.lazy_array(name)?, self.clone())
    }

    fn retrieve_chunk(
        &self,
        descriptor: &DatasetDescriptor,
        chunk_indices: &[u64],
    ) -> Result<Vec<u8>, ChunkError> {
        let key = StoreKey::chunk(self.oid, chunk_indices);
        match self.store.get(&key)? {
            Some(bytes) if bytes.len() == descriptor.chunk_bytes_len() => Ok(bytes),
            Some(bytes) => Err(ChunkError::InvalidChunkLength(
                key,
                bytes.len(),
                descriptor.chunk_bytes_len(),
            )),
            None => Ok(descriptor.fill_chunk()),
        }
    }

    fn store_chunk(&self, descriptor: &DatasetDescriptor, chunk_indices: &[u64], bytes: &[u8]) -> Result<(), ChunkError> {
        let key = StoreKey::chunk(self.oid, chunk_indices);
        if descriptor.fill_value.equals_all(bytes) {
            self.store.erase(&key)?;
        } else {
            self.store.set(&key, bytes)?;
        }
        Ok(())
    }

    /// Read the items of `subset`, which may extend beyond the current shape.
    fn retrieve_subset(
        &self,
        descriptor: &DatasetDescriptor,
        subset: &ArraySubset,
    ) -> Result<Vec<u8>, ChunkError> {
        if subset.dimensionality() == 0 {
            return self.retrieve_chunk(descriptor, &[]);
        }
        let item_size = descriptor.item_size();
        let chunks: Vec<_> = subset.iter_chunks(&descriptor.chunk_shape)?.collect();
        let num_chunks = chunks.len();
        let parts = chunks
            .into_par_iter()
            .map(|(chunk_indices, chunk_subset)| {
                let overlap = chunk_subset.overlap(subset)?;
                let chunk_bytes = self.retrieve_chunk(descriptor, &chunk_indices)?;
                let overlap_bytes = overlap
                    .relative_to(chunk_subset.start())?
                    .extract_bytes(&chunk_bytes, &descriptor.chunk_shape, item_size)?;
                Ok::<_, ChunkError>((overlap, overlap_bytes))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut bytes = vec![0; subset.num_elements_usize() * item_size];
        for (overlap, overlap_bytes) in parts {
            overlap.relative_to(subset.start())?.store_bytes(
                &overlap_bytes,
                &mut bytes,
                subset.shape(),
                item_size,
            )?;
        }
        tracing::debug!(oid = %self.oid, subset = %subset, num_chunks, "loaded chunks");
        Ok(bytes)
    }

    /// Replace the items of `subset` with `bytes`.
    fn store_subset(
        &self,
        descriptor: &DatasetDescriptor,
        subset: &ArraySubset,
        bytes: &[u8],
    ) -> Result<(), ChunkError> {
        if subset.dimensionality() == 0 {
            return self.store_chunk(descriptor, &[], bytes);
        }
        let item_size = descriptor.item_size();
        for (chunk_indices, chunk_subset) in subset.iter_chunks(&descriptor.chunk_shape)? {
            let overlap = chunk_subset.overlap(subset)?;
            let overlap_bytes = overlap
                .relative_to(subset.start())?
                .extract_bytes(bytes, subset.shape(), item_size)?;
            let chunk_bytes = if overlap == chunk_subset {
                overlap_bytes
            } else {
                let mut chunk_bytes = self.retrieve_chunk(descriptor, &chunk_indices)?;
                overlap.relative_to(chunk_subset.start())?.store_bytes(
                    &overlap_bytes,
                    &mut chunk_bytes,
                    &descriptor.chunk_shape,
                    item_size,
                )?;
                chunk_bytes
            };
            self.store_chunk(descriptor, &chunk_indices, &chunk_bytes)?;
        }
        Ok(())
    }

    fn read_region(&self, descriptor: &DatasetDescriptor, subset: &ArraySubset) -> Result<RealizedArray, ChunkError> {
        let bytes = self.retrieve_subset(descriptor, subset)?;
        Ok(RealizedArray::new_items(
            descriptor.data_type,
            descriptor.elements_per_item,
            subset.shape().to_vec(),
            bytes,
        )?)
    }
}

impl ArrayLoader for ChunkedDataset {
    fn load(&self, slice: &SliceND) -> Result<RealizedArray, LoadError> {
        let descriptor = self.descriptor();
        let Some(subset) = slice.bounding_subset() else {
            return Ok(RealizedArray::filled(
                descriptor.data_type,
                descriptor.elements_per_item,
                slice.shape(),
                &descriptor.fill_value,
            )?);
        };
        let region = self.read_region(&descriptor, &subset).map_err(LoadError::new)?;
        Ok(region.slice(&slice.relative_to(&subset))?)
    }
}

impl ArrayWriter for ChunkedDataset {
    fn write(&self, slice: &SliceND, data: &RealizedArray) -> Result<(), WriteError> {
        if self.is_read_only() {
            return Err(WriteError::new(StorageError::ReadOnly));
        }
        let Some(subset) = slice.bounding_subset() else {
            return Ok(());
        };
        let _write_lock = self.write_lock.lock();
        let descriptor = self.descriptor();
        let mut region = self
            .read_region(&descriptor, &subset)
            .map_err(WriteError::new)?;
        region
            .set_slice(&slice.relative_to(&subset), data)
            .map_err(WriteError::new)?;
        self.store_subset(&descriptor, &subset, region.bytes())
            .map_err(WriteError::new)
    }

    fn resize(&self, shape: &[u64]) -> Result<(), WriteError> {
        if self.is_read_only() {
            return Err(WriteError::new(StorageError::ReadOnly));
        }
        let mut descriptor = self.descriptor.write();
        shape::validate_max_shape(shape, &descriptor.max_shape).map_err(WriteError::new)?;
        descriptor.shape = shape::grow_shape(&descriptor.shape, shape, &descriptor.max_shape);
        Ok(())
    }

    fn stored_shape(&self) -> Option<ArrayShape> {
        Some(self.shape())
    }

    fn is_read_only(&self) -> bool {
        ChunkedDataset::is_read_only(self)
    }
}

impl ShapeRefresher for ChunkedDataset {
    fn current_shape(&self) -> Result<ArrayShape, LoadError> {
        Ok(self.shape())
    }

    fn is_complete(&self) -> bool {
        self.is_read_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        shape::UNLIMITED,
        storage::{store::MemoryStore, ListableStorageTraits, StorePrefix},
    };

    fn dataset(builder: &DatasetBuilder) -> (Arc<MemoryStore>, Arc<ChunkedDataset>) {
        let store = Arc::new(MemoryStore::new());
        let dataset = Arc::new(ChunkedDataset::new(
            store.clone(),
            Oid(1),
            builder.descriptor().unwrap(),
            false,
        ));
        (store, dataset)
    }

    #[test]
    fn dataset_builder() {
        let descriptor = DatasetBuilder::new(vec![10, 20], DataType::Float32)
            .max_shape(vec![UNLIMITED, 20])
            .chunk_shape(vec![5, 5])
            .descriptor()
            .unwrap();
        assert_eq!(descriptor.chunk_shape, vec![5, 5]);
        assert_eq!(descriptor.fill_value, FillValue::zero(DataType::Float32));

        let descriptor = DatasetBuilder::new(vec![0, 4, 8], DataType::Int16)
            .descriptor()
            .unwrap();
        assert_eq!(descriptor.max_shape, vec![0, 4, 8]);
        assert!(descriptor.chunk_shape.iter().all(|&length| length > 0));

        assert!(matches!(
            DatasetBuilder::new(vec![10], DataType::Int8)
                .chunk_shape(vec![0])
                .descriptor(),
            Err(DatasetCreateError::InvalidChunkShape(..))
        ));
        assert!(matches!(
            DatasetBuilder::new(vec![10], DataType::Int8)
                .max_shape(vec![5])
                .descriptor(),
            Err(DatasetCreateError::Shape(_))
        ));
        assert!(matches!(
            DatasetBuilder::new(vec![10], DataType::Int8)
                .fill_value(FillValue::from(1.0f64))
                .descriptor(),
            Err(DatasetCreateError::IncompatibleFillValue(..))
        ));
    }

    #[test]
    fn dataset_default_chunk_shape() {
        assert_eq!(default_chunk_shape(&[100, 200, 300], 1000), vec![1, 3, 300]);
        assert_eq!(default_chunk_shape(&[0, 100, 100], 1 << 20), vec![1, 100, 100]);
        assert_eq!(default_chunk_shape(&[4, 5], 1 << 20), vec![4, 5]);
        assert_eq!(default_chunk_shape(&[], 16), Vec::<u64>::new());
    }

    #[test]
    fn dataset_write_read() {
        let (store, dataset) = dataset(
            DatasetBuilder::new(vec![4, 6], DataType::Int32)
                .chunk_shape(vec![3, 4])
                .fill_value(FillValue::from(-1i32)),
        );
        let mut array = dataset.writable("values").unwrap();
        assert_eq!(
            array.realize().unwrap().to_elements::<i32>().unwrap(),
            vec![-1; 24]
        );
        assert!(store.is_empty());

        let block = RealizedArray::from_elements(vec![2, 2], &[1i32, 2, 3, 4]).unwrap();
        array.set_slice_at(&[2, 3], &block).unwrap();
        assert_eq!(
            store.list_prefix(&StorePrefix::dataset(Oid(1))).unwrap().len(),
            4
        );
        let read = array
            .slice(&SliceND::resolve(&[4, 6], Some(&[2, 2]), None, None).unwrap())
            .unwrap();
        assert_eq!(
            read.to_elements::<i32>().unwrap(),
            vec![-1, 1, 2, -1, -1, 3, 4, -1]
        );

        let reversed = SliceND::resolve(&[4, 6], Some(&[-1, -2]), None, Some(&[-2, -3])).unwrap();
        assert_eq!(
            array.slice(&reversed).unwrap().to_elements::<i32>().unwrap(),
            vec![4, -1, -1, -1]
        );

        array
            .set_slice_at(&[2, 3], &RealizedArray::from_elements(vec![2, 2], &[-1i32; 4]).unwrap())
            .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn dataset_strided_write() {
        let (_store, dataset) = dataset(
            DatasetBuilder::new(vec![6], DataType::UInt8).chunk_shape(vec![4]),
        );
        let mut array = dataset.writable("strided").unwrap();
        let slice = SliceND::resolve(&[6], None, None, Some(&[2])).unwrap();
        let data = RealizedArray::from_elements(vec![3], &[1u8, 2, 3]).unwrap();
        array.set_slice(&slice, &data).unwrap();
        assert_eq!(
            array.realize().unwrap().to_elements::<u8>().unwrap(),
            vec![1, 0, 2, 0, 3, 0]
        );
    }

    #[test]
    fn dataset_grow() {
        let (_store, dataset) = dataset(
            DatasetBuilder::new(vec![0, 2], DataType::Float64)
                .max_shape(vec![UNLIMITED, 2])
                .chunk_shape(vec![2, 2]),
        );
        let mut array = dataset.writable("frames").unwrap();
        for frame in 0..5u32 {
            let row = RealizedArray::from_elements(vec![1, 2], &[f64::from(frame); 2]).unwrap();
            array.set_slice_at(&[u64::from(frame), 0], &row).unwrap();
        }
        assert_eq!(dataset.shape(), vec![5, 2]);
        assert_eq!(dataset.current_shape().unwrap(), vec![5, 2]);
        let fresh = dataset.lazy_array("frames").unwrap();
        assert_eq!(
            fresh.realize().unwrap().to_elements::<f64>().unwrap(),
            vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0]
        );
        let wide = RealizedArray::from_elements(vec![1, 3], &[0.0f64; 3]).unwrap();
        assert!(array.set_slice_at(&[0, 0], &wide).is_err());

        dataset.set_read_only();
        assert!(dataset.is_complete());
        assert!(matches!(
            array.set_slice_at(&[0, 0], &RealizedArray::from_elements(vec![1, 2], &[0.0f64; 2]).unwrap()),
            Err(ArrayError::ReadOnly)
        ));
        assert!(dataset.writable("frames").is_err());
    }

    #[test]
    fn dataset_scalar() {
        let (store, dataset) = dataset(&DatasetBuilder::new(vec![], DataType::Int64));
        let mut array = dataset.writable("scalar").unwrap();
        array
            .set_slice(&SliceND::full(&[]), &RealizedArray::scalar(42i64))
            .unwrap();
        assert_eq!(store.list().unwrap(), vec![StoreKey::chunk(Oid(1), &[])]);
        assert_eq!(array.realize().unwrap().get::<i64>(&[]).unwrap(), 42);
    }
}
