use std::sync::Arc;

use crate::{
    array_subset::IncompatibleDimensionalityError,
    metadata::{Metadata, MetadataKind, MetadataMap},
    shape::{self, ArrayShape, MaxShape},
    slice::{Slice, SliceDescriptor, SliceND},
};

use super::{
    data_type::DataType, loader::MemoryLoader, ArrayError, ArrayLoader, RealizedArray,
};

/// A lazy N-dimensional array.
///
/// A lazy array holds a shape, a data type and a shared [`ArrayLoader`], but never its data.
/// Data is loaded by [`slice`](LazyArray::slice), which calls the loader exactly once with a fully resolved slice.
/// [`slice_view`](LazyArray::slice_view) instead returns another lazy array over the same loader, whose selection is composed with the selection of its parent.
///
/// Views compose associatively: `a.slice_view(s1)?.slice_view(s2)?` selects the same elements as `a.slice_view(&s1.compose(s2)?)?`.
///
/// Cloning a lazy array copies its shape and metadata and shares its loader.
#[derive(Clone, Debug)]
pub struct LazyArray {
    name: String,
    shape: ArrayShape,
    max_shape: MaxShape,
    data_type: DataType,
    elements_per_item: usize,
    loader: Arc<dyn ArrayLoader>,
    /// The selection in the loader space.
    view: SliceND,
    /// For each axis, the axis of `view` it maps to, or [`None`] for an inserted unit axis.
    axes: Vec<Option<usize>>,
    metadata: MetadataMap,
}

impl LazyArray {
    /// Create a lazy array of `shape` over `loader`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        shape: ArrayShape,
        loader: Arc<dyn ArrayLoader>,
    ) -> Self {
        Self {
            name: name.into(),
            max_shape: shape.clone(),
            data_type,
            elements_per_item: 1,
            loader,
            view: SliceND::full(&shape),
            axes: (0..shape.len()).map(Some).collect(),
            shape,
            metadata: MetadataMap::default(),
        }
    }

    /// Set the number of elements per item.
    #[must_use]
    pub fn with_elements_per_item(mut self, elements_per_item: usize) -> Self {
        self.elements_per_item = elements_per_item.max(1);
        self
    }

    /// Set the maximum shape.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the shape exceeds `max_shape` or the ranks differ.
    pub fn with_max_shape(mut self, max_shape: MaxShape) -> Result<Self, ArrayError> {
        shape::validate_max_shape(&self.shape, &max_shape)?;
        self.max_shape = max_shape;
        Ok(self)
    }

    /// Add a metadata instance.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Metadata) -> Self {
        self.metadata.add(Box::new(metadata));
        self
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

    /// Return the shape.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the maximum shape.
    #[must_use]
    pub fn max_shape(&self) -> &[u64] {
        &self.max_shape
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

    /// Return the loader.
    #[must_use]
    pub fn loader(&self) -> &Arc<dyn ArrayLoader> {
        &self.loader
    }

    /// Return the selection of this array in the loader space.
    #[must_use]
    pub fn view(&self) -> &SliceND {
        &self.view
    }

    /// Returns true if this array is not a view, i.e. it selects all of its loader with the loader's shape.
    #[must_use]
    pub fn is_base(&self) -> bool {
        self.view.is_full()
            && self.view.source_shape() == self.shape.as_slice()
            && self
                .axes
                .iter()
                .enumerate()
                .all(|(axis, view_axis)| *view_axis == Some(axis))
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

    /// Add a metadata instance.
    pub fn add_metadata(&mut self, metadata: impl Metadata) {
        self.metadata.add(Box::new(metadata));
    }

    /// Replace all metadata instances of the kind of `metadata`.
    pub fn set_metadata(&mut self, metadata: impl Metadata) {
        self.metadata.set(Box::new(metadata));
    }

    /// Return the metadata instances of `kind`.
    #[must_use]
    pub fn metadata_of_kind(&self, kind: MetadataKind) -> &[Box<dyn Metadata>] {
        self.metadata.get(kind)
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

    /// Remove all metadata instances of `kind`.
    pub fn clear_metadata(&mut self, kind: MetadataKind) {
        self.metadata.clear(kind);
    }

    /// Return the identity slice of this array.
    #[must_use]
    pub fn full_slice(&self) -> SliceND {
        SliceND::full(&self.shape)
    }

    fn check_slice(&self, slice: &SliceND) -> Result<(), ArrayError> {
        if slice.rank() != self.rank() {
            Err(IncompatibleDimensionalityError::new(slice.rank(), self.rank()).into())
        } else if slice.source_shape() != self.shape.as_slice() {
            Err(ArrayError::ShapeMismatch {
                expected: self.shape.clone(),
                got: slice.source_shape().to_vec(),
            })
        } else {
            Ok(())
        }
    }

    /// Map `slice` of this array to a slice of the loader space.
    fn loader_slice(&self, slice: &SliceND) -> Result<SliceND, ArrayError> {
        let view_shape = self.view.shape();
        let mut inner: Vec<Slice> = view_shape.iter().map(|&length| Slice::full(length)).collect();
        for (slice, view_axis) in std::iter::zip(slice.slices(), &self.axes) {
            if let Some(view_axis) = view_axis {
                inner[*view_axis] = *slice;
            }
        }
        let inner = SliceND::from_slices(view_shape, inner)?;
        Ok(self.view.compose(&inner)?)
    }

    /// Load the elements selected by `slice`, which must be resolved against the shape of this array.
    ///
    /// The loader is called once with the composed, fully resolved slice.
    /// Axis-aware metadata is sliced and attached to the result.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the rank or shape of `slice` does not match, the loader fails, or the loaded block is inconsistent with the request.
    pub fn slice(&self, slice: &SliceND) -> Result<RealizedArray, ArrayError> {
        self.check_slice(slice)?;
        let metadata = self.metadata.sliced(slice)?;
        let mut block = if slice.is_empty() {
            RealizedArray::new_items(
                self.data_type,
                self.elements_per_item,
                slice.shape(),
                Vec::new(),
            )?
        } else {
            let loader_slice = self.loader_slice(slice)?;
            let block = self.loader.load(&loader_slice)?;
            self.check_block(&block, &loader_slice)?;
            block.reshape(slice.shape())?
        };
        block.set_name(self.name.clone());
        block.set_metadata(metadata);
        Ok(block)
    }

    fn check_block(&self, block: &RealizedArray, loader_slice: &SliceND) -> Result<(), ArrayError> {
        if block.data_type() != self.data_type {
            Err(ArrayError::IncompatibleDataType {
                expected: self.data_type,
                got: block.data_type(),
            })
        } else if block.elements_per_item() != self.elements_per_item {
            Err(ArrayError::IncompatibleElementsPerItem {
                expected: self.elements_per_item,
                got: block.elements_per_item(),
            })
        } else if block.size() != loader_slice.num_elements() {
            Err(ArrayError::ShapeMismatch {
                expected: loader_slice.shape(),
                got: block.shape().to_vec(),
            })
        } else {
            Ok(())
        }
    }

    /// Load all elements.
    ///
    /// # Errors
    /// See [`slice`](LazyArray::slice).
    pub fn realize(&self) -> Result<RealizedArray, ArrayError> {
        self.slice(&self.full_slice())
    }

    /// Return a lazy view of the elements selected by `slice`, which must be resolved against the shape of this array.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the rank or shape of `slice` does not match.
    pub fn slice_view(&self, slice: &SliceND) -> Result<Self, ArrayError> {
        self.check_slice(slice)?;
        let shape = slice.shape();
        Ok(Self {
            name: self.name.clone(),
            max_shape: shape.clone(),
            shape,
            data_type: self.data_type,
            elements_per_item: self.elements_per_item,
            loader: self.loader.clone(),
            view: self.loader_slice(slice)?,
            axes: self.axes.clone(),
            metadata: self.metadata.sliced(slice)?,
        })
    }

    /// Resolve one [`SliceDescriptor`] per axis and load the selection.
    ///
    /// # Errors
    /// See [`slice`](LazyArray::slice).
    pub fn get_slice(&self, descriptors: &[SliceDescriptor]) -> Result<RealizedArray, ArrayError> {
        self.slice(&SliceND::from_descriptors(&self.shape, descriptors)?)
    }

    /// Resolve one [`SliceDescriptor`] per axis and return a view of the selection.
    ///
    /// # Errors
    /// See [`slice_view`](LazyArray::slice_view).
    pub fn get_slice_view(&self, descriptors: &[SliceDescriptor]) -> Result<Self, ArrayError> {
        self.slice_view(&SliceND::from_descriptors(&self.shape, descriptors)?)
    }

    /// Return a view with `shape`, which may differ from the current shape only by unit dimensions.
    ///
    /// # Errors
    /// Returns [`ArrayError::InvalidReshape`] if `shape` differs by more than unit dimensions.
    pub fn reshape(&self, shape: ArrayShape) -> Result<Self, ArrayError> {
        let axis_map = shape::unit_reshape_axes(&self.shape, &shape)?;
        let axes = axis_map
            .iter()
            .map(|axis| axis.and_then(|axis| self.axes[axis]))
            .collect();
        let max_shape = axis_map
            .iter()
            .map(|axis| axis.map_or(1, |axis| self.max_shape[axis]))
            .collect();
        Ok(Self {
            name: self.name.clone(),
            max_shape,
            data_type: self.data_type,
            elements_per_item: self.elements_per_item,
            loader: self.loader.clone(),
            view: self.view.clone(),
            axes,
            metadata: self.metadata.reshaped(&self.shape, &shape)?,
            shape,
        })
    }

    /// Return a view with all unit dimensions removed.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if axis-aware metadata cannot be reshaped.
    pub fn squeeze(&self) -> Result<Self, ArrayError> {
        self.reshape(shape::squeeze(&self.shape))
    }

    /// Return a view with leading and trailing unit dimensions removed.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if axis-aware metadata cannot be reshaped.
    pub fn squeeze_ends(&self) -> Result<Self, ArrayError> {
        self.reshape(shape::squeeze_ends(&self.shape))
    }

    /// Return this array over a loader that now has `shape`.
    ///
    /// Any view is reset to the full selection of `shape`.
    /// Axis-aware metadata follows the new shape.
    #[must_use]
    pub(crate) fn resized(&self, shape: ArrayShape) -> Self {
        Self {
            name: self.name.clone(),
            max_shape: self.max_shape.clone(),
            data_type: self.data_type,
            elements_per_item: self.elements_per_item,
            loader: self.loader.clone(),
            view: SliceND::full(&shape),
            axes: (0..shape.len()).map(Some).collect(),
            metadata: self.metadata.resized(&self.shape, &shape),
            shape,
        }
    }
}

impl From<RealizedArray> for LazyArray {
    fn from(mut array: RealizedArray) -> Self {
        let metadata = std::mem::take(array.metadata_mut());
        let name = array.name().to_string();
        let data_type = array.data_type();
        let shape = array.shape().to_vec();
        let elements_per_item = array.elements_per_item();
        let mut lazy = Self::new(name, data_type, shape, Arc::new(MemoryLoader::new(array)))
            .with_elements_per_item(elements_per_item);
        lazy.metadata = metadata;
        lazy
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        array::{FnLoader, LoadError},
        metadata::{AxesMetadata, OriginMetadata},
    };

    fn arange(shape: &[u64]) -> LazyArray {
        let n = shape::num_elements(shape);
        let elements: Vec<u32> = (0..n).map(|i| u32::try_from(i).unwrap()).collect();
        LazyArray::from(RealizedArray::from_elements(shape.to_vec(), &elements).unwrap())
    }

    #[test]
    fn lazy_array_slice() {
        let array = arange(&[4, 6]);
        assert_eq!(array.rank(), 2);
        assert_eq!(array.size(), 24);
        assert!(array.is_base());
        let slice = SliceND::resolve(&[4, 6], Some(&[1, 5]), None, Some(&[2, -2])).unwrap();
        let realized = array.slice(&slice).unwrap();
        assert_eq!(realized.shape(), &[2, 3]);
        assert_eq!(
            realized.to_elements::<u32>().unwrap(),
            vec![11, 9, 7, 23, 21, 19]
        );
        assert!(array.slice(&SliceND::full(&[4])).unwrap_err().is_shape_mismatch());
        assert!(array.slice(&SliceND::full(&[4, 5])).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn lazy_array_view_associative() {
        let array = arange(&[5, 7]);
        let s1 = SliceND::resolve(&[5, 7], Some(&[1, -1]), None, Some(&[1, -2])).unwrap();
        let view = array.slice_view(&s1).unwrap();
        assert!(!view.is_base());
        assert_eq!(view.shape(), &[4, 4]);
        let s2 = SliceND::resolve(view.shape(), Some(&[3, 1]), Some(&[0, 4]), Some(&[-2, 2])).unwrap();
        let nested = view.slice_view(&s2).unwrap();
        let composed = array.slice_view(&s1.compose(&s2).unwrap()).unwrap();
        assert_eq!(nested.shape(), composed.shape());
        assert_eq!(
            nested.realize().unwrap().bytes(),
            composed.realize().unwrap().bytes()
        );
        assert_eq!(
            nested.realize().unwrap().bytes(),
            view.slice(&s2).unwrap().bytes()
        );
    }

    #[test]
    fn lazy_array_loader_called_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader = FnLoader::new(vec![10, 10], move |slice| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(RealizedArray::zeros(DataType::Float64, slice.shape()))
        });
        let array = LazyArray::new("zeros", DataType::Float64, vec![10, 10], Arc::new(loader));
        let view = array
            .get_slice_view(&[SliceDescriptor::range(2, 8), SliceDescriptor::all()])
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let realized = view
            .get_slice(&[SliceDescriptor::new(None, None, Some(2)), SliceDescriptor::index(3)])
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(realized.shape(), &[3, 1]);
        assert_eq!(realized.name(), "zeros");
    }

    #[test]
    fn lazy_array_load_error() {
        let loader = FnLoader::new(vec![3], |_| Err(LoadError::new("detector offline")));
        let array = LazyArray::new("broken", DataType::Int8, vec![3], Arc::new(loader));
        match array.realize() {
            Err(ArrayError::Load(err)) => assert_eq!(err.cause().to_string(), "detector offline"),
            other => panic!("unexpected {other:?}"),
        }
        let wrong_type = FnLoader::new(vec![3], |slice| {
            Ok(RealizedArray::zeros(DataType::Int16, slice.shape()))
        });
        let array = LazyArray::new("wrong", DataType::Int8, vec![3], Arc::new(wrong_type));
        assert!(matches!(
            array.realize(),
            Err(ArrayError::IncompatibleDataType { .. })
        ));
    }

    #[test]
    fn lazy_array_squeeze_reshape() {
        let array = arange(&[1, 4, 1, 3]);
        let squeezed = array.squeeze().unwrap();
        assert_eq!(squeezed.shape(), &[4, 3]);
        let reshaped = squeezed.reshape(vec![4, 1, 3, 1]).unwrap();
        assert_eq!(reshaped.realize().unwrap().bytes(), array.realize().unwrap().bytes());
        assert!(squeezed.reshape(vec![3, 4]).is_err());

        let slice = SliceND::resolve(&[4, 1, 3, 1], Some(&[1, 0, 2, 0]), Some(&[3, 1, 3, 1]), None)
            .unwrap();
        assert_eq!(
            reshaped.slice(&slice).unwrap().to_elements::<u32>().unwrap(),
            vec![5, 8]
        );
        let empty = SliceND::resolve(&[4, 1, 3, 1], None, Some(&[4, 1, 3, 0]), None).unwrap();
        let empty_view = reshaped.slice_view(&empty).unwrap();
        assert_eq!(empty_view.shape(), &[4, 1, 3, 0]);
        assert!(empty_view.realize().unwrap().is_empty());
    }

    #[test]
    fn lazy_array_metadata() {
        let axis = LazyArray::from(RealizedArray::from_elements(vec![4], &[10u8, 20, 30, 40]).unwrap());
        let array = arange(&[4, 3])
            .with_metadata(AxesMetadata::new(&[4, 3]).with_axis(0, axis).unwrap())
            .with_metadata(OriginMetadata::new("scan.nxs", "/entry/data"));
        let clone = array.clone();
        assert!(Arc::ptr_eq(clone.loader(), array.loader()));

        let slice = SliceND::resolve(&[4, 3], None, None, Some(&[-3, 1])).unwrap();
        let realized = array.slice(&slice).unwrap();
        let axes = realized.first_metadata_as::<AxesMetadata>().unwrap();
        assert_eq!(
            axes.axis(0)[0].realize().unwrap().to_elements::<u8>().unwrap(),
            vec![40, 10]
        );
        assert!(realized.first_metadata(OriginMetadata::KIND).is_some());

        let identity = array.slice_view(&array.full_slice()).unwrap();
        let axes = identity.first_metadata_as::<AxesMetadata>().unwrap();
        assert_eq!(
            axes.axis(0)[0].realize().unwrap().to_elements::<u8>().unwrap(),
            vec![10, 20, 30, 40]
        );

        let mut cleared = array.clone();
        cleared.clear_metadata(AxesMetadata::KIND);
        assert!(cleared.first_metadata(AxesMetadata::KIND).is_none());
        assert!(array.first_metadata(AxesMetadata::KIND).is_some());
    }
}
