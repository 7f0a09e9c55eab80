//! Lazy arrays.
//!
//! A [`LazyArray`] describes a typed, shaped N-dimensional array without holding its data.
//! Reading a region with [`LazyArray::slice`] asks an [`ArrayLoader`] for the elements and returns a [`RealizedArray`], an in-memory block.
//! [`LazyArray::slice_view`] returns another lazy array which composes its slice with the parent view, so views of views never copy data.
//!
//! Metadata attached to a lazy array is carried through every slice and view.
//! Axis-aware metadata, such as [`AxesMetadata`](crate::metadata::AxesMetadata), is re-sliced alongside its owner.
//!
//! A [`WritableLazyArray`] pairs a lazy array with an [`ArrayWriter`], and a [`DynamicLazyArray`] tracks a source whose shape grows over time.
//! [`MemoryArray`] implements all of these capabilities in memory.
//!
//! ```
//! # use nxlazy::array::{LazyArray, RealizedArray};
//! # use nxlazy::slice::SliceND;
//! let data = RealizedArray::from_elements(vec![2, 3], &[0u16, 1, 2, 3, 4, 5])?;
//! let array = LazyArray::from(data);
//! let view = array.slice_view(&SliceND::resolve(&[2, 3], None, None, Some(&[1, -1]))?)?;
//! let block = view.slice(&SliceND::resolve(&[2, 3], Some(&[1, 0]), None, None)?)?;
//! assert_eq!(block.to_elements::<u16>()?, vec![5, 4, 3]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod array_errors;
pub mod data_type;
mod dynamic;
mod element;
mod fill_value;
mod lazy_array;
mod loader;
mod memory_array;
mod realized_array;
mod writable_array;

pub use self::{
    array_errors::ArrayError,
    data_type::DataType,
    dynamic::{DynamicLazyArray, DynamicState, ShapeRefresher},
    element::Element,
    fill_value::FillValue,
    lazy_array::LazyArray,
    loader::{ArrayLoader, FnLoader, LoadError, MemoryLoader, WriteError},
    memory_array::MemoryArray,
    realized_array::RealizedArray,
    writable_array::{ArrayWriter, WritableLazyArray},
};

pub(crate) use self::realized_array::{gather, scatter};
