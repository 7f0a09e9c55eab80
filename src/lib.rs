//! Lazy N-dimensional arrays and a hierarchical storage engine for NeXus/HDF5-style scientific data.
//!
//! The crate is built around the [`LazyArray`](array::LazyArray): a typed, shaped array whose elements are only read when a region is [realized](array::LazyArray::slice).
//! Lazy arrays can be viewed with strided and reversed [slices](slice), and the views compose without copying data.
//! Metadata such as per-axis companion arrays travel with an array through every slice and view.
//!
//! Arrays live in a [node graph](node) of groups, data nodes and symbolic links, which is persisted by a [`StorageFile`](storage::StorageFile).
//! Storage files support a single-writer/multiple-reader (SWMR) mode, in which readers observe datasets growing while a writer appends to them.
//! Growing datasets are read through a [`DynamicLazyArray`](array::DynamicLazyArray), and the [`SliceViewIterator`](iteration::SliceViewIterator) walks such an array frame by frame, waiting for new data to arrive.
//!
//! ## Getting Started
//! - [`array`] describes lazy, realized, writable and dynamic arrays.
//! - [`storage`] describes storage files and the key/value stores behind them.
//! - [`iteration`] describes slice iteration over growing datasets.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use nxlazy::array::{DataType, RealizedArray};
//! use nxlazy::iteration::SliceViewIterator;
//! use nxlazy::storage::{store::MemoryStore, DatasetBuilder, OpenMode, StorageFile};
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut file = StorageFile::create(store.clone(), "scan.nxs")?;
//! file.create_group("/", "entry", Some("NXentry"))?;
//! let images = RealizedArray::from_elements(vec![3, 2, 2], &(0..12).collect::<Vec<u32>>())?;
//! file.create_data_from("/entry", "data", &images)?;
//! file.close()?;
//!
//! let file = StorageFile::open(store, "scan.nxs", OpenMode::ReadOnly)?;
//! let data = file.get_data("/entry/data")?;
//! let frames = SliceViewIterator::new(data, &[], &[1, 2])?;
//! let sums = frames
//!     .map(|frame| -> Result<u32, Box<dyn std::error::Error>> {
//!         Ok(frame?.realize()?.to_elements::<u32>()?.iter().sum())
//!     })
//!     .collect::<Result<Vec<_>, _>>()?;
//! assert_eq!(sums, vec![6, 22, 38]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `ndarray`: [`ndarray`] conversions for [`RealizedArray`](crate::array::RealizedArray).
//!
//! ## Logging
//! The crate emits [`tracing`] events, e.g. when a slice iteration times out or a writable file is closed on drop.
//! Install a subscriber in the application to see them.
//!
//! ## Licence
//! `nxlazy` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
// #![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod array_subset;
pub mod config;
pub mod iteration;
pub mod metadata;
pub mod node;
pub mod shape;
pub mod slice;
pub mod storage;
