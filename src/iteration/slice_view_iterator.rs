use std::time::Duration;

use itertools::izip;

use crate::{
    array::{DynamicLazyArray, LazyArray},
    shape,
    slice::{Slice, SliceDescriptor, SliceND},
};

use super::{IterationError, IterationOptions, SliceInfo};

/// The shortest wait between two polls of a growing source.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Iterates views of a region of a lazy array, stepping one index at a time along every axis except the data axes.
///
/// Each view is a lazy [`slice_view`](LazyArray::slice_view) of the source with the rank of the source, carrying a fresh [`SliceInfo`] in place of any inherited one.
/// Stepped axes advance in row-major order, so the outermost stepped axis varies slowest.
///
/// Over a dynamic source, [`has_next`](SliceViewIterator::has_next) waits for the source to grow, polling its shape every poll interval until the timeout of the [`IterationOptions`].
/// A timeout ends the iteration, it is not an error.
/// The sampling region is re-resolved against the grown shape, so open ended sampling slices extend as the source grows.
///
/// ```rust
/// # use std::sync::Arc;
/// use nxlazy::array::{DataType, LazyArray, MemoryLoader, RealizedArray};
/// use nxlazy::iteration::{SliceInfo, SliceViewIterator};
/// use nxlazy::slice::parse_slices;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = RealizedArray::from_elements(vec![3, 4], &(0..12).collect::<Vec<i32>>())?;
/// let array = LazyArray::new("data", DataType::Int32, vec![3, 4], Arc::new(MemoryLoader::new(data)));
/// let mut rows = SliceViewIterator::new(array, &parse_slices("::-1,1:3")?, &[1])?;
/// assert_eq!(rows.total(), 3);
/// let first = rows.next().unwrap()?;
/// assert_eq!(first.realize()?.to_elements::<i32>()?, vec![9, 10]);
/// assert_eq!(first.first_metadata_as::<SliceInfo>().unwrap().current_index(), 0);
/// assert_eq!(rows.count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SliceViewIterator {
    source: DynamicLazyArray,
    sampling: Vec<SliceDescriptor>,
    region: SliceND,
    data_axes: Vec<usize>,
    stepped_axes: Vec<usize>,
    options: IterationOptions,
    index: u64,
    exhausted: bool,
}

impl SliceViewIterator {
    /// Create an iterator over the region of `source` selected by `sampling`, keeping `data_axes` whole in each view.
    ///
    /// An empty `sampling` selects the whole source. The iterator uses the default [`IterationOptions`].
    ///
    /// # Errors
    /// Returns an [`IterationError`] if `sampling` does not have one descriptor per axis, has a zero step, or a data axis is out of range.
    pub fn new(
        source: impl Into<DynamicLazyArray>,
        sampling: &[SliceDescriptor],
        data_axes: &[usize],
    ) -> Result<Self, IterationError> {
        let source = source.into();
        let rank = source.array().rank();
        let sampling = if sampling.is_empty() {
            vec![SliceDescriptor::all(); rank]
        } else {
            sampling.to_vec()
        };
        let region = SliceND::from_descriptors(source.shape(), &sampling)?;
        if let Some(&axis) = data_axes.iter().find(|&&axis| axis >= rank) {
            return Err(IterationError::InvalidDataAxis { axis, rank });
        }
        let mut data_axes = data_axes.to_vec();
        data_axes.sort_unstable();
        data_axes.dedup();
        let stepped_axes = (0..rank)
            .filter(|axis| data_axes.binary_search(axis).is_err())
            .collect();
        Ok(Self {
            source,
            sampling,
            region,
            data_axes,
            stepped_axes,
            options: IterationOptions::default(),
            index: 0,
            exhausted: false,
        })
    }

    /// Replace the iteration options.
    #[must_use]
    pub fn with_options(mut self, options: IterationOptions) -> Self {
        self.options = options;
        self
    }

    /// Return the iteration options.
    #[must_use]
    pub fn options(&self) -> &IterationOptions {
        &self.options
    }

    /// Return the source.
    #[must_use]
    pub fn source(&self) -> &DynamicLazyArray {
        &self.source
    }

    /// Return the sampling region, resolved against the current shape of the source.
    #[must_use]
    pub fn sampling_region(&self) -> &SliceND {
        &self.region
    }

    /// Return the axes kept whole in each view, in ascending order.
    #[must_use]
    pub fn data_axes(&self) -> &[usize] {
        &self.data_axes
    }

    /// Return the index of the next view.
    #[must_use]
    pub fn current_index(&self) -> u64 {
        self.index
    }

    /// Return the number of views in the sampling region as currently known.
    fn num_views(&self) -> u64 {
        self.stepped_axes
            .iter()
            .map(|&axis| self.region.slices()[axis].count())
            .product()
    }

    /// Return the number of views, or `-1` if the source may still grow.
    #[must_use]
    pub fn total(&self) -> i64 {
        if self.source.is_complete() {
            i64::try_from(self.num_views()).unwrap_or(i64::MAX)
        } else {
            -1
        }
    }

    fn resolve_region(&mut self) {
        match SliceND::from_descriptors(self.source.shape(), &self.sampling) {
            Ok(region) => self.region = region,
            Err(err) => tracing::warn!(%err, "cannot resolve the sampling region"),
        }
    }

    /// Returns true if there is another view, waiting for a dynamic source to grow if needed.
    ///
    /// Returns false once the iteration is exhausted. A dynamic source exhausts the iteration when it completes, when the timeout elapses without growth, or when the cancellation token is cancelled.
    pub fn has_next(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        if self.index < self.num_views() {
            return true;
        }
        let has_next = self.source.is_dynamic() && self.poll();
        self.exhausted = !has_next;
        has_next
    }

    fn poll(&mut self) -> bool {
        let clock = self.options.clock.clone();
        let interval = self.options.poll_interval.max(MIN_POLL_INTERVAL);
        let deadline = clock.now() + self.options.timeout;
        loop {
            if self.options.cancellation.is_cancelled() {
                tracing::debug!(index = self.index, "slice iteration cancelled");
                return false;
            }
            if self.source.refresh_shape() {
                self.resolve_region();
            }
            if self.index < self.num_views() {
                return true;
            }
            if self.source.is_complete() {
                return false;
            }
            let now = clock.now();
            if now >= deadline {
                tracing::error!(
                    name = self.source.array().name(),
                    index = self.index,
                    timeout = ?self.options.timeout,
                    "timed out waiting for the source to grow"
                );
                return false;
            }
            clock.sleep_cancellable(interval.min(deadline - now), &self.options.cancellation);
        }
    }

    /// Rewind to the first view. A dynamic source is refreshed first.
    pub fn reset(&mut self) {
        if self.source.is_dynamic() && self.source.refresh_shape() {
            self.resolve_region();
        }
        self.index = 0;
        self.exhausted = false;
    }

    fn view(&self, index: u64) -> Result<LazyArray, IterationError> {
        let counts: Vec<u64> = self
            .stepped_axes
            .iter()
            .map(|&axis| self.region.slices()[axis].count())
            .collect();
        let positions = shape::unravel_index(index, &counts);
        let output_shape = self.region.shape();
        let mut source_slices = self.region.slices().to_vec();
        let mut output_slices: Vec<Slice> = output_shape.iter().map(|&n| Slice::full(n)).collect();
        for (&axis, &position) in izip!(&self.stepped_axes, &positions) {
            source_slices[axis] = Slice::single(self.region.slices()[axis].index(position));
            output_slices[axis] = Slice::single(position);
        }
        let step = SliceND::from_slices(self.region.source_shape().to_vec(), source_slices)?;
        let output = SliceND::from_slices(output_shape, output_slices)?;

        let mut view = self.source.array().slice_view(&step)?;
        view.clear_metadata(SliceInfo::KIND);
        view.add_metadata(SliceInfo::new(
            step,
            output,
            self.region.clone(),
            self.data_axes.clone(),
            self.total(),
            index,
        ));
        Ok(view)
    }
}

impl Iterator for SliceViewIterator {
    type Item = Result<LazyArray, IterationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let view = self.view(self.index);
        self.index += 1;
        Some(view)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use super::*;
    use crate::{
        array::{DataType, FnLoader, LoadError, MemoryLoader, RealizedArray, ShapeRefresher},
        iteration::{CancellationToken, Clock, ManualClock},
        shape::{ArrayShape, UNLIMITED},
        slice::parse_slices,
    };

    fn zeros(shape: ArrayShape) -> LazyArray {
        let loader = FnLoader::new(shape.clone(), |slice: &SliceND| {
            Ok(RealizedArray::zeros(DataType::Float32, slice.shape()))
        });
        LazyArray::new("zeros", DataType::Float32, shape, Arc::new(loader))
    }

    fn info(view: &LazyArray) -> &SliceInfo {
        view.first_metadata_as::<SliceInfo>().unwrap()
    }

    #[test]
    fn slice_view_iterator_fixture() {
        let array = zeros(vec![10, 20, 30, 40]);
        let iterator = SliceViewIterator::new(array.clone(), &[], &[3, 2]).unwrap();
        assert_eq!(iterator.total(), 200);

        let sampling = parse_slices("0:1,:,0:5,0:5").unwrap();
        let iterator = SliceViewIterator::new(array.clone(), &sampling, &[3, 2]).unwrap();
        assert_eq!(iterator.total(), 20);
        assert_eq!(iterator.data_axes(), &[2, 3]);
        let views = iterator.collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(views.len(), 20);
        assert!(views.iter().all(|view| view.shape() == [1, 1, 5, 5]));
        let last = info(&views[19]);
        assert_eq!(last.current_index(), 19);
        assert!(last.is_last());
        assert_eq!(last.output_shape(), vec![1, 20, 5, 5]);
        assert_eq!(last.slice_in_current_iteration().slices()[1], Slice::single(19));
        assert_eq!(last.slice_in_output_space().slices()[1], Slice::single(19));
        assert_eq!(last.slice_in_output_space().slices()[2], Slice::full(5));

        let mut whole = SliceViewIterator::new(array, &sampling, &[1, 2, 3]).unwrap();
        assert_eq!(whole.total(), 1);
        let view = whole.next().unwrap().unwrap();
        assert_eq!(view.squeeze().unwrap().shape(), &[20, 5, 5]);
        assert!(whole.next().is_none());
    }

    #[test]
    fn slice_view_iterator_values() {
        let data = RealizedArray::from_elements(vec![3, 4], &(0..12).collect::<Vec<i32>>()).unwrap();
        let array = LazyArray::new("data", DataType::Int32, vec![3, 4], Arc::new(MemoryLoader::new(data)));
        let sampling = parse_slices(":,::-2").unwrap();
        let mut columns = SliceViewIterator::new(array, &sampling, &[0]).unwrap();
        let values = columns
            .by_ref()
            .map(|view| view.unwrap().realize().unwrap().to_elements::<i32>().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(values, vec![vec![3, 7, 11], vec![1, 5, 9]]);
        assert!(!columns.has_next());

        columns.reset();
        assert_eq!(columns.current_index(), 0);
        assert_eq!(columns.count(), 2);
    }

    #[test]
    fn slice_view_iterator_strips_inherited_info() {
        let mut array = zeros(vec![2, 3]);
        let sampling = SliceND::full(&[2, 3]);
        array.add_metadata(SliceInfo::new(sampling.clone(), sampling.clone(), sampling, vec![], 1, 7));
        for view in SliceViewIterator::new(array, &[], &[1]).unwrap() {
            let view = view.unwrap();
            let infos = view.metadata_of_kind(SliceInfo::KIND);
            assert_eq!(infos.len(), 1);
            assert_eq!(info(&view).total(), 2);
        }
    }

    #[test]
    fn slice_view_iterator_invalid() {
        assert!(matches!(
            SliceViewIterator::new(zeros(vec![2, 3]), &[], &[2]),
            Err(IterationError::InvalidDataAxis { axis: 2, rank: 2 })
        ));
        assert!(matches!(
            SliceViewIterator::new(zeros(vec![2, 3]), &parse_slices(":").unwrap(), &[]),
            Err(IterationError::Slice(_))
        ));
    }

    #[derive(Debug)]
    struct GrowingRows {
        calls: AtomicU64,
        rows: u64,
        completes: bool,
    }

    impl ShapeRefresher for GrowingRows {
        fn current_shape(&self) -> Result<ArrayShape, LoadError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![calls.min(self.rows), 3])
        }

        fn is_complete(&self) -> bool {
            self.completes && self.calls.load(Ordering::SeqCst) >= self.rows
        }
    }

    fn growing(rows: u64, completes: bool, clock: Arc<ManualClock>) -> SliceViewIterator {
        let refresher = GrowingRows {
            calls: AtomicU64::new(0),
            rows,
            completes,
        };
        let source = DynamicLazyArray::new_dynamic(
            zeros(vec![0, 3]),
            Arc::new(refresher),
            vec![UNLIMITED, 3],
        )
        .unwrap();
        let options = IterationOptions {
            timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
            clock,
            cancellation: CancellationToken::new(),
        };
        SliceViewIterator::new(source, &[], &[1])
            .unwrap()
            .with_options(options)
    }

    #[test]
    fn slice_view_iterator_dynamic_timeout() {
        let clock = Arc::new(ManualClock::new());
        let mut iterator = growing(3, false, clock.clone());
        assert_eq!(iterator.total(), -1);
        let views = iterator.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(info(&views[0]).total(), -1);
        assert_eq!(clock.sleeps(), 10);
        assert_eq!(clock.now(), Duration::from_millis(1000));
        assert!(!iterator.has_next());
        assert_eq!(clock.sleeps(), 10);
    }

    #[test]
    fn slice_view_iterator_dynamic_complete() {
        let clock = Arc::new(ManualClock::new());
        let mut iterator = growing(3, true, clock.clone());
        assert_eq!(iterator.by_ref().count(), 3);
        assert_eq!(clock.sleeps(), 0);
        assert_eq!(iterator.total(), 3);
    }

    #[test]
    fn slice_view_iterator_cancelled() {
        let clock = Arc::new(ManualClock::new());
        let iterator = growing(3, false, clock.clone());
        iterator.options().cancellation.cancel();
        let mut iterator = iterator;
        assert!(!iterator.has_next());
        assert_eq!(clock.sleeps(), 0);
        assert_eq!(iterator.current_index(), 0);
    }
}
