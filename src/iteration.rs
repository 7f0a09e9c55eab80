//! Slice iteration.
//!
//! A [`SliceViewIterator`] walks a region of a lazy array one view at a time, stepping along every axis except the chosen *data axes*, which are kept whole in each view.
//! Every view carries a [`SliceInfo`] describing where it came from.
//!
//! Iteration over a [`DynamicLazyArray`](crate::array::DynamicLazyArray) which is still growing waits for more data.
//! The wait is bounded by the [`IterationOptions`]: the source is polled every `poll_interval` until `timeout` elapses, the source completes, or the [`CancellationToken`] is cancelled.
//! The defaults come from the [global configuration](crate::config::global_config).

mod cancellation;
mod clock;
mod slice_info;
mod slice_view_iterator;

use std::{sync::Arc, time::Duration};

use thiserror::Error;

pub use cancellation::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use slice_info::SliceInfo;
pub use slice_view_iterator::SliceViewIterator;

use crate::{array::ArrayError, config::global_config, slice::SliceError};

/// An iteration error.
#[derive(Debug, Error)]
pub enum IterationError {
    /// A data axis is not an axis of the source.
    #[error("data axis {axis} is out of range for an array of rank {rank}")]
    InvalidDataAxis {
        /// The data axis.
        axis: usize,
        /// The rank of the source.
        rank: usize,
    },
    /// The sampling region is invalid.
    #[error(transparent)]
    Slice(#[from] SliceError),
    /// A view could not be created.
    #[error(transparent)]
    Array(#[from] ArrayError),
}

/// Options controlling how long a [`SliceViewIterator`] waits for a growing source.
#[derive(Clone, Debug)]
pub struct IterationOptions {
    /// The longest time to wait for the source to grow.
    pub timeout: Duration,
    /// The time between two polls of the source shape.
    pub poll_interval: Duration,
    /// The clock measuring the timeout.
    pub clock: Arc<dyn Clock>,
    /// Stops the wait when cancelled.
    pub cancellation: CancellationToken,
}

impl Default for IterationOptions {
    fn default() -> Self {
        let config = global_config();
        Self {
            timeout: config.iteration_timeout(),
            poll_interval: config.iteration_poll_interval(),
            clock: Arc::new(SystemClock::new()),
            cancellation: CancellationToken::new(),
        }
    }
}

impl IterationOptions {
    /// Set the timeout, and a poll interval of `timeout` divided by the [configured poll divisor](crate::config::Config#iteration-poll-divisor).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.poll_interval = timeout / global_config().iteration_poll_divisor().max(1);
        self
    }

    /// Set the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}
