use std::{
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use super::CancellationToken;

/// The longest a [`SystemClock`] sleeps between checks of a cancellation token.
const CANCELLATION_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// A monotonic clock which can sleep.
///
/// The poll loop of a [`SliceViewIterator`](super::SliceViewIterator) measures its deadline and waits through a clock, so tests can substitute a [`ManualClock`].
pub trait Clock: Send + Sync + Debug {
    /// Return the time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);

    /// Block for `duration`, returning early once `cancellation` is cancelled.
    fn sleep_cancellable(&self, duration: Duration, cancellation: &CancellationToken) {
        if !cancellation.is_cancelled() {
            self.sleep(duration);
        }
    }
}

/// The system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a system clock with its origin at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn sleep_cancellable(&self, duration: Duration, cancellation: &CancellationToken) {
        let wake = Instant::now() + duration;
        while !cancellation.is_cancelled() {
            let now = Instant::now();
            if now >= wake {
                return;
            }
            std::thread::sleep((wake - now).min(CANCELLATION_CHECK_INTERVAL));
        }
    }
}

/// A clock which only moves when told to.
///
/// Sleeping advances the clock by the requested duration and returns immediately.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
    sleeps: AtomicU64,
}

impl ManualClock {
    /// Create a manual clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Return the number of times [`sleep`](Clock::sleep) has been called.
    #[must_use]
    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}
