//! Global configuration options.

use std::{sync::OnceLock, time::Duration};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the nxlazy crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// # Iteration Configuration Options
///
/// ## Iteration Timeout
/// > default: `50000` milliseconds
///
/// The default time a [`SliceViewIterator`](crate::iteration::SliceViewIterator) waits for a growing dataset to produce its next slice.
///
/// ## Iteration Poll Divisor
/// > default: `50`
///
/// The default poll interval of a [`SliceViewIterator`](crate::iteration::SliceViewIterator) is the iteration timeout divided by this value.
/// A divisor of zero is treated as one.
///
/// # Storage Configuration Options
///
/// ## Default Chunk Elements
/// > default: `1048576`
///
/// The number of elements per chunk used when a [`DatasetBuilder`](crate::storage::DatasetBuilder) has no explicit chunk shape.
/// Chunks cover whole trailing axes first.
#[derive(Debug, Clone)]
pub struct Config {
    iteration_timeout: Duration,
    iteration_poll_divisor: u32,
    default_chunk_elements: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iteration_timeout: Duration::from_millis(50_000),
            iteration_poll_divisor: 50,
            default_chunk_elements: 1 << 20,
        }
    }
}

impl Config {
    /// Get the [iteration timeout](#iteration-timeout) configuration.
    #[must_use]
    pub fn iteration_timeout(&self) -> Duration {
        self.iteration_timeout
    }

    /// Set the [iteration timeout](#iteration-timeout) configuration.
    pub fn set_iteration_timeout(&mut self, timeout: Duration) {
        self.iteration_timeout = timeout;
    }

    /// Get the [iteration poll divisor](#iteration-poll-divisor) configuration.
    #[must_use]
    pub fn iteration_poll_divisor(&self) -> u32 {
        self.iteration_poll_divisor
    }

    /// Set the [iteration poll divisor](#iteration-poll-divisor) configuration.
    pub fn set_iteration_poll_divisor(&mut self, divisor: u32) {
        self.iteration_poll_divisor = divisor;
    }

    /// Return the poll interval implied by the [iteration timeout](#iteration-timeout) and [iteration poll divisor](#iteration-poll-divisor).
    #[must_use]
    pub fn iteration_poll_interval(&self) -> Duration {
        self.iteration_timeout / self.iteration_poll_divisor.max(1)
    }

    /// Get the [default chunk elements](#default-chunk-elements) configuration.
    #[must_use]
    pub fn default_chunk_elements(&self) -> u64 {
        self.default_chunk_elements
    }

    /// Set the [default chunk elements](#default-chunk-elements) configuration.
    pub fn set_default_chunk_elements(&mut self, elements: u64) {
        self.default_chunk_elements = elements.max(1);
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global nxlazy configuration.
///
/// Holding the returned guard blocks [`global_config_mut`] on other threads.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).read()
}

/// Returns a mutable reference to the global nxlazy configuration.
///
/// This deadlocks if the current thread already holds the global config.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default())).write()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.iteration_timeout(), Duration::from_secs(50));
        assert_eq!(config.iteration_poll_divisor(), 50);
        assert_eq!(config.iteration_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.default_chunk_elements(), 1_048_576);
    }

    #[test]
    fn config_poll_divisor_zero() {
        let mut config = Config::default();
        config.set_iteration_timeout(Duration::from_millis(300));
        config.set_iteration_poll_divisor(0);
        assert_eq!(config.iteration_poll_interval(), Duration::from_millis(300));
        config.set_iteration_poll_divisor(3);
        assert_eq!(config.iteration_poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn config_global() {
        let elements = global_config().default_chunk_elements();
        global_config_mut().set_default_chunk_elements(elements);
        assert_eq!(global_config().default_chunk_elements(), elements);
    }
}
