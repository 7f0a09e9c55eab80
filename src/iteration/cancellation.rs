use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A shared flag asking a blocked [`SliceViewIterator`](super::SliceViewIterator) to stop waiting.
///
/// Clones share the flag, so a token may be cancelled from another thread while an iterator polls.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token which has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel. This cannot be undone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true if [`cancel`](CancellationToken::cancel) has been called on this token or a clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        std::thread::spawn(move || token.cancel()).join().unwrap();
        assert!(clone.is_cancelled());
    }
}
