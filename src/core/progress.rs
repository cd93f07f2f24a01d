//! Best-effort load progress.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Callback receiving `(processed, total)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Monotonic processed/total counter with an optional observer.
#[derive(Default)]
pub struct Progress {
    processed: AtomicUsize,
    total: AtomicUsize,
    callback: Option<ProgressFn>,
}

impl Progress {
    pub fn with_callback(callback: ProgressFn) -> Self {
        Self { callback: Some(callback), ..Default::default() }
    }

    pub fn reset(&self) {
        self.processed.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
    }

    /// Record `processed` of `total`. Never moves backwards.
    pub fn report(&self, processed: usize, total: usize) {
        let prev = self.processed.fetch_max(processed, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        if let Some(cb) = &self.callback {
            cb(prev.max(processed), total);
        }
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Progress({}/{})", self.processed(), self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_monotonic() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let progress = Progress::with_callback(Arc::new(move |done, _| {
            sink.store(done, Ordering::Relaxed);
        }));
        progress.report(3, 10);
        progress.report(2, 10);
        assert_eq!(progress.processed(), 3);
        assert_eq!(seen.load(Ordering::Relaxed), 3);
        progress.reset();
        assert_eq!(progress.processed(), 0);
    }
}
