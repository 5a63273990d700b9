//! Batched progress reporting.

use std::fmt;
use std::ops::ControlFlow;

/// A point-in-time progress snapshot handed to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(processed: usize, total: usize) -> Self {
        Self { processed, total }
    }

    /// Completed fraction in `0.0..=1.0`. An empty inventory reports 1.0.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resolved {} of {} assets", self.processed, self.total)
    }
}

/// Receives batched progress updates during resolution. Returning
/// [`ControlFlow::Break`] aborts the run; the resolver then returns the
/// partial result accumulated so far instead of discarding it.
pub trait ProgressObserver {
    fn on_progress(&mut self, progress: &Progress) -> ControlFlow<()>;
}

/// Observer that ignores every update and never aborts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: &Progress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        assert_eq!(Progress::new(25, 100).fraction(), 0.25);
        assert_eq!(Progress::new(0, 0).fraction(), 1.0);
        assert_eq!(Progress::new(3, 3).fraction(), 1.0);
    }

    #[test]
    fn test_display_message() {
        let progress = Progress::new(200, 1000);
        assert_eq!(progress.to_string(), "resolved 200 of 1000 assets");
    }

    #[test]
    fn test_no_progress_never_breaks() {
        let mut observer = NoProgress;
        assert!(observer.on_progress(&Progress::new(1, 2)).is_continue());
    }
}
