//! Progress reporting and cooperative cancellation for tile fetches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Returned by a progress callback to stop the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cancelled;

/// Snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    /// Tiles finished so far (present or absent).
    pub completed: usize,
    /// Tiles requested in total.
    pub total: usize,
    /// Tiles finished since the previous callback.
    pub advanced: usize,
}

impl FetchProgress {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Completed fraction in `0.0..=1.0`; an empty request counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Shareable cancellation flag.
///
/// Lets a signal handler or another task request cancellation; a progress
/// callback built with [`CancellationFlag::progress_callback`] turns the
/// flag into [`Cancelled`] at the next progress tick.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Checks the flag, then forwards progress to `inner`.
    pub fn progress_callback<F>(
        &self,
        mut inner: F,
    ) -> impl FnMut(FetchProgress) -> Result<(), Cancelled> + Send
    where
        F: FnMut(FetchProgress) + Send,
    {
        let flag = self.clone();
        move |progress| {
            if flag.is_cancelled() {
                return Err(Cancelled);
            }
            inner(progress);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let progress = FetchProgress {
            completed: 5,
            total: 20,
            advanced: 1,
        };
        assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_empty_request_is_complete() {
        let progress = FetchProgress {
            completed: 0,
            total: 0,
            advanced: 0,
        };
        assert!(progress.is_complete());
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn test_cancellation_flag_callback() {
        let flag = CancellationFlag::new();
        let mut seen = 0;
        {
            let mut callback = flag.progress_callback(|_| seen += 1);
            let progress = FetchProgress {
                completed: 1,
                total: 2,
                advanced: 1,
            };
            assert_eq!(callback(progress), Ok(()));
            flag.cancel();
            assert_eq!(callback(progress), Err(Cancelled));
        }
        assert_eq!(seen, 1);
    }
}
