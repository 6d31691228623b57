//! Run-wide tracking of failed list pages
//!
//! A failed page only aborts the worker's current iteration. When failures
//! pile up (too many in total, or too many in a row across all workers) the
//! tracker tells the caller to stop the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::constants::LISTING_ERROR_MESSAGES_KEPT;

#[derive(Clone)]
pub struct ListingErrorTracker {
    total_errors: Arc<AtomicU64>,
    consecutive_errors: Arc<AtomicU64>,
    max_total_errors: u64,
    max_consecutive_errors: u64,
    error_messages: Arc<Mutex<Vec<String>>>,
}

impl ListingErrorTracker {
    /// A threshold of 0 disables that check
    pub fn with_thresholds(max_total: u64, max_consecutive: u64) -> Self {
        Self {
            total_errors: Arc::new(AtomicU64::new(0)),
            consecutive_errors: Arc::new(AtomicU64::new(0)),
            max_total_errors: max_total,
            max_consecutive_errors: max_consecutive,
            error_messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record a successful page (resets the consecutive counter)
    pub fn record_success(&self) {
        self.consecutive_errors.store(0, Ordering::Relaxed);
    }

    /// Record a failed page.
    /// Returns: (should_abort, total_errors, consecutive_errors)
    pub fn record_error(&self, error_msg: &str) -> (bool, u64, u64) {
        let total = self.total_errors.fetch_add(1, Ordering::Relaxed) + 1;
        let consecutive = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut errors = self.error_messages.lock();
            if errors.len() < LISTING_ERROR_MESSAGES_KEPT {
                errors.push(error_msg.to_string());
            }
        }

        let over_total = self.max_total_errors > 0 && total >= self.max_total_errors;
        let over_consecutive =
            self.max_consecutive_errors > 0 && consecutive >= self.max_consecutive_errors;

        (over_total || over_consecutive, total, consecutive)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    /// The first failure messages, in recording order
    pub fn error_messages(&self) -> Vec<String> {
        self.error_messages.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_threshold() {
        let tracker = ListingErrorTracker::with_thresholds(100, 3);
        assert!(!tracker.record_error("e1").0);
        assert!(!tracker.record_error("e2").0);
        tracker.record_success();
        assert!(!tracker.record_error("e3").0);
        assert!(!tracker.record_error("e4").0);
        let (abort, total, consecutive) = tracker.record_error("e5");
        assert!(abort);
        assert_eq!((total, consecutive), (5, 3));
    }

    #[test]
    fn test_total_threshold_and_messages() {
        let tracker = ListingErrorTracker::with_thresholds(2, 0);
        assert!(!tracker.record_error("a").0);
        tracker.record_success();
        assert!(tracker.record_error("b").0);
        assert_eq!(tracker.error_messages(), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_disables_thresholds() {
        let tracker = ListingErrorTracker::with_thresholds(0, 0);
        for i in 0..50 {
            assert!(!tracker.record_error(&format!("e{}", i)).0);
        }
        assert_eq!(tracker.total_errors(), 50);
        assert_eq!(tracker.error_messages().len(), LISTING_ERROR_MESSAGES_KEPT);
    }
}
