//! Rolling health counters shared by adapters.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU32, Ordering};

use omnihub_domain::error::DeviceError;
use omnihub_domain::health::HealthStatus;
use omnihub_domain::platform::Platform;
use omnihub_domain::time::{Timestamp, now};

/// Consecutive-failure count (reset on success) and last-success time.
#[derive(Debug, Default)]
pub struct HealthTracker {
    errors: AtomicU32,
    last_success: Mutex<Option<Timestamp>>,
}

impl HealthTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.errors.store(0, Ordering::Relaxed);
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(now());
    }

    pub fn record_failure(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of an operation and pass it through.
    ///
    /// # Errors
    ///
    /// Returns `result` unchanged.
    pub fn observe<T>(&self, result: Result<T, DeviceError>) -> Result<T, DeviceError> {
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn last_success(&self) -> Option<Timestamp> {
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach the rolling history to a health check result.
    #[must_use]
    pub fn annotate(&self, status: HealthStatus) -> HealthStatus {
        status.with_history(self.error_count(), self.last_success())
    }

    /// Clear history, e.g. on dispose.
    pub fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn healthy(&self, platform: Platform) -> HealthStatus {
        self.annotate(HealthStatus::healthy(platform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_count_failures_until_next_success() {
        let tracker = HealthTracker::new();
        tracker.record_failure();
        tracker.record_failure();
        assert_eq!(tracker.error_count(), 2);
        assert!(tracker.last_success().is_none());

        tracker.record_success();
        assert_eq!(tracker.error_count(), 0);
        assert!(tracker.last_success().is_some());
    }

    #[test]
    fn should_observe_results_without_changing_them() {
        let tracker = HealthTracker::new();
        let err: Result<(), _> = tracker.observe(Err(DeviceError::network("down")));
        assert!(err.is_err());
        assert_eq!(tracker.error_count(), 1);
    }

    #[test]
    fn should_annotate_status_with_history() {
        let tracker = HealthTracker::new();
        tracker.record_failure();
        let status = tracker.healthy(Platform::Lutron);
        assert_eq!(status.error_count, 1);
        assert!(status.healthy);
    }
}
