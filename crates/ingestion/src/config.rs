//! Read-retry backoff and ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::ReadRetryConfig;

/// Exponential backoff between retries of transient read errors
#[derive(Debug, Clone)]
pub struct ReadBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    /// 0 = retry forever
    max_consecutive_errors: u32,
    current: Duration,
    consecutive_errors: u32,
}

impl ReadBackoff {
    pub fn new(config: &ReadRetryConfig) -> Self {
        let initial = Duration::from_millis(config.initial_backoff_ms);
        Self {
            initial,
            max: Duration::from_millis(config.max_backoff_ms).max(initial),
            multiplier: config.multiplier.max(1.0),
            max_consecutive_errors: config.max_consecutive_errors,
            current: initial,
            consecutive_errors: 0,
        }
    }

    /// Register one more failure
    ///
    /// Returns the delay before the next read, or `None` once the
    /// consecutive error limit is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.consecutive_errors += 1;
        if self.max_consecutive_errors > 0 && self.consecutive_errors >= self.max_consecutive_errors {
            return None;
        }
        let delay = self.current;
        // Saturates at `max` when the product does not fit a Duration
        let grown = self.current.as_secs_f64() * self.multiplier;
        self.current = Duration::try_from_secs_f64(grown).map_or(self.max, |d| d.min(self.max));
        Some(delay)
    }

    /// A read succeeded
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.consecutive_errors = 0;
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Records read from the source topic
    pub records_read: AtomicU64,

    /// Records that could not be classified
    pub decode_failures: AtomicU64,

    /// Read errors, transient or not
    pub read_errors: AtomicU64,

    /// Offset commits that failed
    pub commit_failures: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_read: self.records_read.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_read: u64,
    pub decode_failures: u64,
    pub read_errors: u64,
    pub commit_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_config(max_consecutive_errors: u32) -> ReadRetryConfig {
        ReadRetryConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            multiplier: 2.0,
            max_consecutive_errors,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = ReadBackoff::new(&retry_config(0));
        let delays: Vec<u64> = (0..4)
            .map(|_| backoff.next_delay().unwrap().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 350, 350]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_huge_multiplier_saturates_at_max() {
        for multiplier in [1e30, f64::INFINITY, f64::MAX] {
            let mut backoff = ReadBackoff::new(&ReadRetryConfig {
                multiplier,
                ..retry_config(0)
            });
            assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
            assert_eq!(backoff.next_delay(), Some(Duration::from_millis(350)));
            assert_eq!(backoff.next_delay(), Some(Duration::from_millis(350)));
        }
    }

    #[test]
    fn test_backoff_gives_up_at_limit() {
        let mut backoff = ReadBackoff::new(&retry_config(3));
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.consecutive_errors(), 3);
    }
}
