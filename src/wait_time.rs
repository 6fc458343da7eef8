//! Wait-time statistics per bucket
//!
//! JoinQueue answers with an estimated wait derived from how long recent
//! pairings in the same bucket actually took. Buckets with too few samples
//! fall back to a configured default.

use crate::types::BucketKey;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Rolling statistics for one bucket
#[derive(Debug, Clone)]
pub struct WaitTimeStats {
    pub sample_count: u64,
    sum_seconds: f64,
    min_seconds: f64,
    max_seconds: f64,
}

impl Default for WaitTimeStats {
    fn default() -> Self {
        Self {
            sample_count: 0,
            sum_seconds: 0.0,
            min_seconds: f64::INFINITY,
            max_seconds: 0.0,
        }
    }
}

impl WaitTimeStats {
    pub fn add_sample(&mut self, wait: Duration) {
        let seconds = wait.as_secs_f64();
        self.sample_count += 1;
        self.sum_seconds += seconds;
        self.min_seconds = self.min_seconds.min(seconds);
        self.max_seconds = self.max_seconds.max(seconds);
    }

    pub fn mean(&self) -> Duration {
        if self.sample_count == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sum_seconds / self.sample_count as f64)
    }

    pub fn min(&self) -> Duration {
        if self.min_seconds.is_finite() {
            Duration::from_secs_f64(self.min_seconds)
        } else {
            Duration::ZERO
        }
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs_f64(self.max_seconds)
    }
}

/// Per-bucket wait-time estimator fed by match-found samples
pub struct WaitTimeEstimator {
    stats: Mutex<HashMap<BucketKey, WaitTimeStats>>,
    default_estimate: Duration,
    min_samples: u64,
}

impl WaitTimeEstimator {
    pub fn new(default_estimate: Duration, min_samples: u64) -> Self {
        Self {
            stats: Mutex::new(HashMap::new()),
            default_estimate,
            min_samples,
        }
    }

    /// Record how long a matched player actually waited
    pub fn record(&self, bucket: &BucketKey, wait: Duration) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.entry(bucket.clone()).or_default().add_sample(wait);
        }
    }

    /// Estimated wait for a newcomer to this bucket
    pub fn estimate(&self, bucket: &BucketKey) -> Duration {
        self.stats
            .lock()
            .ok()
            .and_then(|stats| {
                stats.get(bucket).and_then(|s| {
                    if s.sample_count >= self.min_samples {
                        Some(s.mean())
                    } else {
                        None
                    }
                })
            })
            .unwrap_or(self.default_estimate)
    }

    pub fn stats_for(&self, bucket: &BucketKey) -> Option<WaitTimeStats> {
        self.stats.lock().ok()?.get(bucket).cloned()
    }
}

impl Default for WaitTimeEstimator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = WaitTimeStats::default();
        stats.add_sample(Duration::from_secs(10));
        stats.add_sample(Duration::from_secs(20));

        assert_eq!(stats.sample_count, 2);
        assert_eq!(stats.mean(), Duration::from_secs(15));
        assert_eq!(stats.min(), Duration::from_secs(10));
        assert_eq!(stats.max(), Duration::from_secs(20));
    }

    #[test]
    fn test_estimator_falls_back_until_sampled() {
        let estimator = WaitTimeEstimator::new(Duration::from_secs(30), 2);
        let bucket = BucketKey::new("coin-flip", 100);

        assert_eq!(estimator.estimate(&bucket), Duration::from_secs(30));

        estimator.record(&bucket, Duration::from_secs(4));
        assert_eq!(estimator.estimate(&bucket), Duration::from_secs(30));

        estimator.record(&bucket, Duration::from_secs(8));
        assert_eq!(estimator.estimate(&bucket), Duration::from_secs(6));
    }

    #[test]
    fn test_estimates_are_per_bucket() {
        let estimator = WaitTimeEstimator::new(Duration::from_secs(30), 1);
        let fast = BucketKey::new("coin-flip", 100);
        let slow = BucketKey::new("coin-flip", 100_000);

        estimator.record(&fast, Duration::from_secs(2));
        estimator.record(&slow, Duration::from_secs(120));

        assert_eq!(estimator.estimate(&fast), Duration::from_secs(2));
        assert_eq!(estimator.estimate(&slow), Duration::from_secs(120));
    }
}
