//! Configuration for replication

use std::time::Duration;

/// Configuration for the per-collection replicators
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause between replication cycles once caught up
    pub poll_interval: Duration,
    /// Maximum number of changes moved per pull or push request
    pub batch_size: usize,
    /// Backoff applied after a failed cycle
    pub retry: RetryConfig,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 100,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Backoff between failed cycles.
///
/// Replication retries forever; there is no attempt limit.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before the next cycle after `failures` consecutive failures
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(failures.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryConfig::default()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500));

        assert_eq!(retry.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_batch_size_is_at_least_one() {
        assert_eq!(SyncConfig::new().with_batch_size(0).batch_size, 1);
    }
}
