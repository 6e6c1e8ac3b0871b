//! Poll interval backoff
//!
//! The polling loop waits `base_interval` between healthy polls. Each
//! consecutive failure doubles the wait, capped at `max_interval`:
//!
//! ```text
//! interval(N) = min(base_interval * 2^N, max_interval)
//! ```
//!
//! A success resets `N` to zero.
//!
//! # Example
//!
//! ```rust
//! use fleetmap_core::backoff::{Backoff, BackoffConfig};
//! use std::time::Duration;
//!
//! let mut backoff = Backoff::new(BackoffConfig::new(
//!     Duration::from_secs(1),
//!     Duration::from_secs(10),
//! ));
//! assert_eq!(backoff.record_failure(), Duration::from_secs(2));
//! assert_eq!(backoff.record_failure(), Duration::from_secs(4));
//! assert_eq!(backoff.record_success(), Duration::from_secs(1));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Interval between polls while healthy
    pub base_interval: Duration,
    /// Upper bound for the backed-off interval
    pub max_interval: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl BackoffConfig {
    /// Doubling backoff between `base` and `max`
    #[must_use]
    pub fn new(base_interval: Duration, max_interval: Duration) -> Self {
        Self {
            base_interval,
            max_interval,
        }
    }

    /// Interval to wait after `failures` consecutive failures
    #[must_use]
    pub fn interval_after(&self, failures: u32) -> Duration {
        2u32.checked_pow(failures)
            .and_then(|factor| self.base_interval.checked_mul(factor))
            .unwrap_or(Duration::MAX)
            .min(self.max_interval)
    }
}

/// Stateful backoff: tracks consecutive failures
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    consecutive_failures: u32,
}

impl Backoff {
    /// Start healthy (zero failures)
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Consecutive failures since the last success
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Interval to wait before the next attempt
    #[must_use]
    pub fn current_interval(&self) -> Duration {
        self.config.interval_after(self.consecutive_failures)
    }

    /// Reset after a success; returns the base interval
    pub fn record_success(&mut self) -> Duration {
        self.consecutive_failures = 0;
        self.current_interval()
    }

    /// Count a failure; returns the backed-off interval
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.current_interval()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_interval_calculation() {
        let config = BackoffConfig::new(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(config.interval_after(0), Duration::from_millis(100));
        assert_eq!(config.interval_after(1), Duration::from_millis(200));
        assert_eq!(config.interval_after(2), Duration::from_millis(400));
        assert_eq!(config.interval_after(3), Duration::from_millis(800));
    }

    #[test]
    fn test_interval_is_capped() {
        let config = BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(config.interval_after(5), Duration::from_secs(30));
        assert_eq!(config.interval_after(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = Backoff::new(BackoffConfig::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
        ));
        backoff.record_failure();
        backoff.record_failure();
        backoff.record_failure();
        assert_eq!(backoff.consecutive_failures(), 3);
        assert_eq!(backoff.current_interval(), Duration::from_secs(8));

        assert_eq!(backoff.record_success(), Duration::from_secs(1));
        assert_eq!(backoff.consecutive_failures(), 0);
    }

    #[test]
    fn test_sequence_is_exact() {
        let mut backoff = Backoff::new(BackoffConfig::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
        ));
        let waits: Vec<u64> = (0..4).map(|_| backoff.record_failure().as_millis() as u64).collect();
        assert_eq!(waits, [2_000, 4_000, 8_000, 16_000]);
    }

    proptest! {
        #[test]
        fn interval_matches_formula(base_ms in 1u64..5_000, max_ms in 1u64..600_000, n in 0u32..40) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_millis(max_ms);
            let mut backoff = Backoff::new(BackoffConfig::new(base, max));
            for _ in 0..n {
                backoff.record_failure();
            }
            let expected = base
                .checked_mul(2u32.pow(n.min(31)))
                .filter(|_| n < 32)
                .unwrap_or(Duration::MAX)
                .min(max);
            prop_assert_eq!(backoff.current_interval(), expected);
        }
    }
}
