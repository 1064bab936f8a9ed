use std::time::Duration;

use crate::config::RetryConfig;

/// Exponential backoff with a cap, used to space out repeated failures of
/// the same job (e.g. status polls that keep erroring).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        let max_delay = Duration::from_secs(cfg.max_delay_secs);
        // Too large for a Duration: the cap applies anyway.
        let base_delay = if cfg.base_delay_secs.is_finite() && cfg.base_delay_secs > 0.0 {
            Duration::try_from_secs_f64(cfg.base_delay_secs).unwrap_or(max_delay)
        } else {
            Duration::ZERO
        };
        Self {
            base_delay,
            max_delay,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits (tests, manual runs).
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// `failures` is 1-based: the first failure waits `base_delay`.
    pub fn backoff(&self, failures: u32) -> Duration {
        // base * 2^(failures-1), capped.
        let exp = 1u32 << failures.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = RetryPolicy {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(p.backoff(1), Duration::from_millis(250));
        assert_eq!(p.backoff(2), Duration::from_millis(500));
        assert_eq!(p.backoff(3), Duration::from_secs(1));
        assert!(p.backoff(4) >= p.backoff(3));
        assert_eq!(p.backoff(20), p.max_delay);
        assert_eq!(p.backoff(u32::MAX), p.max_delay);
    }

    #[test]
    fn zero_failures_behaves_like_first() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(0), p.backoff(1));
    }

    #[test]
    fn immediate_never_waits() {
        let p = RetryPolicy::immediate();
        assert_eq!(p.backoff(1), Duration::ZERO);
        assert_eq!(p.backoff(10), Duration::ZERO);
    }

    #[test]
    fn from_config() {
        let cfg = RetryConfig {
            base_delay_secs: 0.5,
            max_delay_secs: 15,
        };
        let p = RetryPolicy::from(&cfg);
        assert_eq!(p.base_delay, Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_secs(15));

        let bad = RetryConfig {
            base_delay_secs: -1.0,
            max_delay_secs: 15,
        };
        assert_eq!(RetryPolicy::from(&bad).base_delay, Duration::ZERO);
    }

    #[test]
    fn huge_base_delay_is_capped() {
        let cfg = RetryConfig {
            base_delay_secs: 1e30,
            max_delay_secs: 300,
        };
        let p = RetryPolicy::from(&cfg);
        assert_eq!(p.base_delay, Duration::from_secs(300));
        assert_eq!(p.backoff(1), Duration::from_secs(300));
        assert_eq!(p.backoff(5), Duration::from_secs(300));
    }
}
