//! Exponential backoff with jitter.
//!
//! The retry loop itself lives in [`crate::client`]; this module only decides
//! how long to wait before attempt `n + 1`. Delays follow
//! `base_delay * 2^attempt`, capped at `max_delay`, with jitter applied on top.
//! Server-provided `Retry-After` hints take precedence, bounded by
//! `max_retry_after`.

use std::time::Duration;

use crate::config::ConnectionConfig;

/// Jitter strategy for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Full jitter: random value between 0 and calculated delay
    Full,
    /// Equal jitter: half delay + random half
    #[default]
    Equal,
}

/// Backoff policy for one transport client
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Jitter applied to computed delays
    pub jitter: JitterStrategy,
    /// Ceiling for server-provided retry-after hints
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: JitterStrategy::Equal,
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_retry_after(mut self, ceiling: Duration) -> Self {
        self.max_retry_after = ceiling;
        self
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Un-jittered exponential delay for a 0-based attempt index
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(30) as i32;
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    /// Delay before retrying after a failure on `attempt`
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_retry_after);
        }
        self.apply_jitter(self.base_delay_for(attempt))
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                let jitter = rand::random::<f64>();
                Duration::from_secs_f64(delay.as_secs_f64() * jitter)
            }
            JitterStrategy::Equal => {
                let jitter = rand::random::<f64>();
                let half = delay.as_secs_f64() / 2.0;
                Duration::from_secs_f64(half + half * jitter)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: JitterStrategy::None,
            max_retry_after: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let policy = policy();
        assert_eq!(policy.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3, None), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(20, None), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_after_hint_wins_but_is_bounded() {
        let policy = policy();
        assert_eq!(policy.delay_for(0, Some(Duration::from_secs(3))), Duration::from_secs(3));
        assert_eq!(policy.delay_for(0, Some(Duration::from_secs(600))), Duration::from_secs(10));
    }

    #[test]
    fn test_equal_jitter_stays_in_upper_half() {
        let policy = policy().with_jitter(JitterStrategy::Equal);
        for _ in 0..50 {
            let delay = policy.delay_for(2, None);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_should_retry_budget() {
        let policy = RetryPolicy {
            max_retries: 3,
            ..policy()
        };
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
