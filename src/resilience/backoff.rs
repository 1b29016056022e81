//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Backoff schedule between failover rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: secs(config.base_delay_secs),
            max_delay: secs(config.max_delay_secs),
            exponential_base: config.exponential_base,
            jitter: config.jitter,
        }
    }

    /// Delay after the 0-based `attempt`.
    ///
    /// `min(base * exponential_base^attempt, max)`, scaled by a random factor in
    /// `[0.5, 1.0]` when jitter is enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());

        let seconds = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped
        };

        secs(seconds)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_backoff_without_jitter() {
        let p = policy(false);
        assert_eq!(p.delay(0), Duration::from_secs(1));
        assert_eq!(p.delay(1), Duration::from_secs(2));
        assert_eq!(p.delay(2), Duration::from_secs(4));
        assert_eq!(p.delay(10), Duration::from_secs(60));
        assert_eq!(p.delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_non_decreasing_and_capped() {
        let p = policy(false);
        let delays: Vec<Duration> = (0..12).map(|a| p.delay(a)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= p.max_delay));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let p = policy(true);
        for attempt in 0..8 {
            let unjittered = policy(false).delay(attempt);
            for _ in 0..50 {
                let d = p.delay(attempt);
                assert!(d <= unjittered);
                assert!(d.as_secs_f64() >= unjittered.as_secs_f64() * 0.5 - 1e-9);
            }
        }
    }

    #[test]
    fn test_from_config() {
        let p = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            base_delay_secs: 0.5,
            max_delay_secs: 4.0,
            exponential_base: 3.0,
            jitter: false,
        });
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.delay(0), Duration::from_millis(500));
        assert_eq!(p.delay(1), Duration::from_millis(1500));
        assert_eq!(p.delay(2), Duration::from_secs(4));
    }
}
