use std::time::Duration;

use rand::Rng;

/// Backoff parameters shared by the transport's connection retries, the
/// runner's infrastructure-failure retries, and the crawler's page-level
/// retries.
///
/// The delay for attempt `k` (0-indexed) is:
///
/// ```text
/// delay = min(initial * multiplier^k, max) * (1 + jitter * U(-1, 1))
/// ```
///
/// clamped to be non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl RetryPolicy {
    /// Creates a policy with the given bounds. `jitter` is clamped to `[0, 1]`.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
        jitter: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Computes the backoff delay before the given 0-indexed attempt,
    /// applying symmetric jitter around the exponential base.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = if self.jitter > 0.0 {
            let noise = rand::thread_rng().gen_range(-1.0..=1.0);
            capped * (1.0 + self.jitter * noise)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Linear backoff used by the test runner for infrastructure-failure
    /// retries: `1s * (attempt + 1)`.
    pub fn linear_delay(attempt: u32) -> Duration {
        Duration::from_secs(u64::from(attempt) + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            multiplier: 2.0,
            max_delay: Duration::from_millis(500),
            jitter: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_geometrically_until_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(50), 2.0, Duration::from_millis(500), 0.0);
        assert_eq!(policy.delay_for(0), Duration::from_millis(50));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        // 50 * 2^4 = 800, capped at 500
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 1.0, Duration::from_millis(100), 0.5);
        for _ in 0..200 {
            let delay = policy.delay_for(0);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn jitter_is_clamped_into_unit_interval() {
        let policy = RetryPolicy::new(1, Duration::from_millis(10), 1.0, Duration::from_millis(10), 5.0);
        assert_eq!(policy.jitter, 1.0);
    }

    #[test]
    fn linear_delay_matches_runner_formula() {
        assert_eq!(RetryPolicy::linear_delay(0), Duration::from_secs(1));
        assert_eq!(RetryPolicy::linear_delay(2), Duration::from_secs(3));
    }
}
