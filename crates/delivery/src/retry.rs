use std::time::Duration;

use async_trait::async_trait;

/// Per-subscription retry policy: up to `max_attempts` sends, sleeping
/// `base_delay × 2^(n-1)` after the n-th transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the `attempt`-th failure (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Where the publisher waits between attempts.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer. Dropping the publish future (e.g. the caller
/// disconnected) cancels the wait and the remaining attempts.
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_doubles_from_500ms() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (1..policy.max_attempts)
            .map(|a| policy.delay_after(a).as_millis())
            .collect();
        assert_eq!(delays, vec![
            500, 1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 64_000, 128_000
        ]);
        // Worst case across one subscription: 500ms × (2^9 − 1).
        let total: u128 = delays.iter().sum();
        assert_eq!(total, 255_500);
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_after(64) >= policy.delay_after(32));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
