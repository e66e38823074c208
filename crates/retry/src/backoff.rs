use std::time::Duration;

/// Capped exponential backoff: `min(base * 2^(k-1), max)` before attempt
/// `k + 1`, where `k` is the attempt that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl BackoffPolicy {
    /// Delay to sleep after attempt `attempt` (1-based) has failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4_000));
        assert_eq!(policy.delay_after(5), Duration::from_millis(16_000));
        assert_eq!(policy.delay_after(6), Duration::from_millis(30_000));
        assert_eq!(policy.delay_after(7), Duration::from_millis(30_000));
    }

    #[test]
    fn delays_are_non_decreasing_and_capped() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..64 {
            let delay = policy.delay_after(attempt);
            assert!(delay >= previous, "delay must not shrink across attempts");
            assert!(delay <= Duration::from_millis(policy.max_delay_ms));
            previous = delay;
        }
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let policy = BackoffPolicy {
            base_delay_ms: u64::MAX,
            max_delay_ms: u64::MAX,
        };
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_millis(u64::MAX));
    }
}
