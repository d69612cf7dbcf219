//! Retry backoff policy for throttled and transient calls.
//!
//! Kept free of any network concern so the policy is testable in
//! isolation from the scan and write loops that apply it.

use std::time::Duration;

use rand::Rng;

const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_BASE_MS: u64 = 100;
const DEFAULT_CAP_MS: u64 = 20_000;

/// Capped exponential backoff with jitter.
///
/// The delay window doubles per attempt up to `cap`; the actual delay
/// is drawn uniformly from the upper half of the window so retries
/// across workers do not synchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per page or batch before escalating to a failure.
    pub max_attempts: u32,
    /// Delay window for the first retry.
    pub base: Duration,
    /// Upper bound on the delay window.
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: Duration::from_millis(DEFAULT_BASE_MS),
            cap: Duration::from_millis(DEFAULT_CAP_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let window = self.window_ms(attempt);
        let floor = window / 2;
        let jittered = floor + rand::rng().random_range(0..=window - floor);
        Duration::from_millis(jittered)
    }

    /// Whether `attempt` retries exhaust the budget.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    fn window_ms(&self, attempt: u32) -> u64 {
        let base_ms = self.base.as_millis().min(u128::from(u64::MAX)) as u64;
        let cap_ms = self.cap.as_millis().min(u128::from(u64::MAX)) as u64;
        let shift = attempt.saturating_sub(1).min(63);
        base_ms
            .saturating_mul(1u64.checked_shl(shift).unwrap_or(u64::MAX))
            .min(cap_ms)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_within_base_window() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(50), "got {delay:?}");
            assert!(delay <= Duration::from_millis(100), "got {delay:?}");
        }
    }

    #[test]
    fn test_window_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.window_ms(1), 100);
        assert_eq!(policy.window_ms(2), 200);
        assert_eq!(policy.window_ms(3), 400);
        assert_eq!(policy.window_ms(4), 800);
    }

    #[test]
    fn test_window_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.window_ms(20), 20_000);
        let delay = policy.delay_for(20);
        assert!(delay <= Duration::from_millis(20_000));
        assert!(delay >= Duration::from_millis(10_000));
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.window_ms(u32::MAX), 20_000);
    }

    #[test]
    fn test_exhausted() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        assert!(!policy.exhausted(2));
        assert!(policy.exhausted(3));
        assert!(policy.exhausted(4));
    }
}
