use std::time::Duration;

use proptest::prelude::*;

use dynocopy_engine::backoff::RetryPolicy;
use dynocopy_engine::plan_segments;

proptest! {
    #[test]
    fn segments_partition_the_scan_space(parallelism in 1u32..256) {
        let segments = plan_segments(parallelism).unwrap();
        prop_assert_eq!(segments.len(), parallelism as usize);
        for (i, segment) in segments.iter().enumerate() {
            prop_assert_eq!(segment.index, i as u32);
            prop_assert_eq!(segment.total, parallelism);
        }
    }

    #[test]
    fn backoff_delay_stays_within_the_window(
        attempt in 1u32..40,
        base_ms in 1u64..500,
        cap_ms in 1u64..30_000,
    ) {
        let policy = RetryPolicy {
            max_attempts: 10,
            base: Duration::from_millis(base_ms),
            cap: Duration::from_millis(cap_ms),
        };

        let window = base_ms
            .saturating_mul(1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX))
            .min(cap_ms)
            .max(1);
        let delay = policy.delay_for(attempt);

        prop_assert!(delay <= Duration::from_millis(window));
        prop_assert!(delay >= Duration::from_millis(window / 2));
    }

    #[test]
    fn retry_budget_is_monotonic(max_attempts in 1u32..20, attempt in 0u32..40) {
        let policy = RetryPolicy {
            max_attempts,
            ..RetryPolicy::default()
        };
        prop_assert_eq!(policy.exhausted(attempt), attempt >= max_attempts);
        if policy.exhausted(attempt) {
            prop_assert!(policy.exhausted(attempt + 1));
        }
    }
}
