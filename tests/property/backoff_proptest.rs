//! Property-based tests for the reconnect schedule

use proptest::prelude::*;
use std::time::Duration;

use roadrescue_live::backend::feed::BackoffPolicy;

proptest! {
    #[test]
    fn test_delays_non_decreasing_and_capped(
        base_ms in 1u64..5_000,
        extra_ms in 0u64..120_000,
        attempts in 1usize..64,
    ) {
        let policy = BackoffPolicy::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(base_ms + extra_ms),
        );
        let delays: Vec<Duration> = policy.delays().take(attempts).collect();

        prop_assert_eq!(delays[0], policy.base());
        for pair in delays.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for delay in &delays {
            prop_assert!(*delay <= policy.cap());
        }
    }

    #[test]
    fn test_delay_formula(base_ms in 1u64..2_000, attempt in 0u32..40) {
        let policy = BackoffPolicy::new(Duration::from_millis(base_ms), Duration::from_secs(10));
        let expected = Duration::from_millis(base_ms)
            .checked_mul(2u32.saturating_pow(attempt))
            .map_or(policy.cap(), |d| d.min(policy.cap()));
        prop_assert_eq!(policy.delay(attempt), expected);
    }
}
