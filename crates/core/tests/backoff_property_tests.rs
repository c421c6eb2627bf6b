//! Property-based tests for the overload backoff formula.
//!
//! These verify the jitter envelope and the expectation-monotonicity the
//! retry design relies on, using the `proptest` crate for random test case
//! generation.

use std::time::Duration;

use proptest::prelude::*;
use recsync_core::{backoff_delay, BackoffConfig};

fn arb_config() -> impl Strategy<Value = BackoffConfig> {
    (10u64..=1_000, 1.5f64..=5.0).prop_map(|(base_ms, growth)| BackoffConfig {
        base: Duration::from_millis(base_ms),
        growth,
    })
}

proptest! {
    /// Every sampled delay stays inside
    /// `[base, base * (1 + growth^retried)]`.
    #[test]
    fn delay_stays_inside_envelope(
        config in arb_config(),
        retried in 0i32..8,
        unit_random in 0.0f64..1.0,
    ) {
        let delay = backoff_delay(&config, retried, unit_random);
        let ceiling = config.base.mul_f64(1.0 + config.growth.powi(retried));
        prop_assert!(delay >= config.base);
        prop_assert!(delay <= ceiling);
    }

    /// For the same random draws, each additional consumed retry can only
    /// lengthen the delay, so the expected delay is non-decreasing in the
    /// retried count.
    #[test]
    fn expected_delay_is_non_decreasing_in_retried_count(
        config in arb_config(),
        samples in proptest::collection::vec(0.0f64..1.0, 100..500),
        retried in 0i32..6,
    ) {
        let mean = |n: i32| -> f64 {
            let total: f64 = samples
                .iter()
                .map(|&r| backoff_delay(&config, n, r).as_secs_f64())
                .sum();
            total / samples.len() as f64
        };
        prop_assert!(mean(retried + 1) >= mean(retried));
    }

    /// More jitter never shortens the wait.
    #[test]
    fn delay_is_monotone_in_the_random_draw(
        config in arb_config(),
        retried in 0i32..8,
        lo in 0.0f64..1.0,
        hi in 0.0f64..1.0,
    ) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        prop_assert!(
            backoff_delay(&config, retried, lo) <= backoff_delay(&config, retried, hi)
        );
    }

    /// Draws outside the unit interval are clamped rather than amplified.
    #[test]
    fn out_of_range_draws_are_clamped(
        config in arb_config(),
        retried in 0i32..8,
        wild in -10.0f64..10.0,
    ) {
        let delay = backoff_delay(&config, retried, wild);
        let ceiling = config.base.mul_f64(1.0 + config.growth.powi(retried));
        prop_assert!(delay >= config.base);
        prop_assert!(delay <= ceiling);
    }
}

#[test]
fn negative_retried_count_falls_back_to_base() {
    let config = BackoffConfig::default();
    assert_eq!(backoff_delay(&config, -3, 0.7), config.base);
}
