//! Exponential backoff with jitter.

use crate::retry::policy::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Calculate the delay before the given attempt.
///
/// Attempt 0 runs immediately. Attempt n waits
/// `min(max_delay, initial_delay * multiplier^(n-1))`, widened by up to
/// 30% jitter so synchronized callers spread back out after an outage.
pub fn backoff_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let base_ms = policy.initial_delay.as_millis() as f64;
    let exponential = base_ms * policy.backoff_multiplier.powi(attempt as i32 - 1);
    let capped_ms = exponential.min(policy.max_delay.as_millis() as f64) as u64;

    let jitter = if policy.jitter && capped_ms > 0 {
        // 0..=30% widening, never shortening: the sequence must stay
        // monotone non-decreasing in its base component
        let jitter_range = (capped_ms * 3) / 10;
        if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        }
    } else {
        0
    };

    Duration::from_millis(capped_ms + jitter)
}
