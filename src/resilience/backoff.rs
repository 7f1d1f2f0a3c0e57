//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::resilience::policy::CallPolicy;

/// Deterministic part of the delay before attempt `attempt + 1`.
///
/// `min(cap, base * multiplier^(attempt - 1))`; attempt 0 yields no delay.
pub fn base_delay(policy: &CallPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let cap = policy.backoff_cap();
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let scaled = policy.backoff_base().as_nanos() as f64 * policy.backoff_multiplier().powi(exponent);

    // Overflowing schedules saturate at the cap.
    if !scaled.is_finite() || scaled >= cap.as_nanos() as f64 {
        return cap;
    }

    Duration::from_nanos(scaled.round() as u64).min(cap)
}

/// Full delay before attempt `attempt + 1`: the base delay plus a uniform
/// jitter in `[0, policy.jitter()]`.
pub fn calculate_backoff(policy: &CallPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let jitter_nanos = u64::try_from(policy.jitter().as_nanos()).unwrap_or(u64::MAX);
    let jitter = if jitter_nanos > 0 {
        Duration::from_nanos(rand::thread_rng().gen_range(0..=jitter_nanos))
    } else {
        Duration::ZERO
    };

    base_delay(policy, attempt).saturating_add(jitter)
}
