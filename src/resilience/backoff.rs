//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

use crate::clock::millis;

/// Delay before the attempt after `attempt` (1-indexed) failed.
///
/// `base * 2^(attempt-1)`, capped at `max` when one is given, plus up to
/// `jitter_ratio` of that delay at random. Attempt 0 means no wait.
pub fn calculate_backoff(
    attempt: u32,
    base: Duration,
    max: Option<Duration>,
    jitter_ratio: f64,
) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential = 2u64.saturating_pow(attempt - 1);
    let delay_ms = millis(base).saturating_mul(exponential);
    let delay_ms = match max {
        Some(max) => delay_ms.min(millis(max)),
        None => delay_ms,
    };

    let jitter_range = (delay_ms as f64 * jitter_ratio.clamp(0.0, 1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_add(jitter))
}
