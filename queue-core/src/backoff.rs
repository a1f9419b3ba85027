//! Exponential backoff with jitter for scheduling retries via `next_run_at`.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: i64,
    pub base: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(2),
        }
    }
}

/// `backoff(n) = base * 2^n + uniform(0, 0.25 * base * 2^n)`.
///
/// `attempt` is the number of attempts already made (0 for the first failure). Jitter
/// spreads retries out after a broad transient outage instead of herding them back onto
/// the queue at the same instant.
pub fn backoff(config: &RetryConfig, attempt: i64) -> Duration {
    let exponent = attempt.clamp(0, 32) as u32;
    let scaled = config.base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
    let jitter_ceiling = scaled.mul_f64(0.25);
    let jitter = if jitter_ceiling.is_zero() {
        Duration::ZERO
    } else {
        let millis = rand::thread_rng().gen_range(0..=jitter_ceiling.as_millis().max(1));
        Duration::from_millis(millis as u64)
    };
    scaled + jitter
}
