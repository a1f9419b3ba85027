//! Per-bucket sliding-window rate limiting for `POST /tasks`.
//!
//! Modelled on this codebase's keyed token-bucket limiters (see `feature-flags`'s
//! `FlagsRateLimiter`/`IpRateLimiter`): a `RATE_REQUESTS`-sized burst that replenishes over
//! `RATE_WINDOW_SEC`, keyed per bucket via `governor`'s dashmap-backed keyed state store.
//! A full burst refill approximates a counting sliding window closely enough in practice,
//! without the unbounded per-bucket timestamp list a literal sliding window would need.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};

/// `None` when rate limiting is disabled (`RATE_REQUESTS<=0` or `RATE_WINDOW_SEC<=0`).
#[derive(Clone)]
pub struct BucketLimiter {
    inner: Option<Arc<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>>,
}

impl BucketLimiter {
    pub fn new(requests: u32, window: Duration) -> Self {
        let inner = NonZeroU32::new(requests).filter(|_| !window.is_zero()).map(|burst| {
            let period = window / burst.get();
            let quota = Quota::with_period(period).unwrap_or(Quota::per_second(burst)).allow_burst(burst);
            Arc::new(RateLimiter::dashmap(quota))
        });
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// `true` if the request for `bucket` is within its window.
    pub fn allow(&self, bucket: &str) -> bool {
        match &self.inner {
            None => true,
            Some(limiter) => limiter.check_key(&bucket.to_string()).is_ok(),
        }
    }
}
