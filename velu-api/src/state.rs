use queue_core::Queue;

use crate::apikey::ApiKeys;
use crate::rate_limit::BucketLimiter;
use crate::recent::RecentRing;
use crate::task_log::TaskLogSink;

/// Everything a handler or middleware needs. Routes hold `State<Arc<AppState>>`, so this
/// type itself doesn't need to be `Clone` — built once at startup in `server::app`; tests
/// construct a fresh one per case rather than reaching for a global singleton (see the design
/// notes' `Engine` guidance).
pub struct AppState {
    pub queue: Queue,
    pub recent: RecentRing,
    pub task_log: TaskLogSink,
    pub api_keys: ApiKeys,
    pub rate_limiter: BucketLimiter,
    pub max_request_bytes: usize,
    pub liveness: health::HealthHandle,
}
