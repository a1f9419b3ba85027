use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use health::HealthRegistry;
use queue_core::{Queue, Store};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::metrics_middleware::track_metrics;
use crate::rate_limit::BucketLimiter;
use crate::recent::RecentRing;
use crate::routes;
use crate::middleware as guard;
use crate::state::AppState;
use crate::task_log::TaskLogSink;

/// Builds the router. `queue` is already `init()`-ed by the caller; tests construct a queue
/// backed by an in-memory store so no file ever touches disk.
pub async fn router(config: &Config, queue: Queue) -> Router {
    let liveness = HealthRegistry::new("liveness")
        .register("http_server".to_string(), time::Duration::seconds(30))
        .await;

    let task_log = TaskLogSink::open(config.task_log_path())
        .await
        .expect("failed to open TASK_LOG sink");

    let state = Arc::new(AppState {
        queue,
        recent: RecentRing::new(),
        task_log,
        api_keys: config.api_keys(),
        rate_limiter: BucketLimiter::new(config.rate_requests, Duration::from_secs(config.rate_window_sec)),
        max_request_bytes: config.max_request_bytes,
        liveness,
    });

    build(state)
}

/// Builds the router from an already-assembled [`AppState`]. Split out from [`router`] so
/// tests can wire up a state with an in-memory store without touching the filesystem.
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .route("/tasks", get(routes::list_tasks).post(routes::create_task))
        .route("/results/:id", get(routes::get_result))
        .route("/route/preview", post(routes::route_preview))
        .layer(from_fn_with_state(state.clone(), guard::rate_limit))
        .layer(from_fn_with_state(state.clone(), guard::api_key))
        .layer(from_fn_with_state(state.clone(), guard::size_cap))
        .layer(from_fn_with_state(state.clone(), track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn app(config: &Config) -> IntoMakeServiceWithConnectInfo<Router, SocketAddr> {
    let store = Store::connect(&config.task_db).await.expect("failed to open task database");
    let queue = Queue::new(store, config.to_queue_retry_config(), config.requeue_stuck_on_startup);
    queue.init().await.expect("failed to migrate task database schema");

    router(config, queue).await.into_make_service_with_connect_info::<SocketAddr>()
}
