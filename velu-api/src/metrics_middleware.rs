//! HTTP request counters/histograms at the same call sites this codebase instruments
//! elsewhere (see `capture::metrics_middleware::track_metrics`), plus a liveness report per
//! request so `GET /ready`'s health-registry component reflects an HTTP server that is
//! actually serving traffic.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use metrics::{counter, histogram};

use crate::state::AppState;

const METRIC_REQUESTS_TOTAL: &str = "velu_http_requests_total";
const METRIC_REQUEST_DURATION_SECONDS: &str = "velu_http_request_duration_seconds";

pub async fn track_metrics(State(state): State<Arc<AppState>>, req: Request, next: Next) -> impl IntoResponse {
    let start = Instant::now();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let method = req.method().clone();

    state.liveness.report_healthy().await;
    let response = next.run(req).await;

    let labels = [
        ("method", method.to_string()),
        ("path", path),
        ("status", response.status().as_u16().to_string()),
    ];
    counter!(METRIC_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(METRIC_REQUEST_DURATION_SECONDS, &labels).record(start.elapsed().as_secs_f64());

    response
}
