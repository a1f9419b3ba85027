//! The three request guards that sit in front of `POST /tasks`: size cap, API key, rate
//! limit. Each checks whether the request needs guarding at all
//! (every other route, plus `OPTIONS`, always bypasses) before doing any work, mirroring how
//! `capture::metrics_middleware::track_metrics` inspects the request rather than needing a
//! separate router per concern.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

const GUARDED_PATH: &str = "/tasks";

fn is_guarded<B>(req: &Request<B>) -> bool {
    req.method() == Method::POST && req.uri().path() == GUARDED_PATH
}

/// The API key a request authenticated with, stashed in request extensions so the rate
/// limiter downstream can derive an `apk:` bucket instead of falling back to IP.
#[derive(Clone)]
struct AuthenticatedKey(String);

pub async fn size_cap(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !is_guarded(&req) || state.max_request_bytes == 0 {
        return next.run(req).await;
    }

    if let Some(declared) = content_length(&req) {
        if declared > state.max_request_bytes {
            return ApiError::PayloadTooLarge.into_response();
        }
        return next.run(req).await;
    }

    // No Content-Length (e.g. chunked transfer-encoding): enforce the cap on the actual
    // bytes read instead of trusting the client.
    let (parts, body) = req.into_parts();
    let limit = state.max_request_bytes;
    match axum::body::to_bytes(body, limit + 1).await {
        Ok(bytes) if bytes.len() > limit => ApiError::PayloadTooLarge.into_response(),
        Ok(bytes) => {
            let req = Request::from_parts(parts, axum::body::Body::from(bytes));
            next.run(req).await
        }
        Err(_) => ApiError::PayloadTooLarge.into_response(),
    }
}

fn content_length<B>(req: &Request<B>) -> Option<usize> {
    req.headers()
        .get(axum::http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

pub async fn api_key(
    State(state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !is_guarded(&req) || !state.api_keys.is_enforced() {
        return next.run(req).await;
    }

    let header_key = req
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match header_key.as_deref().and_then(|key| state.api_keys.label_for(key).map(|_| key)) {
        Some(key) => {
            req.extensions_mut().insert(AuthenticatedKey(key.to_string()));
            next.run(req).await
        }
        None => ApiError::Unauthorized.into_response(),
    }
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !is_guarded(&req) {
        return next.run(req).await;
    }

    let bucket = bucket_key(&req, peer.map(|ConnectInfo(addr)| addr));
    if state.rate_limiter.allow(&bucket) {
        next.run(req).await
    } else {
        ApiError::RateLimited.into_response()
    }
}

/// `peer` is `None` when the service isn't served through
/// `into_make_service_with_connect_info` (e.g. a `oneshot`-driven test) and no
/// `X-Forwarded-For` header is present either; such requests share an `ip:unknown` bucket.
fn bucket_key<B>(req: &Request<B>, peer: Option<SocketAddr>) -> String {
    if let Some(key) = req.extensions().get::<AuthenticatedKey>() {
        let prefix: String = key.0.chars().take(6).collect();
        return format!("apk:{prefix}");
    }

    let forwarded_ip = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string());

    let peer_ip = peer.map(|addr| addr.ip().to_string());
    format!("ip:{}", forwarded_ip.or(peer_ip).unwrap_or_else(|| "unknown".to_string()))
}
