use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use queue_core::JobStatus;
use serde::Deserialize;
use serde_json::{json, Value as Json_};

use crate::error::ApiError;
use crate::extract::AppJson;
use crate::state::AppState;

pub async fn health() -> Response {
    let mut response = Json(json!({ "ok": true, "app": "velu" })).into_response();
    response
        .headers_mut()
        .insert(header::SERVER, header::HeaderValue::from_static("velu"));
    response
}

pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    state.liveness.report_healthy().await;

    match state.queue.store().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true, "db": { "ok": true } }))).into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "db": { "ok": false, "error": error.to_string() } })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    task: String,
    #[serde(default)]
    payload: Json_,
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<CreateTaskRequest>,
) -> Result<Response, ApiError> {
    let task = {
        let trimmed = body.task.trim();
        if trimmed.is_empty() {
            "plan".to_string()
        } else {
            trimmed.to_string()
        }
    };
    let payload = if body.payload.is_null() { json!({}) } else { body.payload };

    let job_id = state.queue.enqueue(&task, payload.clone(), 0, None).await?;
    state.task_log.record(job_id, &task, &payload).await;

    if let Some(job) = state.queue.load(job_id).await? {
        state.recent.push(job);
    }

    Ok(Json(json!({
        "ok": true,
        "job_id": job_id,
        "received": { "task": task, "payload": payload },
    }))
    .into_response())
}

#[derive(Deserialize)]
pub struct ListTasksQuery {
    limit: Option<usize>,
}

pub async fn list_tasks(State(state): State<Arc<AppState>>, Query(query): Query<ListTasksQuery>) -> Response {
    let limit = query.limit.unwrap_or(20).max(1);
    let items = state.recent.snapshot(limit);
    (StatusCode::OK, Json(json!({ "ok": true, "items": items }))).into_response()
}

pub async fn get_result(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let job = state.queue.load(id).await?.ok_or(ApiError::NotFound)?;
    let done = job.status == JobStatus::Done;

    Ok((
        StatusCode::OK,
        Json(json!({
            "ok": done,
            "item": {
                "status": job.status.as_str(),
                "result": job.result,
                "error": job.last_error,
            },
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct RoutePreviewRequest {
    #[serde(default)]
    task: String,
    #[serde(default)]
    payload: Json_,
}

pub async fn route_preview(AppJson(body): AppJson<RoutePreviewRequest>) -> Response {
    let task = body.task.trim().to_lowercase();
    let allowed = task != "deploy";
    let reason = if allowed {
        "allowed".to_string()
    } else {
        "deploy is not permitted via route preview".to_string()
    };

    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "policy": { "allowed": allowed, "reason": reason },
            "payload": body.payload,
            "model": { "name": "velu" },
        })),
    )
        .into_response()
}
