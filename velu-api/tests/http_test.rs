use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use queue_core::{Queue, RetryConfig, Store};
use serde_json::{json, Value};
use tower::ServiceExt;

use velu_api::apikey::ApiKeys;
use velu_api::rate_limit::BucketLimiter;
use velu_api::recent::RecentRing;
use velu_api::server;
use velu_api::state::AppState;
use velu_api::task_log::TaskLogSink;

/// Assembles a router against a fresh in-memory store, mirroring `server::app` without
/// touching the filesystem or binding a socket.
struct Harness {
    app: Router,
}

struct HarnessOptions {
    api_keys: ApiKeys,
    rate_limiter: BucketLimiter,
    max_request_bytes: usize,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            api_keys: ApiKeys::parse(""),
            rate_limiter: BucketLimiter::disabled(),
            max_request_bytes: 1_048_576,
        }
    }
}

impl Harness {
    async fn new() -> Self {
        Self::with_options(HarnessOptions::default()).await
    }

    async fn with_options(options: HarnessOptions) -> Self {
        let store = Store::connect_in_memory().await.unwrap();
        let queue = Queue::new(store, RetryConfig::default(), true);
        queue.init().await.unwrap();

        let liveness = health::HealthRegistry::new("test")
            .register("http_server".to_string(), time::Duration::seconds(30))
            .await;

        let state = Arc::new(AppState {
            queue,
            recent: RecentRing::new(),
            task_log: TaskLogSink::disabled(),
            api_keys: options.api_keys,
            rate_limiter: options.rate_limiter,
            max_request_bytes: options.max_request_bytes,
            liveness,
        });

        Self {
            app: server::build(state),
        }
    }

    async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let harness = Harness::new().await;
    let response = harness.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::SERVER).and_then(|v| v.to_str().ok()),
        Some("velu")
    );
    let body = Harness::body_json(response).await;
    assert_eq!(body, json!({ "ok": true, "app": "velu" }));
}

#[tokio::test]
async fn ready_pings_the_store() {
    let harness = Harness::new().await;
    let response = harness.get("/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = Harness::body_json(response).await;
    assert_eq!(body["ok"], json!(true));
}

#[tokio::test]
async fn create_task_enqueues_and_defaults_missing_fields() {
    let harness = Harness::new().await;
    let response = harness.post_json("/tasks", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = Harness::body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["received"]["task"], json!("plan"));
    assert_eq!(body["received"]["payload"], json!({}));
    assert!(body["job_id"].as_i64().is_some());
}

#[tokio::test]
async fn create_task_then_list_and_fetch_result() {
    let harness = Harness::new().await;
    let create = harness
        .post_json("/tasks", json!({ "task": "analyze", "payload": { "x": 1 } }))
        .await;
    let created = Harness::body_json(create).await;
    let job_id = created["job_id"].as_i64().unwrap();

    let list = harness.get("/tasks").await;
    assert_eq!(list.status(), StatusCode::OK);
    let list_body = Harness::body_json(list).await;
    let items = list_body["items"].as_array().unwrap();
    assert!(items.iter().any(|item| item["id"] == json!(job_id)));

    let result = harness.get(&format!("/results/{job_id}")).await;
    assert_eq!(result.status(), StatusCode::OK);
    let result_body = Harness::body_json(result).await;
    assert_eq!(result_body["item"]["status"], json!("queued"));
}

#[tokio::test]
async fn get_result_for_unknown_id_is_404() {
    let harness = Harness::new().await;
    let response = harness.get("/results/999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = Harness::body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn route_preview_disallows_deploy_but_allows_plan() {
    let harness = Harness::new().await;

    let deploy = harness
        .post_json("/route/preview", json!({ "task": "deploy", "payload": {} }))
        .await;
    assert_eq!(deploy.status(), StatusCode::OK);
    let deploy_body = Harness::body_json(deploy).await;
    assert_eq!(deploy_body["policy"]["allowed"], json!(false));

    let plan = harness
        .post_json("/route/preview", json!({ "task": "plan", "payload": {} }))
        .await;
    let plan_body = Harness::body_json(plan).await;
    assert_eq!(plan_body["policy"]["allowed"], json!(true));
}

#[tokio::test]
async fn malformed_json_body_is_a_400() {
    let harness = Harness::new().await;
    let response = harness
        .request(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_api_key_is_rejected_when_enforced() {
    let harness = Harness::with_options(HarnessOptions {
        api_keys: ApiKeys::parse("secret-key"),
        ..HarnessOptions::default()
    })
    .await;

    let unauthorized = harness.post_json("/tasks", json!({})).await;
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let authorized = harness
        .request(
            Request::builder()
                .method("POST")
                .uri("/tasks")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-api-key", "secret-key")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(authorized.status(), StatusCode::OK);
}

#[tokio::test]
async fn other_routes_bypass_api_key_enforcement() {
    let harness = Harness::with_options(HarnessOptions {
        api_keys: ApiKeys::parse("secret-key"),
        ..HarnessOptions::default()
    })
    .await;

    let response = harness.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let harness = Harness::with_options(HarnessOptions {
        max_request_bytes: 16,
        ..HarnessOptions::default()
    })
    .await;

    let big_payload = json!({ "task": "plan", "payload": { "idea": "x".repeat(200) } });
    let response = harness.post_json("/tasks", big_payload).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn third_request_within_window_is_rate_limited() {
    let harness = Harness::with_options(HarnessOptions {
        rate_limiter: BucketLimiter::new(2, Duration::from_secs(60)),
        ..HarnessOptions::default()
    })
    .await;

    assert_eq!(harness.post_json("/tasks", json!({})).await.status(), StatusCode::OK);
    assert_eq!(harness.post_json("/tasks", json!({})).await.status(), StatusCode::OK);
    assert_eq!(
        harness.post_json("/tasks", json!({})).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}
