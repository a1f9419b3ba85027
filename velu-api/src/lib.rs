//! The minimal HTTP ingress/egress that makes the queue usable: `POST /tasks` to enqueue,
//! `GET /results/{id}` to poll, `GET /tasks` for a recent-items ring, `GET /health`/`GET /ready`
//! for probes, and `POST /route/preview` as a pure policy-preview endpoint. Guarded by the
//! size-cap/API-key/rate-limit middleware stack in `middleware`.

pub mod apikey;
pub mod config;
pub mod error;
pub mod extract;
pub mod metrics_middleware;
pub mod middleware;
pub mod rate_limit;
pub mod recent;
pub mod routes;
pub mod server;
pub mod state;
pub mod task_log;

pub use error::ApiError;
pub use state::AppState;
