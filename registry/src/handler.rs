use async_trait::async_trait;
use serde_json::Value as Json;

/// The capability a handler needs to re-enqueue subjobs (the `pipeline` built-in, and any
/// overlay-registered handler that orchestrates other tasks). Kept as a trait rather than a
/// direct dependency on `queue-core::Queue` so this crate has no knowledge of the storage
/// layer; `velu-worker` supplies the real implementation at startup.
#[async_trait]
pub trait Enqueuer: Send + Sync {
    async fn enqueue(&self, task: &str, payload: Json, priority: i64) -> Result<i64, String>;
}

/// Used to dispatch handlers (e.g. from `POST /route/preview`) that must never actually
/// enqueue anything.
pub struct NullEnqueuer;

#[async_trait]
impl Enqueuer for NullEnqueuer {
    async fn enqueue(&self, _task: &str, _payload: Json, _priority: i64) -> Result<i64, String> {
        Err("enqueue is not available in this context".to_string())
    }
}

/// A registered task handler ("agent"). Implementations should not panic for ordinary
/// failures — return `Err` instead — but the [`crate::dispatcher::Dispatcher`] recovers
/// from panics regardless.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, task: &str, payload: Json, enqueuer: &dyn Enqueuer) -> Result<Json, String>;
}

/// Adapts a plain `(payload) -> Json` function to the `(task, payload, enqueuer) -> Result`
/// handler contract, matching the overlay import pattern described in the design notes:
/// most built-in agents don't care about their own name or about enqueuing subjobs.
pub struct PayloadOnly<F>(pub F);

#[async_trait]
impl<F> Handler for PayloadOnly<F>
where
    F: Fn(Json) -> Json + Send + Sync,
{
    async fn call(&self, _task: &str, payload: Json, _enqueuer: &dyn Enqueuer) -> Result<Json, String> {
        Ok((self.0)(payload))
    }
}
