use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Map, Value as Json};

use crate::handler::Enqueuer;
use crate::registry::HandlerRegistry;

/// Resolves a task name to a handler, invokes it, and normalises the outcome into the
/// canonical `{ok, agent, ...}` shape. Never panics: a handler panic is caught and
/// converted into the same failure shape a returned `Err` would produce.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub async fn dispatch(&self, task: &str, payload: Json, enqueuer: &dyn Enqueuer) -> Json {
        let task = task.trim().to_lowercase();
        let handler = self
            .registry
            .resolve(&task)
            .unwrap_or_else(|| {
                // Lazily materialise the sentinel rather than requiring every registry to
                // have been constructed via `with_builtins`.
                Arc::new(crate::builtins::unknown_handler())
            });

        let outcome = AssertUnwindSafe(handler.call(&task, payload, enqueuer))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => success_envelope(&task, value),
            Ok(Err(message)) => failure_envelope(&task, &message),
            Err(_panic) => failure_envelope(&task, "handler panicked"),
        }
    }
}

fn success_envelope(task: &str, value: Json) -> Json {
    let mut envelope = Map::new();
    envelope.insert("ok".to_string(), json!(true));
    envelope.insert("agent".to_string(), json!(task));

    match value {
        Json::Object(fields) => envelope.extend(fields),
        other => {
            envelope.insert("data".to_string(), other);
        }
    }

    Json::Object(envelope)
}

fn failure_envelope(task: &str, message: &str) -> Json {
    json!({ "ok": false, "agent": task, "error": message, "data": {} })
}
