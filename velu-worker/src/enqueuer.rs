use async_trait::async_trait;
use queue_core::Queue;
use registry::Enqueuer;
use serde_json::Value as Json;

/// Wraps the durable queue so handlers (the `pipeline` built-in, `plan` in pipeline mode) can
/// re-enqueue subjobs without this crate's `registry` dependency knowing anything about SQLite.
pub struct QueueEnqueuer {
    queue: Queue,
}

impl QueueEnqueuer {
    pub fn new(queue: Queue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Enqueuer for QueueEnqueuer {
    async fn enqueue(&self, task: &str, payload: Json, priority: i64) -> Result<i64, String> {
        self.queue
            .enqueue(task, payload, priority, None)
            .await
            .map_err(|err| err.to_string())
    }
}
