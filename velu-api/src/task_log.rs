//! Optional JSONL dump of every task accepted by `POST /tasks`, enabled by `TASK_LOG`.
//!
//! A side-channel append-only audit log, not read back by this service. Failures to write
//! are logged and otherwise ignored —
//! losing an audit-log line must never fail the enqueue it's describing.

use std::sync::Arc;

use serde_json::{json, Value as Json};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct TaskLogSink {
    inner: Option<Arc<Mutex<tokio::fs::File>>>,
}

impl TaskLogSink {
    /// `None` when `path` is `None` (the default, TASK_LOG unset).
    pub async fn open(path: Option<&str>) -> std::io::Result<Self> {
        let Some(path) = path else {
            return Ok(Self { inner: None });
        };

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self {
            inner: Some(Arc::new(Mutex::new(file))),
        })
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Appends one JSONL record for an accepted task. Best-effort: logs and swallows I/O errors.
    pub async fn record(&self, job_id: i64, task: &str, payload: &Json) {
        let Some(file) = &self.inner else {
            return;
        };

        let line = json!({ "job_id": job_id, "task": task, "payload": payload }).to_string();
        let mut file = file.lock().await;
        if let Err(error) = file.write_all(line.as_bytes()).await {
            tracing::warn!(%error, "failed to write task log entry");
            return;
        }
        if let Err(error) = file.write_all(b"\n").await {
            tracing::warn!(%error, "failed to write task log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn disabled_sink_records_nothing() {
        let sink = TaskLogSink::disabled();
        sink.record(1, "plan", &json!({})).await;
    }

    #[tokio::test]
    async fn records_are_appended_as_jsonl() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tasks.jsonl");
        let sink = TaskLogSink::open(Some(path.to_str().unwrap())).await.unwrap();

        sink.record(1, "plan", &json!({"idea": "demo"})).await;
        sink.record(2, "codegen", &json!({"lang": "rust"})).await;

        let mut contents = String::new();
        tokio::fs::File::open(&path)
            .await
            .unwrap()
            .read_to_string(&mut contents)
            .await
            .unwrap();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Json = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["task"], json!("plan"));
        assert_eq!(first["job_id"], json!(1));
    }
}
