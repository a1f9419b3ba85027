use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The four states a [`Job`] may occupy. Stored as lowercase TEXT in the `jobs` table —
/// SQLite has no native enum type, so the column is a `String` and this type is the
/// in-memory view of it.
///
/// Other job queues in this space use divergent names for the claimed-but-not-finished
/// state (`working`, `running`); this crate settles on `in_progress` everywhere.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "in_progress" => Ok(JobStatus::InProgress),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A single unit of work. See the `jobs` table schema in [`crate::store`] for the
/// persisted shape this is read from and written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub task: String,
    pub payload: Json,
    pub status: JobStatus,
    pub result: Option<Json>,
    pub attempts: i64,
    pub priority: i64,
    pub next_run_at: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// True once the job has reached a terminal state; no further transitions occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Done | JobStatus::Error)
    }
}

/// Normalises a handler/dispatcher result into the canonical shape stored in `result`:
/// a JSON object is stored verbatim, anything else is wrapped as `{"ok": true, "data": <value>}`.
pub fn normalize_result(value: Json) -> Json {
    if value.is_object() {
        value
    } else {
        serde_json::json!({ "ok": true, "data": value })
    }
}

/// Builds the terminal-failure result envelope stored in `result` when a job exhausts
/// its retry budget.
pub fn error_envelope(message: &str, attempts: i64) -> Json {
    serde_json::json!({ "ok": false, "error": message, "attempts": attempts })
}
