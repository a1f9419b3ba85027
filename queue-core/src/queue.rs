//! The only module that speaks to the [`Store`]. Everything else in this codebase reaches
//! the `jobs` table through [`Queue`].

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value as Json;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

use crate::backoff::{backoff, RetryConfig};
use crate::error::{QueueError, Result};
use crate::store::Store;
use crate::types::{error_envelope, normalize_result, Job, JobStatus};

/// Idempotently creates the `jobs` table, migrates in optional columns, and (unless
/// disabled) requeues rows left `in_progress` by a prior crash.
#[derive(Clone)]
pub struct Queue {
    store: Store,
    retry: RetryConfig,
    requeue_stuck_on_startup: bool,
}

impl Queue {
    pub fn new(store: Store, retry: RetryConfig, requeue_stuck_on_startup: bool) -> Self {
        Self {
            store,
            retry,
            requeue_stuck_on_startup,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Idempotent schema migration. Safe to call on every process startup, including
    /// concurrently from multiple processes sharing the same database file.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued',
                result TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )
            "#,
        )
        .execute(self.store.pool())
        .await?;

        // Additive migrations: tolerate a schema created before these columns existed.
        // SQLite has no `ADD COLUMN IF NOT EXISTS`, so duplicate-column errors are swallowed.
        for migration in [
            "ALTER TABLE jobs ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0",
            "ALTER TABLE jobs ADD COLUMN priority INTEGER NOT NULL DEFAULT 0",
            "ALTER TABLE jobs ADD COLUMN next_run_at INTEGER",
            "ALTER TABLE jobs ADD COLUMN last_error TEXT",
        ] {
            let _ = sqlx::query(migration).execute(self.store.pool()).await;
        }

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs (status, next_run_at, priority, id)",
        )
        .execute(self.store.pool())
        .await?;

        if self.requeue_stuck_on_startup {
            let result = sqlx::query("UPDATE jobs SET status = 'queued' WHERE status = 'in_progress'")
                .execute(self.store.pool())
                .await?;
            if result.rows_affected() > 0 {
                tracing::warn!(
                    count = result.rows_affected(),
                    "requeued jobs left in_progress by a prior crash"
                );
            }
        }

        Ok(())
    }

    /// Inserts a `queued` job. Returns the server-assigned id.
    pub async fn enqueue(
        &self,
        task: &str,
        payload: Json,
        priority: i64,
        not_before: Option<i64>,
    ) -> Result<i64> {
        let task = task.trim().to_lowercase();
        if task.is_empty() {
            return Err(QueueError::InvalidArgument("task must not be empty".into()));
        }
        let payload_text = serde_json::to_string(&payload)?;

        let row = sqlx::query(
            r#"
            INSERT INTO jobs (task, payload, status, attempts, priority, next_run_at)
            VALUES (?, ?, 'queued', 0, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&task)
        .bind(&payload_text)
        .bind(priority)
        .bind(not_before)
        .fetch_one(self.store.pool())
        .await?;

        Ok(row.get::<i64, _>("id"))
    }

    /// Atomically claims the highest-priority, lowest-id eligible `queued` job.
    ///
    /// Runs a `BEGIN IMMEDIATE` transaction so the read-then-conditional-update sequence
    /// cannot interleave with another claimant: a losing claim (zero rows affected by the
    /// conditional `UPDATE`) returns `None` rather than an error, and the caller is
    /// expected to retry.
    pub async fn dequeue(&self) -> Result<Option<i64>> {
        let now = now_epoch();
        let mut conn = self.store.pool().acquire().await?;

        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match Self::try_claim(&mut conn, now).await {
            Ok(claimed) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(claimed)
            }
            Err(error) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(error)
            }
        }
    }

    async fn try_claim(conn: &mut PoolConnection<Sqlite>, now: i64) -> Result<Option<i64>> {
        let candidate: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM jobs
            WHERE status = 'queued' AND (next_run_at IS NULL OR next_run_at <= ?)
            ORDER BY priority DESC, id ASC
            LIMIT 1
            "#,
        )
        .bind(now)
        .fetch_optional(&mut **conn)
        .await?;

        let Some(id) = candidate else {
            return Ok(None);
        };

        let result = sqlx::query("UPDATE jobs SET status = 'in_progress' WHERE id = ? AND status = 'queued'")
            .bind(id)
            .execute(&mut **conn)
            .await?;

        Ok((result.rows_affected() == 1).then_some(id))
    }

    /// Snapshot read of a job. `None` when the id is unknown.
    pub async fn load(&self, id: i64) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.store.pool())
            .await?;

        row.map(job_from_row).transpose()
    }

    /// Marks a job `done` and stores the normalised result.
    ///
    /// `attempts` counts completed handler invocations, success included (at most one
    /// success is ever attempted), so this increments it just as [`Queue::fail`] does.
    pub async fn finish(&self, id: i64, result: Json) -> Result<()> {
        let normalized = normalize_result(result);
        let result_text = serde_json::to_string(&normalized)?;

        sqlx::query(
            "UPDATE jobs SET status = 'done', result = ?, attempts = attempts + 1, next_run_at = NULL WHERE id = ?",
        )
        .bind(result_text)
        .bind(id)
        .execute(self.store.pool())
        .await?;

        Ok(())
    }

    /// Records a failed attempt. Schedules a backoff retry if attempts remain, otherwise
    /// marks the job terminally `error` with the error envelope as its result.
    pub async fn fail(&self, id: i64, message: &str) -> Result<()> {
        let attempts_prev: i64 = sqlx::query_scalar("SELECT attempts FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_one(self.store.pool())
            .await?;
        let attempts_new = attempts_prev + 1;

        if attempts_new >= self.retry.max_attempts {
            let envelope = error_envelope(message, attempts_new);
            let envelope_text = serde_json::to_string(&envelope)?;

            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'error', attempts = ?, result = ?, last_error = ?, next_run_at = NULL
                WHERE id = ?
                "#,
            )
            .bind(attempts_new)
            .bind(envelope_text)
            .bind(message)
            .bind(id)
            .execute(self.store.pool())
            .await?;
        } else {
            let delay = backoff(&self.retry, attempts_prev);
            let next_run_at = now_epoch() + delay.as_secs() as i64;

            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'queued', attempts = ?, last_error = ?, next_run_at = ?
                WHERE id = ?
                "#,
            )
            .bind(attempts_new)
            .bind(message)
            .bind(next_run_at)
            .bind(id)
            .execute(self.store.pool())
            .await?;
        }

        Ok(())
    }

    /// Newest-first snapshot, bounded by `limit`.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let limit = limit.max(1);
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(self.store.pool())
            .await?;

        rows.into_iter().map(job_from_row).collect()
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_secs() as i64
}

fn job_from_row(row: SqliteRow) -> Result<Job> {
    let status_text: String = row.get("status");
    let status = JobStatus::from_str(&status_text)
        .map_err(|_| QueueError::InvalidArgument(format!("corrupt status in store: {status_text}")))?;

    let payload_text: String = row.get("payload");
    let payload: Json = serde_json::from_str(&payload_text)?;

    let result_text: Option<String> = row.get("result");
    let result = result_text.map(|text| serde_json::from_str(&text)).transpose()?;

    let created_at_text: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_text)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(Job {
        id: row.get("id"),
        task: row.get("task"),
        payload,
        status,
        result,
        attempts: row.get("attempts"),
        priority: row.get("priority"),
        next_run_at: row.get("next_run_at"),
        last_error: row.get("last_error"),
        created_at,
    })
}
