//! Durable job storage: the `jobs` table, atomic single-claim dequeue, and retry/backoff
//! scheduling. This is the only crate that speaks SQL.

pub mod backoff;
pub mod error;
pub mod queue;
pub mod store;
pub mod types;

pub use backoff::RetryConfig;
pub use error::{QueueError, Result};
pub use queue::Queue;
pub use store::Store;
pub use types::{error_envelope, normalize_result, Job, JobStatus};
