use thiserror::Error;

/// Errors surfaced by the [`crate::queue::Queue`] and [`crate::store::Store`] boundary.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialise payload as JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
