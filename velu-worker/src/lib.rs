//! The poll loop that claims jobs from a [`queue_core::Queue`], dispatches them through the
//! shared `registry`, and records the outcome. Exposed as a library so integration tests can
//! drive [`worker::Worker`] directly against an in-memory queue.

pub mod config;
pub mod enqueuer;
pub mod error;
pub mod worker;

pub use config::Config;
pub use enqueuer::QueueEnqueuer;
pub use error::{Result, WorkerError};
pub use worker::Worker;
