//! The handler registry and dispatch boundary: a process-wide map from task name to
//! handler, and the invocation contract that normalises results and catches handler
//! failures (including panics) into a typed envelope.

pub mod builtins;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod registry;

pub use dispatcher::Dispatcher;
pub use error::{RegistryError, Result};
pub use handler::{Enqueuer, Handler, NullEnqueuer, PayloadOnly};
pub use registry::HandlerRegistry;
