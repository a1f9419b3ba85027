use std::sync::Arc;

use envconfig::Envconfig;
use health::HealthRegistry;
use queue_core::{Queue, Store};
use registry::{Dispatcher, HandlerRegistry};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use velu_worker::{Config, Worker};

async fn shutdown_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let waiter = token.clone();

    tokio::spawn(async move {
        let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("failed to register SIGINT handler");

        tokio::select! {
            _ = term.recv() => {},
            _ = interrupt.recv() => {},
        };

        tracing::info!("shutdown signal received, draining worker loop");
        waiter.cancel();
    });

    token
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let store = Store::connect(&config.task_db)
        .await
        .expect("failed to open task database");
    let queue = Queue::new(
        store,
        config.retry.to_queue_retry_config(),
        config.requeue_stuck_on_startup,
    );

    let dispatcher = Dispatcher::new(Arc::new(HandlerRegistry::with_builtins()));

    let liveness_registry = HealthRegistry::new("liveness");
    let liveness = liveness_registry
        .register("worker_loop".to_string(), time::Duration::seconds(30))
        .await;

    let worker = Worker::new(queue, dispatcher, config, liveness);
    let cancel = shutdown_signal().await;

    if let Err(err) = worker.run(cancel).await {
        tracing::error!("worker loop exited with an error: {err}");
        std::process::exit(1);
    }
}
