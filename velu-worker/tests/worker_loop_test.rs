use std::sync::Arc;
use std::time::Duration;

use queue_core::{JobStatus, Queue, RetryConfig, Store};
use registry::{Dispatcher, HandlerRegistry};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use velu_worker::{Config, Worker};

fn test_config(workdir: &str) -> Config {
    Config {
        task_db: ":memory:".to_string(),
        retry: velu_worker::config::RetryPolicyConfig {
            max_attempts: 3,
            base_sec: velu_worker::config::EnvSecondsDuration(Duration::from_secs(0)),
        },
        requeue_stuck_on_startup: true,
        run_once: false,
        max_jobs: 1,
        enable_pipeline: false,
        poll_min_ms: 5,
        poll_max_ms: 10,
        workdir: workdir.to_string(),
    }
}

async fn bounded_worker(config: Config, queue: Queue) {
    let liveness = health::HealthRegistry::new("test")
        .register("worker_loop".to_string(), time::Duration::seconds(30))
        .await;
    let dispatcher = Dispatcher::new(Arc::new(HandlerRegistry::with_builtins()));
    let worker = Worker::new(queue, dispatcher, config, liveness);
    worker.run(CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn fail_n_retries_then_succeeds_with_correct_attempts() {
    let dir = TempDir::new().unwrap();
    let store = Store::connect_in_memory().await.unwrap();
    let queue = Queue::new(store, RetryConfig { max_attempts: 5, base: Duration::ZERO }, true);
    queue.init().await.unwrap();

    let id = queue
        .enqueue("fail_n", json!({"fail_times": 2}), 0, None)
        .await
        .unwrap();

    let mut config = test_config(dir.path().to_str().unwrap());
    config.max_jobs = 3;
    bounded_worker(config, queue.clone()).await;

    let job = queue.load(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.attempts, 3);
    assert_eq!(
        job.result.unwrap()["message"],
        json!("passed after 2 failures")
    );
}

#[tokio::test]
async fn generate_code_writes_scaffold_files_under_workdir() {
    let dir = TempDir::new().unwrap();
    let store = Store::connect_in_memory().await.unwrap();
    let queue = Queue::new(store, RetryConfig::default(), true);
    queue.init().await.unwrap();

    let id = queue
        .enqueue("generate_code", json!({"module": "widget", "idea": "a widget"}), 0, None)
        .await
        .unwrap();

    let config = test_config(dir.path().to_str().unwrap());
    bounded_worker(config, queue.clone()).await;

    let job = queue.load(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    assert!(dir.path().join("src/widget.py").exists());
    assert!(dir.path().join("tests/test_widget.py").exists());
}

#[tokio::test]
async fn run_tests_fails_while_its_dependency_job_is_not_done() {
    let dir = TempDir::new().unwrap();
    let store = Store::connect_in_memory().await.unwrap();
    let queue = Queue::new(
        store,
        RetryConfig { max_attempts: 1, base: Duration::ZERO },
        true,
    );
    queue.init().await.unwrap();

    let missing_dependency_id = 99_999;
    let id = queue
        .enqueue("run_tests", json!({"code_job_id": missing_dependency_id}), 0, None)
        .await
        .unwrap();

    let mut config = test_config(dir.path().to_str().unwrap());
    config.max_jobs = 1;
    bounded_worker(config, queue.clone()).await;

    let job = queue.load(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(job
        .last_error
        .unwrap()
        .contains(&format!("dependency job {missing_dependency_id} not ready")));
}

#[tokio::test]
async fn plan_in_pipeline_mode_fans_out_generate_code_and_run_tests() {
    let dir = TempDir::new().unwrap();
    let store = Store::connect_in_memory().await.unwrap();
    let queue = Queue::new(store, RetryConfig::default(), true);
    queue.init().await.unwrap();

    let id = queue
        .enqueue("plan", json!({"idea": "a widget", "module": "widget"}), 0, None)
        .await
        .unwrap();

    let mut config = test_config(dir.path().to_str().unwrap());
    config.enable_pipeline = true;
    config.max_jobs = 1;
    bounded_worker(config, queue.clone()).await;

    let job = queue.load(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Done);
    let result = job.result.unwrap();
    assert_eq!(result["plan"], json!("a widget via widget"));
    assert!(result["subjobs"]["generate_code"].is_i64());
    assert!(result["subjobs"]["run_tests"].is_i64());

    let recent = queue.list_recent(10).await.unwrap();
    assert_eq!(recent.len(), 3);
}
