use envconfig::Envconfig;

use crate::apikey::ApiKeys;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub bind_host: String,

    #[envconfig(from = "BIND_PORT", default = "8000")]
    pub bind_port: u16,

    #[envconfig(from = "TASK_DB", default = "./data/jobs.db")]
    pub task_db: String,

    /// Optional JSONL sink for accepted tasks. Absent (empty string) disables it.
    #[envconfig(from = "TASK_LOG", default = "")]
    pub task_log: String,

    #[envconfig(from = "REQUEUE_STUCK_ON_STARTUP", default = "true")]
    pub requeue_stuck_on_startup: bool,

    #[envconfig(from = "SQLQ_MAX_ATTEMPTS", default = "3")]
    pub max_attempts: i64,

    #[envconfig(from = "SQLQ_RETRY_BASE_SEC", default = "2")]
    pub retry_base_sec: u64,

    /// `"k1:label1,k2:label2,k3"`; bare keys default to label `default`. Empty disables auth.
    #[envconfig(from = "API_KEYS", default = "")]
    pub api_keys: String,

    #[envconfig(from = "RATE_REQUESTS", default = "30")]
    pub rate_requests: u32,

    #[envconfig(from = "RATE_WINDOW_SEC", default = "60")]
    pub rate_window_sec: u64,

    #[envconfig(from = "MAX_REQUEST_BYTES", default = "1048576")]
    pub max_request_bytes: usize,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    pub fn to_queue_retry_config(&self) -> queue_core::RetryConfig {
        queue_core::RetryConfig {
            max_attempts: self.max_attempts,
            base: std::time::Duration::from_secs(self.retry_base_sec),
        }
    }

    pub fn api_keys(&self) -> ApiKeys {
        ApiKeys::parse(&self.api_keys)
    }

    pub fn task_log_path(&self) -> Option<&str> {
        (!self.task_log.is_empty()).then_some(self.task_log.as_str())
    }
}
