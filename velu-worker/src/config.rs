use std::str::FromStr;
use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "TASK_DB", default = "./data/jobs.db")]
    pub task_db: String,

    #[envconfig(nested = true)]
    pub retry: RetryPolicyConfig,

    #[envconfig(from = "REQUEUE_STUCK_ON_STARTUP", default = "true")]
    pub requeue_stuck_on_startup: bool,

    #[envconfig(from = "WORKER_RUN_ONCE", default = "false")]
    pub run_once: bool,

    /// 0 means unbounded.
    #[envconfig(from = "WORKER_MAX_JOBS", default = "0")]
    pub max_jobs: u64,

    #[envconfig(from = "WORKER_ENABLE_PIPELINE", default = "false")]
    pub enable_pipeline: bool,

    #[envconfig(from = "WORKER_POLL_MIN_MS", default = "250")]
    pub poll_min_ms: u64,

    #[envconfig(from = "WORKER_POLL_MAX_MS", default = "500")]
    pub poll_max_ms: u64,

    /// Where `generate_code` writes scaffold files.
    #[envconfig(from = "WORKER_WORKDIR", default = "./data/generated")]
    pub workdir: String,
}

impl Config {
    pub fn poll_interval_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.poll_min_ms),
            Duration::from_millis(self.poll_max_ms.max(self.poll_min_ms)),
        )
    }
}

#[derive(Envconfig, Clone)]
pub struct RetryPolicyConfig {
    #[envconfig(from = "SQLQ_MAX_ATTEMPTS", default = "3")]
    pub max_attempts: i64,

    #[envconfig(from = "SQLQ_RETRY_BASE_SEC", default = "2")]
    pub base_sec: EnvSecondsDuration,
}

impl RetryPolicyConfig {
    pub fn to_queue_retry_config(&self) -> queue_core::RetryConfig {
        queue_core::RetryConfig {
            max_attempts: self.max_attempts,
            base: self.base_sec.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvSecondsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvSecondsDurationError;

impl FromStr for EnvSecondsDuration {
    type Err = ParseEnvSecondsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = s.parse::<u64>().map_err(|_| ParseEnvSecondsDurationError)?;
        Ok(EnvSecondsDuration(Duration::from_secs(secs)))
    }
}
