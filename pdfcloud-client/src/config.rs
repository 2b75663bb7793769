//! Application configuration loaded from `pdfcloud.toml` and `PDFCLOUD__*`
//! environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::error::{ClientError, ClientResult};
use crate::jobs::{CombineJob, CombineOptions, Job};
use crate::poller::{DEFAULT_INTERVAL_MS, DEFAULT_MAX_ATTEMPTS, PollPolicy};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api")]
    pub api: ApiConfig,

    /// JSON file holding `client_credentials.client_id` / `secret_id`
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    #[serde(default = "default_polling")]
    pub polling: PollingConfig,

    #[serde(default = "default_job")]
    pub job: JobConfig,
}

/// Document service endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Status polling settings
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum status queries (0 = unlimited)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum total wait in seconds
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

impl PollingConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        }
    }
}

/// The job to run and where its result goes
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub output: PathBuf,

    #[serde(flatten)]
    pub job: Job,
}

impl AppConfig {
    /// Load from `pdfcloud.toml` (optional) and the environment
    pub fn load() -> ClientResult<Self> {
        Self::load_from("pdfcloud")
    }

    /// Load from the named config file (extension optional) and the environment
    pub fn load_from(name: &str) -> ClientResult<Self> {
        Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(
                Environment::with_prefix("PDFCLOUD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ClientError::config(format!("Failed to build config: {}", e)))?
            .try_deserialize()
            .map_err(|e| ClientError::config(format!("Failed to deserialize config: {}", e)))
    }
}

// ==================== Default Value Functions ====================

fn default_api() -> ApiConfig {
    ApiConfig {
        base_url: default_base_url(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("foxit_cloud_api_credentials.json")
}

fn default_polling() -> PollingConfig {
    PollingConfig {
        interval_ms: default_interval_ms(),
        max_attempts: default_max_attempts(),
        max_wait_secs: None,
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_job() -> JobConfig {
    JobConfig {
        output: PathBuf::from("output_files/combine/CombineResultFiles.pdf"),
        job: Job::Combine(CombineJob {
            input: PathBuf::from("input_files/combine.zip"),
            options: CombineOptions::default(),
        }),
    }
}
