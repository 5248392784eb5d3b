//! Workflow configuration, loaded from one TOML file
//!
//! Every section and field has a default, so an empty file (or no file
//! at all) yields a runnable local setup.

use crate::error::WorkflowError;
use prodex_extractor::ExtractorConfig;
use prodex_queue::{QueueConfig, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Worker pool tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Queue poll interval while idle (milliseconds)
    pub poll_interval_ms: u64,

    /// Lease heartbeat interval (milliseconds); keep well under the
    /// queue's lease duration
    pub heartbeat_interval_ms: u64,

    /// Per-job wall-clock ceiling in seconds; elapsing forces failure
    /// regardless of the retry budget
    pub job_timeout_secs: u64,

    /// How long a graceful stop waits for in-flight jobs (seconds)
    pub stop_grace_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            poll_interval_ms: 250,
            heartbeat_interval_ms: 10_000,
            job_timeout_secs: 1_800,
            stop_grace_secs: 30,
        }
    }
}

/// LLM provider selection and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama endpoint URL
    pub endpoint: String,

    /// Primary model name
    pub model: String,

    /// Optional fallback model, tried when the primary fails
    pub fallback_model: Option<String>,

    /// Attempts per provider before falling back
    pub max_attempts: u32,

    /// Base backoff delay between transient retries (milliseconds)
    pub backoff_base_ms: u64,

    /// Backoff delay ceiling (milliseconds)
    pub backoff_cap_ms: u64,

    /// Per-call timeout in seconds
    pub call_timeout_secs: u64,

    /// Correction round-trips per invalid response
    pub max_correction_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            fallback_model: None,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            call_timeout_secs: 120,
            max_correction_attempts: 3,
        }
    }
}

/// Where results and persisted state live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for per-product result files
    pub output_dir: PathBuf,

    /// Directory for queue/scheduler state snapshots
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            state_dir: PathBuf::from("state"),
        }
    }
}

/// Top-level configuration, one section per component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProdexConfig {
    /// Worker pool section
    pub pool: PoolConfig,
    /// Queue section
    pub queue: QueueConfig,
    /// Scheduler section
    pub scheduler: SchedulerConfig,
    /// Extraction pipeline section
    pub extractor: ExtractorConfig,
    /// LLM provider section
    pub llm: LlmConfig,
    /// Storage section
    pub storage: StorageConfig,
}

impl ProdexConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WorkflowError::Config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| WorkflowError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field sanity checks
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.pool.workers == 0 {
            return Err(WorkflowError::Config("pool.workers must be positive".into()));
        }
        if self.pool.heartbeat_interval_ms >= self.queue.lease_ms {
            return Err(WorkflowError::Config(format!(
                "pool.heartbeat_interval_ms ({}) must be below queue.lease_ms ({})",
                self.pool.heartbeat_interval_ms, self.queue.lease_ms
            )));
        }
        self.extractor
            .validate()
            .map_err(|e| WorkflowError::Config(e.to_string()))?;
        Ok(())
    }
}
