//! Prodex workflow orchestration
//!
//! Ties the queue, scheduler, worker pool, and extraction pipeline into
//! one managed unit: submit products, directories, or CSV manifests and
//! the pool drains them through the LLM extraction pipeline with retry,
//! cancellation, and crash-recovery semantics.

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod pool;
pub mod store;

pub use batch::{Batch, BatchProcessor, BatchStatus, BatchSummary};
pub use config::{LlmConfig, PoolConfig, ProdexConfig, StorageConfig};
pub use error::WorkflowError;
pub use executor::{ExecutionOutcome, ExtractionExecutor, JobExecutor};
pub use manager::{WorkflowManager, WorkflowStatus};
pub use pool::{PoolStatsSnapshot, WorkerPool};
pub use store::{FileSource, JsonFileStore};
