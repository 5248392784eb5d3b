//! The work a worker performs per job, behind a trait so the pool can
//! be tested without an LLM.

use async_trait::async_trait;
use prodex_domain::{ExtractionStatus, ProductResult};
use prodex_extractor::{ChunkProcessor, ExtractError};
use prodex_queue::Job;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::warn;

/// What executing one job came to
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// A result was produced and persisted (it may still record
    /// partial completion or validation failure in its status)
    Completed(Box<ProductResult>),
    /// The advisory cancel flag was honored at a chunk boundary
    Cancelled,
    /// Execution failed before a result could be persisted
    Failed {
        /// Description for the job's error field
        error: String,
        /// Whether the queue should spend a retry attempt on it
        retryable: bool,
    },
}

/// Executes one job; implementations must be safe to call from many
/// workers at once.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    /// Run the job to an outcome; never panics for expected failures
    async fn execute(&self, job: &Job, cancel: Option<Arc<AtomicBool>>) -> ExecutionOutcome;
}

/// Production executor: runs the chunk extraction pipeline
pub struct ExtractionExecutor {
    processor: ChunkProcessor,
}

impl ExtractionExecutor {
    /// Wrap a configured processor
    pub fn new(processor: ChunkProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl JobExecutor for ExtractionExecutor {
    async fn execute(&self, job: &Job, cancel: Option<Arc<AtomicBool>>) -> ExecutionOutcome {
        let outcome = self
            .processor
            .process(&job.product_id, &job.document, cancel.as_deref())
            .await;

        match outcome {
            Ok(result) => {
                // An all-chunks-failed result is a retryable job failure;
                // the next attempt may hit a healthier provider.
                if result.status == ExtractionStatus::Failed {
                    let error = result
                        .errors
                        .last()
                        .cloned()
                        .unwrap_or_else(|| "all chunks failed".to_string());
                    return ExecutionOutcome::Failed {
                        error,
                        retryable: true,
                    };
                }
                ExecutionOutcome::Completed(Box::new(result))
            }
            Err(ExtractError::Cancelled { .. }) => ExecutionOutcome::Cancelled,
            Err(e @ ExtractError::Source(_)) | Err(e @ ExtractError::DocumentTooLarge { .. }) => {
                warn!(job_id = %job.id, error = %e, "non-retryable extraction failure");
                ExecutionOutcome::Failed {
                    error: e.to_string(),
                    retryable: false,
                }
            }
            Err(e) => ExecutionOutcome::Failed {
                error: e.to_string(),
                retryable: true,
            },
        }
    }
}
