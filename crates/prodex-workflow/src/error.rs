//! Workflow-level errors

use prodex_queue::QueueError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the workflow layer
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Queue operation failed
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Batch CSV could not be read or parsed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A CSV row is missing a required column
    #[error("CSV row {row}: {reason}")]
    CsvRow {
        /// 1-based row number, header excluded
        row: usize,
        /// What was wrong with the row
        reason: String,
    },

    /// A directory batch matched no processable files
    #[error("no processable documents in {0}")]
    EmptyBatch(PathBuf),

    /// Configuration could not be loaded or failed validation
    #[error("configuration error: {0}")]
    Config(String),

    /// The worker pool was asked to start twice
    #[error("worker pool is already running")]
    AlreadyRunning,

    /// An operation needs a running pool
    #[error("worker pool is not running")]
    NotRunning,
}
