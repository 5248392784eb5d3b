//! Error types for queue and scheduler operations

use crate::job::{JobId, JobStatus};
use thiserror::Error;

/// Errors from queue operations.
///
/// `DuplicateJob` is a control-flow signal callers branch on, not a
/// processing failure. An empty queue is not an error at all: `dequeue`
/// returns `None`.
#[derive(Error, Debug)]
pub enum QueueError {
    /// A job with this id is already tracked by the queue
    #[error("duplicate job: {0}")]
    DuplicateJob(JobId),

    /// The queue is at capacity
    #[error("queue is full (capacity {0})")]
    QueueFull(usize),

    /// No job with this id is tracked by the queue
    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    /// The requested status transition is not allowed
    #[error("invalid transition for job {job_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Job the transition was attempted on
        job_id: JobId,
        /// Current status
        from: JobStatus,
        /// Requested status
        to: JobStatus,
    },

    /// State file read/write failure
    #[error("state persistence error: {0}")]
    State(String),
}
