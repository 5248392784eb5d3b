//! Job: one unit of schedulable, queueable work

use prodex_domain::DocumentRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current timestamp in milliseconds since Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Unique identifier for a job (UUIDv7, time-ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh id
    pub fn new() -> Self {
        JobId(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority levels for jobs; higher runs first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// Background work
    Low,
    /// Default priority
    Normal,
    /// Ahead of normal work
    High,
    /// Always first
    Critical,
}

impl JobPriority {
    /// Parse from a case-insensitive string, `None` if unrecognized
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(JobPriority::Low),
            "normal" => Some(JobPriority::Normal),
            "high" => Some(JobPriority::High),
            "critical" => Some(JobPriority::Critical),
            _ => None,
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

/// Status of a job, following the state machine:
/// `Pending -> InQueue -> Processing -> {Completed | Failed}`,
/// with `Failed -> Pending` while retry attempts remain, plus
/// `Paused` and `Cancelled` side states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created or awaiting (re-)queueing; not yet visible to workers
    Pending,
    /// Visible to `dequeue`
    InQueue,
    /// Held by exactly one worker
    Processing,
    /// Terminal: finished successfully
    Completed,
    /// Terminal once attempts are exhausted
    Failed,
    /// Terminal: cancelled before completion
    Cancelled,
    /// Parked; invisible to `dequeue` until resumed
    Paused,
}

impl JobStatus {
    /// Whether this status ends the job's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the job is queued or being worked on
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::InQueue | JobStatus::Processing)
    }
}

/// One unit of work: process one product document.
///
/// Identity (`id`) is immutable; status and bookkeeping fields are
/// mutated only by the `ProcessingQueue` and the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique id, generated at creation
    pub id: JobId,

    /// Product the document describes
    pub product_id: String,

    /// The document to process
    pub document: DocumentRef,

    /// Priority; higher dequeues first
    pub priority: JobPriority,

    /// Current lifecycle status
    pub status: JobStatus,

    /// Processing attempts consumed so far
    pub attempt_count: u32,

    /// Retry ceiling, enforced by the queue
    pub max_attempts: u32,

    /// Creation timestamp, milliseconds since Unix epoch
    pub created_at: u64,

    /// Earliest time the job may be dequeued, if deferred
    pub scheduled_at: Option<u64>,

    /// When processing last started
    pub started_at: Option<u64>,

    /// When the job reached a terminal status
    pub completed_at: Option<u64>,

    /// Most recent failure, if any
    pub last_error: Option<String>,

    /// Free-form tags for categorization and filtering
    pub tags: Vec<String>,
}

impl Job {
    /// Create a new pending job with default priority and retry budget
    pub fn new(product_id: impl Into<String>, document: DocumentRef) -> Self {
        Self {
            id: JobId::new(),
            product_id: product_id.into(),
            document,
            priority: JobPriority::Normal,
            status: JobStatus::Pending,
            attempt_count: 0,
            max_attempts: 3,
            created_at: now_millis(),
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            last_error: None,
            tags: Vec::new(),
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the retry ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Defer the job until the given time (milliseconds since epoch)
    pub fn with_scheduled_at(mut self, at: u64) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Whether the job may be dequeued at `now`
    pub fn is_due(&self, now: u64) -> bool {
        self.scheduled_at.map_or(true, |at| at <= now)
    }

    pub(crate) fn mark_queued(&mut self) {
        self.status = JobStatus::InQueue;
    }

    pub(crate) fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(now_millis());
    }

    pub(crate) fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now_millis());
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(now_millis());
        self.last_error = Some(error.into());
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(now_millis());
    }
}
