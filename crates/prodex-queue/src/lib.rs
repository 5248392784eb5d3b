//! Prodex Job Queue and Scheduler
//!
//! The thread-safe heart of the orchestration core:
//!
//! - [`Job`]: an immutable-identity, mutable-status unit of work with a
//!   strict status state machine
//! - [`ProcessingQueue`]: priority + FIFO queue with centrally enforced
//!   retry ceilings, lease-based crash recovery, and a serializable
//!   snapshot for restarts
//! - [`JobScheduler`]: time-based and recurring submission into the
//!   queue, decoupled from worker execution
//!
//! Ordering contract: strict priority order, FIFO within equal priority
//! by enqueue sequence. Jobs with a future `scheduled_at` are invisible
//! to `dequeue` until due. Completion order across workers is not
//! guaranteed.

#![warn(missing_docs)]

pub mod error;
pub mod job;
pub mod queue;
pub mod scheduler;

pub use error::QueueError;
pub use job::{now_millis, Job, JobId, JobPriority, JobStatus};
pub use queue::{CancelOutcome, ProcessingQueue, QueueConfig, QueueSnapshot, QueueStats, RetryOutcome};
pub use scheduler::{JobScheduler, RecurringTemplate, ScheduleCancelOutcome, SchedulerConfig};
