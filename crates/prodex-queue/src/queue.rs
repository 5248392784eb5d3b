//! Thread-safe priority job queue with retry and lease management
//!
//! All mutation is serialized through one internal mutex; multiple
//! workers may call `dequeue` concurrently and each receives a distinct
//! job. Retry ceilings are enforced here, centrally, never by callers.

use crate::error::QueueError;
use crate::job::{now_millis, Job, JobId, JobPriority, JobStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Configuration for the processing queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of tracked non-terminal jobs
    pub max_size: usize,

    /// Base delay before a retried job becomes due again (milliseconds);
    /// doubles per attempt, capped by `retry_backoff_cap_ms`
    pub retry_backoff_base_ms: u64,

    /// Upper bound on the retry backoff delay (milliseconds)
    pub retry_backoff_cap_ms: u64,

    /// Lease duration for in-flight jobs (milliseconds); a worker that
    /// stops heartbeating for this long is considered crashed
    pub lease_ms: u64,

    /// How many finished (terminal) jobs are kept for status queries;
    /// older ones are dropped oldest-first. Should be at least the
    /// largest batch size so batch summaries see every member.
    pub finished_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000,
            retry_backoff_base_ms: 2_000,
            retry_backoff_cap_ms: 60_000,
            lease_ms: 30_000,
            finished_capacity: 1_000,
        }
    }
}

/// Counters maintained across the queue's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs accepted by `enqueue`
    pub enqueued: u64,
    /// Jobs handed to workers
    pub dequeued: u64,
    /// Jobs completed successfully
    pub completed: u64,
    /// Jobs failed terminally
    pub failed: u64,
    /// Retry re-insertions
    pub retried: u64,
    /// Jobs cancelled before completion
    pub cancelled: u64,
    /// Jobs paused
    pub paused: u64,
    /// In-flight jobs reclaimed from crashed workers
    pub reclaimed: u64,
}

/// Read-only view of the queue for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Live (non-terminal) jobs, ordered by creation time
    pub jobs: Vec<Job>,
    /// Lifetime counters
    pub stats: QueueStats,
    /// Jobs currently held by workers
    pub in_flight: usize,
}

/// Outcome of `requeue_for_retry`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Job re-inserted; becomes due after the backoff delay
    Requeued {
        /// Attempt number just consumed
        attempt: u32,
        /// Backoff delay applied before the job is due again
        delay_ms: u64,
    },
    /// Retry budget exhausted; job transitioned to terminal `Failed`
    Exhausted,
}

/// Outcome of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Job was still waiting and is now `Cancelled`
    Cancelled,
    /// Job is being processed; the worker was asked to stop at the next
    /// chunk boundary (in-flight LLM calls run to completion)
    Advisory,
    /// Job already reached a terminal status
    AlreadyTerminal,
    /// No such job
    NotFound,
}

/// Heap entry; ordered by priority (descending), then FIFO by creation
/// time, then insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadyEntry {
    priority: JobPriority,
    created_at: u64,
    seq: u64,
    id: JobId,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: greater pops first
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueInner {
    /// Live (non-terminal) jobs only; finished jobs move to `finished`
    jobs: HashMap<JobId, Job>,
    /// Recently finished jobs, bounded by `finished_capacity`
    finished: VecDeque<Job>,
    ready: BinaryHeap<ReadyEntry>,
    /// Jobs waiting for a future `scheduled_at`
    deferred: Vec<JobId>,
    /// Advisory cancellation flags for in-flight jobs
    cancel_flags: HashMap<JobId, Arc<AtomicBool>>,
    /// Lease expiry (epoch millis) per in-flight job
    leases: HashMap<JobId, u64>,
    seq: u64,
    stats: QueueStats,
    paused_all: bool,
}

#[derive(Serialize, Deserialize)]
struct PersistedQueueState {
    saved_at: u64,
    jobs: Vec<Job>,
    stats: QueueStats,
}

/// Thread-safe priority queue of jobs
pub struct ProcessingQueue {
    inner: Mutex<QueueInner>,
    config: QueueConfig,
}

impl ProcessingQueue {
    /// Create an empty queue
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            config,
        }
    }

    /// Create a queue with default configuration
    pub fn default_config() -> Self {
        Self::new(QueueConfig::default())
    }

    /// Add a job to the queue.
    ///
    /// A job with a future `scheduled_at` stays `Pending` and invisible
    /// to `dequeue` until due; anything else becomes `InQueue`
    /// immediately.
    pub fn enqueue(&self, mut job: Job) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.jobs.contains_key(&job.id) {
            warn!(job_id = %job.id, "rejected duplicate job");
            return Err(QueueError::DuplicateJob(job.id));
        }
        if inner.jobs.len() >= self.config.max_size {
            return Err(QueueError::QueueFull(self.config.max_size));
        }

        let now = now_millis();
        if job.is_due(now) {
            job.mark_queued();
            Self::push_ready(&mut inner, &job);
        } else {
            job.status = JobStatus::Pending;
            let id = job.id;
            inner.deferred.push(id);
        }

        inner.stats.enqueued += 1;
        info!(
            job_id = %job.id,
            product_id = %job.product_id,
            priority = ?job.priority,
            deferred = !job.is_due(now),
            "enqueued job"
        );
        inner.jobs.insert(job.id, job);
        Ok(())
    }

    /// Take the next due job, marking it `Processing` under a lease.
    ///
    /// Returns `None` when no job is due or the queue is paused; callers
    /// poll at a bounded interval rather than blocking.
    pub fn dequeue(&self) -> Option<Job> {
        let mut inner = self.inner.lock().unwrap();

        if inner.paused_all {
            return None;
        }

        let now = now_millis();
        Self::promote_due(&mut inner, now);

        while let Some(entry) = inner.ready.pop() {
            let job = match inner.jobs.get_mut(&entry.id) {
                Some(job) => job,
                None => continue,
            };
            // Stale entries: superseded by reprioritization, or the job
            // was cancelled/paused while queued.
            if job.status != JobStatus::InQueue || job.priority != entry.priority {
                continue;
            }

            job.mark_processing();
            let job = job.clone();
            inner.leases.insert(job.id, now + self.config.lease_ms);
            inner
                .cancel_flags
                .insert(job.id, Arc::new(AtomicBool::new(false)));
            inner.stats.dequeued += 1;
            debug!(job_id = %job.id, product_id = %job.product_id, "dequeued job");
            return Some(job);
        }

        None
    }

    /// Report successful completion of an in-flight job.
    ///
    /// The job leaves the live set and is kept in the bounded finished
    /// archive for status queries.
    pub fn mark_completed(&self, job_id: JobId) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let job = match inner.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => return Err(self.missing_job_error(&inner, job_id, JobStatus::Completed)),
        };

        if job.status != JobStatus::Processing {
            return Err(QueueError::InvalidTransition {
                job_id,
                from: job.status,
                to: JobStatus::Completed,
            });
        }

        job.mark_completed();
        let product_id = job.product_id.clone();
        inner.leases.remove(&job_id);
        inner.cancel_flags.remove(&job_id);
        inner.stats.completed += 1;
        self.archive_finished(&mut inner, job_id);
        info!(job_id = %job_id, product_id = %product_id, "job completed");
        Ok(())
    }

    /// Report terminal failure of a job, bypassing the retry budget.
    ///
    /// Used for non-retryable outcomes (wall-clock timeout, critical
    /// I/O failure); retryable failures go through `requeue_for_retry`.
    pub fn mark_failed(&self, job_id: JobId, error: impl Into<String>) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let job = match inner.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => return Err(self.missing_job_error(&inner, job_id, JobStatus::Failed)),
        };

        let error = error.into();
        warn!(job_id = %job_id, error, "job failed terminally");
        job.mark_failed(error);
        inner.leases.remove(&job_id);
        inner.cancel_flags.remove(&job_id);
        inner.stats.failed += 1;
        self.archive_finished(&mut inner, job_id);
        Ok(())
    }

    /// Re-insert a failed in-flight job for another attempt.
    ///
    /// Increments `attempt_count`; once the ceiling is reached the queue
    /// marks the job `Failed` instead. The retried job becomes due after
    /// an exponential backoff delay.
    pub fn requeue_for_retry(
        &self,
        job_id: JobId,
        error: impl Into<String>,
    ) -> Result<RetryOutcome, QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let job = match inner.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => return Err(self.missing_job_error(&inner, job_id, JobStatus::Pending)),
        };

        if job.status != JobStatus::Processing {
            return Err(QueueError::InvalidTransition {
                job_id,
                from: job.status,
                to: JobStatus::Pending,
            });
        }

        let error = error.into();

        if job.attempt_count >= job.max_attempts {
            warn!(
                job_id = %job_id,
                attempts = job.attempt_count,
                "retry budget exhausted, failing job"
            );
            job.mark_failed(error);
            inner.leases.remove(&job_id);
            inner.cancel_flags.remove(&job_id);
            inner.stats.failed += 1;
            self.archive_finished(&mut inner, job_id);
            return Ok(RetryOutcome::Exhausted);
        }

        job.attempt_count += 1;
        let attempt = job.attempt_count;
        let delay_ms = self.retry_backoff(attempt);
        job.status = JobStatus::Pending;
        job.last_error = Some(error);
        job.scheduled_at = Some(now_millis() + delay_ms);
        debug!(job_id = %job_id, attempt, delay_ms, "requeued job for retry");

        inner.deferred.push(job_id);
        inner.leases.remove(&job_id);
        inner.cancel_flags.remove(&job_id);
        inner.stats.retried += 1;
        Ok(RetryOutcome::Requeued { attempt, delay_ms })
    }

    /// Request cancellation of a job.
    ///
    /// Waiting jobs are cancelled outright; in-flight jobs get an
    /// advisory flag checked at chunk boundaries.
    pub fn cancel(&self, job_id: JobId) -> CancelOutcome {
        use std::sync::atomic::Ordering as AtomicOrdering;

        let mut inner = self.inner.lock().unwrap();
        if Self::finished_status(&inner, job_id).is_some() {
            return CancelOutcome::AlreadyTerminal;
        }
        let job = match inner.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => return CancelOutcome::NotFound,
        };

        match job.status {
            JobStatus::Pending | JobStatus::InQueue | JobStatus::Paused => {
                job.mark_cancelled();
                inner.deferred.retain(|id| *id != job_id);
                inner.stats.cancelled += 1;
                self.archive_finished(&mut inner, job_id);
                info!(job_id = %job_id, "cancelled waiting job");
                CancelOutcome::Cancelled
            }
            JobStatus::Processing => {
                if let Some(flag) = inner.cancel_flags.get(&job_id) {
                    flag.store(true, AtomicOrdering::SeqCst);
                }
                info!(job_id = %job_id, "requested advisory cancel of in-flight job");
                CancelOutcome::Advisory
            }
            _ => CancelOutcome::AlreadyTerminal,
        }
    }

    /// Confirm that a worker honored an advisory cancel.
    ///
    /// Transitions the in-flight job to `Cancelled`; called by the
    /// worker after it aborted at a chunk boundary.
    pub fn acknowledge_cancel(&self, job_id: JobId) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let job = match inner.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => return Err(self.missing_job_error(&inner, job_id, JobStatus::Cancelled)),
        };

        if job.status != JobStatus::Processing {
            return Err(QueueError::InvalidTransition {
                job_id,
                from: job.status,
                to: JobStatus::Cancelled,
            });
        }

        job.mark_cancelled();
        inner.leases.remove(&job_id);
        inner.cancel_flags.remove(&job_id);
        inner.stats.cancelled += 1;
        self.archive_finished(&mut inner, job_id);
        info!(job_id = %job_id, "worker confirmed cancellation");
        Ok(())
    }

    /// The advisory cancellation flag for an in-flight job
    pub fn cancel_flag(&self, job_id: JobId) -> Option<Arc<AtomicBool>> {
        self.inner.lock().unwrap().cancel_flags.get(&job_id).cloned()
    }

    /// Park a waiting job; it becomes invisible to `dequeue`
    pub fn pause_job(&self, job_id: JobId) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or(QueueError::UnknownJob(job_id))?;

        match job.status {
            JobStatus::Pending | JobStatus::InQueue => {
                job.status = JobStatus::Paused;
                inner.deferred.retain(|id| *id != job_id);
                inner.stats.paused += 1;
                Ok(())
            }
            from => Err(QueueError::InvalidTransition {
                job_id,
                from,
                to: JobStatus::Paused,
            }),
        }
    }

    /// Return a paused job to the queue
    pub fn resume_job(&self, job_id: JobId) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&job_id)
            .ok_or(QueueError::UnknownJob(job_id))?;

        if job.status != JobStatus::Paused {
            return Err(QueueError::InvalidTransition {
                job_id,
                from: job.status,
                to: JobStatus::InQueue,
            });
        }

        if job.is_due(now_millis()) {
            job.mark_queued();
            let job = job.clone();
            Self::push_ready(&mut inner, &job);
        } else {
            job.status = JobStatus::Pending;
            inner.deferred.push(job_id);
        }
        Ok(())
    }

    /// Stop handing out jobs until `resume_all`
    pub fn pause_all(&self) {
        self.inner.lock().unwrap().paused_all = true;
        info!("queue paused");
    }

    /// Resume handing out jobs
    pub fn resume_all(&self) {
        self.inner.lock().unwrap().paused_all = false;
        info!("queue resumed");
    }

    /// Extend the lease of an in-flight job. Returns false if the job
    /// is no longer held (completed, reclaimed, or unknown).
    pub fn heartbeat(&self, job_id: JobId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let held = matches!(
            inner.jobs.get(&job_id).map(|j| j.status),
            Some(JobStatus::Processing)
        );
        if held {
            inner.leases.insert(job_id, now_millis() + self.config.lease_ms);
        }
        held
    }

    /// Return in-flight jobs whose lease has expired to `Pending`.
    ///
    /// Detects workers that died mid-execution; at-least-once semantics.
    pub fn reclaim_expired(&self) -> Vec<JobId> {
        let mut inner = self.inner.lock().unwrap();
        let now = now_millis();

        let expired: Vec<JobId> = inner
            .leases
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(id, _)| *id)
            .collect();

        for job_id in &expired {
            if let Some(job) = inner.jobs.get_mut(job_id) {
                if job.status == JobStatus::Processing {
                    warn!(job_id = %job_id, "lease expired, reclaiming job from crashed worker");
                    job.mark_queued();
                    job.scheduled_at = None;
                    let job = job.clone();
                    Self::push_ready(&mut inner, &job);
                    inner.stats.reclaimed += 1;
                }
            }
            inner.leases.remove(job_id);
            inner.cancel_flags.remove(job_id);
        }

        expired
    }

    /// Return every in-flight job to `Pending`, regardless of lease.
    ///
    /// Used on forced shutdown so interrupted work is never dropped.
    pub fn requeue_interrupted(&self) -> Vec<JobId> {
        let mut inner = self.inner.lock().unwrap();

        let in_flight: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Processing)
            .map(|j| j.id)
            .collect();

        for job_id in &in_flight {
            if let Some(job) = inner.jobs.get_mut(job_id) {
                job.status = JobStatus::Pending;
                job.scheduled_at = None;
                inner.deferred.push(*job_id);
            }
            inner.leases.remove(job_id);
            inner.cancel_flags.remove(job_id);
        }

        if !in_flight.is_empty() {
            warn!(count = in_flight.len(), "requeued interrupted in-flight jobs");
        }
        in_flight
    }

    /// Adjust the priority of a job that has not yet been dequeued.
    ///
    /// Returns true if applied. Takes effect via lazy invalidation: the
    /// old heap entry is skipped on pop.
    pub fn reprioritize(&self, job_id: JobId, priority: JobPriority) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let job = match inner.jobs.get_mut(&job_id) {
            Some(job) => job,
            None => return false,
        };

        match job.status {
            JobStatus::Pending | JobStatus::InQueue => {
                if job.priority == priority {
                    return true;
                }
                job.priority = priority;
                debug!(job_id = %job_id, priority = ?priority, "reprioritized job");
                if job.status == JobStatus::InQueue {
                    let job = job.clone();
                    Self::push_ready(&mut inner, &job);
                }
                true
            }
            _ => false,
        }
    }

    /// Number of jobs awaiting execution (`Pending` or `InQueue`)
    pub fn size(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::InQueue))
            .count()
    }

    /// Whether no job is awaiting execution or in flight
    pub fn is_idle(&self) -> bool {
        !self
            .inner
            .lock()
            .unwrap()
            .jobs
            .values()
            .any(|j| !j.status.is_terminal() && j.status != JobStatus::Paused)
    }

    /// Fetch a job by id, live or recently finished
    pub fn get_job(&self, job_id: JobId) -> Option<Job> {
        let inner = self.inner.lock().unwrap();
        inner
            .jobs
            .get(&job_id)
            .or_else(|| inner.finished.iter().find(|j| j.id == job_id))
            .cloned()
    }

    /// All live or recently finished jobs in the given status
    pub fn jobs_by_status(&self, status: JobStatus) -> Vec<Job> {
        let inner = self.inner.lock().unwrap();
        inner
            .jobs
            .values()
            .chain(inner.finished.iter())
            .filter(|j| j.status == status)
            .cloned()
            .collect()
    }

    /// Read-only view for monitoring
    pub fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<Job> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| (j.created_at, j.id.to_string()));
        QueueSnapshot {
            jobs,
            stats: inner.stats.clone(),
            in_flight: inner.leases.len(),
        }
    }

    /// Persist queue state so `Pending`/`InQueue` work survives restarts.
    ///
    /// Only live jobs are written; the finished archive exists for
    /// status queries and is not carried across restarts.
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), QueueError> {
        let state = {
            let inner = self.inner.lock().unwrap();
            PersistedQueueState {
                saved_at: now_millis(),
                jobs: inner.jobs.values().cloned().collect(),
                stats: inner.stats.clone(),
            }
        };

        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| QueueError::State(format!("serialize: {}", e)))?;
        std::fs::write(path.as_ref(), json)
            .map_err(|e| QueueError::State(format!("write {}: {}", path.as_ref().display(), e)))?;
        info!(path = %path.as_ref().display(), "saved queue state");
        Ok(())
    }

    /// Rebuild the queue from a persisted state file.
    ///
    /// Jobs that were `Processing` at save time are restored as
    /// `Pending` (the worker holding them is gone).
    pub fn load_state(&self, path: impl AsRef<Path>) -> Result<usize, QueueError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QueueError::State(format!("read {}: {}", path.as_ref().display(), e)))?;
        let state: PersistedQueueState = serde_json::from_str(&json)
            .map_err(|e| QueueError::State(format!("parse: {}", e)))?;

        let mut inner = self.inner.lock().unwrap();
        *inner = QueueInner::default();
        inner.stats = state.stats;

        let now = now_millis();
        let mut restored = 0;
        for mut job in state.jobs {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Pending;
                job.scheduled_at = None;
            }
            if job.status.is_terminal() {
                // Old state files may still carry finished jobs
                inner.finished.push_back(job);
                while inner.finished.len() > self.config.finished_capacity {
                    inner.finished.pop_front();
                }
                continue;
            }
            match job.status {
                JobStatus::Pending | JobStatus::InQueue => {
                    if job.is_due(now) {
                        job.mark_queued();
                        Self::push_ready(&mut inner, &job);
                    } else {
                        job.status = JobStatus::Pending;
                        inner.deferred.push(job.id);
                    }
                    restored += 1;
                }
                _ => {}
            }
            inner.jobs.insert(job.id, job);
        }

        info!(
            path = %path.as_ref().display(),
            restored,
            "loaded queue state"
        );
        Ok(restored)
    }

    /// Move a now-terminal job out of the live set into the bounded
    /// finished archive
    fn archive_finished(&self, inner: &mut QueueInner, job_id: JobId) {
        if let Some(job) = inner.jobs.remove(&job_id) {
            inner.finished.push_back(job);
            while inner.finished.len() > self.config.finished_capacity {
                inner.finished.pop_front();
            }
        }
    }

    fn finished_status(inner: &QueueInner, job_id: JobId) -> Option<JobStatus> {
        inner
            .finished
            .iter()
            .find(|j| j.id == job_id)
            .map(|j| j.status)
    }

    fn missing_job_error(&self, inner: &QueueInner, job_id: JobId, to: JobStatus) -> QueueError {
        match Self::finished_status(inner, job_id) {
            Some(from) => QueueError::InvalidTransition { job_id, from, to },
            None => QueueError::UnknownJob(job_id),
        }
    }

    fn retry_backoff(&self, attempt: u32) -> u64 {
        let exp = self
            .config
            .retry_backoff_base_ms
            .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
        exp.min(self.config.retry_backoff_cap_ms)
    }

    fn push_ready(inner: &mut QueueInner, job: &Job) {
        inner.seq += 1;
        let seq = inner.seq;
        inner.ready.push(ReadyEntry {
            priority: job.priority,
            created_at: job.created_at,
            seq,
            id: job.id,
        });
    }

    /// Move due deferred jobs into the ready heap
    fn promote_due(inner: &mut QueueInner, now: u64) {
        let mut promoted = Vec::new();
        let QueueInner { deferred, jobs, .. } = inner;
        deferred.retain(|id| {
            let due = jobs
                .get(id)
                .map(|j| j.status == JobStatus::Pending && j.is_due(now))
                .unwrap_or(false);
            if due {
                promoted.push(*id);
            }
            !due
        });
        for id in promoted {
            if let Some(job) = inner.jobs.get_mut(&id) {
                job.mark_queued();
                let job = job.clone();
                Self::push_ready(inner, &job);
            }
        }
    }
}
