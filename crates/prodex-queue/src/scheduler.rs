//! Time-based job scheduling on top of the processing queue
//!
//! Holds one-shot jobs until their scheduled time and fires recurring
//! templates at fixed intervals, stamping a fresh job id per run.

use crate::error::QueueError;
use crate::job::{now_millis, Job, JobId, JobPriority};
use crate::queue::{CancelOutcome, ProcessingQueue};
use prodex_domain::DocumentRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the scheduler loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Due-time evaluation interval (milliseconds)
    pub tick_interval_ms: u64,

    /// Load at or above which pending normal-priority one-shot jobs are
    /// demoted to low priority
    pub load_high_watermark: f64,

    /// Load at or below which demoted jobs are restored
    pub load_low_watermark: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            load_high_watermark: 0.8,
            load_low_watermark: 0.2,
        }
    }
}

/// A recurring job definition; each firing submits a fresh job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTemplate {
    /// Template identity, stable across firings
    pub id: Uuid,
    /// Product the generated jobs extract
    pub product_id: String,
    /// Document the generated jobs process
    pub document: DocumentRef,
    /// Priority stamped on every generated job
    pub priority: JobPriority,
    /// Interval between firings (milliseconds)
    pub interval_ms: u64,
    /// Stop after this many firings; `None` runs forever
    pub max_runs: Option<u32>,
    /// Firings so far
    pub runs_completed: u32,
    /// Next due time (epoch millis)
    pub next_run_at: u64,
    /// False once `max_runs` is reached or the template is cancelled
    pub active: bool,
}

/// Outcome of cancelling a scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleCancelOutcome {
    /// Removed before execution started
    Cancelled,
    /// Already handed to a worker; only advisory cancellation remains
    AlreadyRunning,
    /// Already reached a terminal status
    AlreadyFinished,
    /// No such job
    NotFound,
}

#[derive(Default)]
struct SchedulerInner {
    /// One-shot jobs held until due
    pending: HashMap<JobId, Job>,
    recurring: HashMap<Uuid, RecurringTemplate>,
    load: f64,
    /// Jobs demoted by the load rule, for later restoration
    demoted: HashSet<JobId>,
}

#[derive(Serialize, Deserialize)]
struct PersistedSchedulerState {
    saved_at: u64,
    pending: Vec<Job>,
    recurring: Vec<RecurringTemplate>,
}

/// Submits jobs to the queue when their time comes
pub struct JobScheduler {
    queue: Arc<ProcessingQueue>,
    inner: Mutex<SchedulerInner>,
    config: SchedulerConfig,
}

impl JobScheduler {
    /// Create a scheduler feeding the given queue
    pub fn new(queue: Arc<ProcessingQueue>, config: SchedulerConfig) -> Self {
        Self {
            queue,
            inner: Mutex::new(SchedulerInner::default()),
            config,
        }
    }

    /// Schedule a job for a specific time.
    ///
    /// A time at or before now submits immediately rather than erroring.
    pub fn schedule_once(&self, mut job: Job, run_at: u64) -> Result<JobId, QueueError> {
        let id = job.id;
        if run_at <= now_millis() {
            debug!(job_id = %id, "scheduled time already passed, submitting now");
            job.scheduled_at = None;
            self.queue.enqueue(job)?;
        } else {
            job.scheduled_at = Some(run_at);
            info!(job_id = %id, run_at, "scheduled one-shot job");
            self.inner.lock().unwrap().pending.insert(id, job);
        }
        Ok(id)
    }

    /// Register a recurring extraction; the first run fires one interval
    /// from now. Returns the template id.
    pub fn schedule_recurring(
        &self,
        product_id: impl Into<String>,
        document: DocumentRef,
        priority: JobPriority,
        interval_ms: u64,
        max_runs: Option<u32>,
    ) -> Uuid {
        let template = RecurringTemplate {
            id: Uuid::now_v7(),
            product_id: product_id.into(),
            document,
            priority,
            interval_ms,
            max_runs,
            runs_completed: 0,
            next_run_at: now_millis() + interval_ms,
            active: true,
        };
        let id = template.id;
        info!(
            template_id = %id,
            product_id = %template.product_id,
            interval_ms,
            "registered recurring job"
        );
        self.inner.lock().unwrap().recurring.insert(id, template);
        id
    }

    /// Cancel a scheduled or queued job
    pub fn cancel(&self, job_id: JobId) -> ScheduleCancelOutcome {
        if self.inner.lock().unwrap().pending.remove(&job_id).is_some() {
            info!(job_id = %job_id, "cancelled scheduled job before submission");
            return ScheduleCancelOutcome::Cancelled;
        }
        match self.queue.cancel(job_id) {
            CancelOutcome::Cancelled => ScheduleCancelOutcome::Cancelled,
            CancelOutcome::Advisory => ScheduleCancelOutcome::AlreadyRunning,
            CancelOutcome::AlreadyTerminal => ScheduleCancelOutcome::AlreadyFinished,
            CancelOutcome::NotFound => ScheduleCancelOutcome::NotFound,
        }
    }

    /// Deactivate a recurring template. Jobs it already submitted are
    /// unaffected.
    pub fn cancel_recurring(&self, template_id: Uuid) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.recurring.get_mut(&template_id) {
            Some(template) => {
                template.active = false;
                info!(template_id = %template_id, "cancelled recurring template");
                true
            }
            None => false,
        }
    }

    /// Evaluate due times once and submit whatever is ready.
    ///
    /// Returns the number of jobs submitted to the queue.
    pub fn tick(&self) -> usize {
        let now = now_millis();
        let mut submitted = 0;

        let (due_jobs, due_recurring) = {
            let mut inner = self.inner.lock().unwrap();

            let due_ids: Vec<JobId> = inner
                .pending
                .values()
                .filter(|j| j.is_due(now))
                .map(|j| j.id)
                .collect();
            let due_jobs: Vec<Job> = due_ids
                .iter()
                .filter_map(|id| inner.pending.remove(id))
                .collect();

            let mut due_recurring = Vec::new();
            for template in inner.recurring.values_mut() {
                if !template.active || template.next_run_at > now {
                    continue;
                }
                template.runs_completed += 1;
                if let Some(max) = template.max_runs {
                    if template.runs_completed >= max {
                        template.active = false;
                        info!(
                            template_id = %template.id,
                            runs = template.runs_completed,
                            "recurring template reached run limit"
                        );
                    }
                }
                template.next_run_at = now + template.interval_ms;
                due_recurring.push(template.clone());
            }

            (due_jobs, due_recurring)
        };

        for job in due_jobs {
            let id = job.id;
            let mut submission = job.clone();
            submission.scheduled_at = None;
            match self.queue.enqueue(submission) {
                Ok(()) => submitted += 1,
                Err(e) => {
                    // Keep holding the job so the next tick retries
                    warn!(job_id = %id, error = %e, "failed to submit scheduled job, will retry");
                    self.inner.lock().unwrap().pending.insert(id, job);
                }
            }
        }

        for template in due_recurring {
            // Fresh identity per firing; recurring priority is fixed and
            // exempt from load demotion.
            let job = Job::new(template.product_id.clone(), template.document.clone())
                .with_priority(template.priority)
                .with_tag(format!("recurring:{}", template.id));
            let id = job.id;
            match self.queue.enqueue(job) {
                Ok(()) => {
                    debug!(template_id = %template.id, job_id = %id, "fired recurring job");
                    submitted += 1;
                }
                Err(e) => {
                    warn!(template_id = %template.id, error = %e, "failed to fire recurring job")
                }
            }
        }

        submitted
    }

    /// Report current system load in `[0.0, 1.0]`.
    ///
    /// At or above the high watermark, pending normal-priority one-shot
    /// jobs are demoted to low; at or below the low watermark, demoted
    /// jobs are restored. Recurring firings keep their template priority.
    pub fn set_load(&self, load: f64) {
        let load = load.clamp(0.0, 1.0);
        let (demote, restore) = {
            let mut inner = self.inner.lock().unwrap();
            inner.load = load;
            (
                load >= self.config.load_high_watermark,
                load <= self.config.load_low_watermark,
            )
        };

        if demote {
            let candidates: Vec<JobId> = self
                .queue
                .snapshot()
                .jobs
                .into_iter()
                .filter(|j| {
                    j.priority == JobPriority::Normal
                        && !j.status.is_terminal()
                        && !j.tags.iter().any(|t| t.starts_with("recurring:"))
                })
                .map(|j| j.id)
                .collect();
            let mut inner = self.inner.lock().unwrap();
            for id in candidates {
                if self.queue.reprioritize(id, JobPriority::Low) {
                    debug!(job_id = %id, load, "demoted job under high load");
                    inner.demoted.insert(id);
                }
            }
        } else if restore {
            let demoted: Vec<JobId> = {
                let mut inner = self.inner.lock().unwrap();
                inner.demoted.drain().collect()
            };
            for id in demoted {
                if self.queue.reprioritize(id, JobPriority::Normal) {
                    debug!(job_id = %id, load, "restored job priority under low load");
                }
            }
        }
    }

    /// Most recently reported load
    pub fn current_load(&self) -> f64 {
        self.inner.lock().unwrap().load
    }

    /// Jobs held for a future time, not yet submitted
    pub fn scheduled_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Snapshot of all recurring templates
    pub fn recurring_templates(&self) -> Vec<RecurringTemplate> {
        self.inner.lock().unwrap().recurring.values().cloned().collect()
    }

    /// Run the scheduler loop until shutdown is signalled.
    ///
    /// Each tick also reclaims expired leases from the queue.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        info!(tick_ms = self.config.tick_interval_ms, "scheduler loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                    self.queue.reclaim_expired();
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler loop stopped");
    }

    /// Persist scheduled jobs and recurring templates
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), QueueError> {
        let state = {
            let inner = self.inner.lock().unwrap();
            PersistedSchedulerState {
                saved_at: now_millis(),
                pending: inner.pending.values().cloned().collect(),
                recurring: inner.recurring.values().cloned().collect(),
            }
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| QueueError::State(format!("serialize: {}", e)))?;
        std::fs::write(path.as_ref(), json)
            .map_err(|e| QueueError::State(format!("write {}: {}", path.as_ref().display(), e)))?;
        info!(path = %path.as_ref().display(), "saved scheduler state");
        Ok(())
    }

    /// Restore scheduled jobs and recurring templates from disk
    pub fn load_state(&self, path: impl AsRef<Path>) -> Result<usize, QueueError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QueueError::State(format!("read {}: {}", path.as_ref().display(), e)))?;
        let state: PersistedSchedulerState = serde_json::from_str(&json)
            .map_err(|e| QueueError::State(format!("parse: {}", e)))?;

        let mut inner = self.inner.lock().unwrap();
        let restored = state.pending.len() + state.recurring.len();
        inner.pending = state.pending.into_iter().map(|j| (j.id, j)).collect();
        inner.recurring = state.recurring.into_iter().map(|t| (t.id, t)).collect();
        info!(path = %path.as_ref().display(), restored, "loaded scheduler state");
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueConfig;

    fn doc() -> DocumentRef {
        DocumentRef::Inline {
            name: "doc".to_string(),
            text: "text".to_string(),
        }
    }

    fn setup() -> (Arc<ProcessingQueue>, JobScheduler) {
        let queue = Arc::new(ProcessingQueue::new(QueueConfig::default()));
        let scheduler = JobScheduler::new(queue.clone(), SchedulerConfig::default());
        (queue, scheduler)
    }

    #[test]
    fn test_past_time_submits_immediately() {
        let (queue, scheduler) = setup();
        let job = Job::new("a", doc());
        scheduler.schedule_once(job, now_millis() - 1_000).unwrap();
        assert_eq!(scheduler.scheduled_count(), 0);
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_future_job_held_until_tick_after_due() {
        let (queue, scheduler) = setup();
        let job = Job::new("a", doc());
        let id = scheduler.schedule_once(job, now_millis() + 60_000).unwrap();

        assert_eq!(scheduler.tick(), 0);
        assert_eq!(queue.size(), 0);
        assert_eq!(scheduler.scheduled_count(), 1);

        // Pull the job due by rewriting its schedule
        {
            let mut inner = scheduler.inner.lock().unwrap();
            inner.pending.get_mut(&id).unwrap().scheduled_at = Some(now_millis() - 1);
        }
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(queue.size(), 1);
        assert_eq!(scheduler.scheduled_count(), 0);
    }

    #[test]
    fn test_full_queue_holds_due_job_for_next_tick() {
        let queue = Arc::new(ProcessingQueue::new(QueueConfig {
            max_size: 1,
            ..Default::default()
        }));
        let scheduler = JobScheduler::new(queue.clone(), SchedulerConfig::default());
        let filler = Job::new("filler", doc());
        let filler_id = filler.id;
        queue.enqueue(filler).unwrap();

        let id = scheduler
            .schedule_once(Job::new("a", doc()), now_millis() + 60_000)
            .unwrap();
        {
            let mut inner = scheduler.inner.lock().unwrap();
            inner.pending.get_mut(&id).unwrap().scheduled_at = Some(now_millis() - 1);
        }

        // Queue full: nothing submitted, but the job is not lost
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(scheduler.scheduled_count(), 1);
        assert!(queue.get_job(id).is_none());

        // Once the queue drains, the next tick submits it
        queue.dequeue().unwrap();
        queue.mark_completed(filler_id).unwrap();
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(scheduler.scheduled_count(), 0);
        assert!(queue.get_job(id).is_some());
    }

    #[test]
    fn test_cancel_before_submission() {
        let (queue, scheduler) = setup();
        let id = scheduler
            .schedule_once(Job::new("a", doc()), now_millis() + 60_000)
            .unwrap();
        assert_eq!(scheduler.cancel(id), ScheduleCancelOutcome::Cancelled);
        assert_eq!(scheduler.scheduled_count(), 0);
        assert_eq!(queue.size(), 0);
        assert_eq!(scheduler.cancel(id), ScheduleCancelOutcome::NotFound);
    }

    #[test]
    fn test_cancel_after_dequeue_is_advisory() {
        let (queue, scheduler) = setup();
        let id = scheduler
            .schedule_once(Job::new("a", doc()), now_millis() - 1)
            .unwrap();
        queue.dequeue().unwrap();
        assert_eq!(scheduler.cancel(id), ScheduleCancelOutcome::AlreadyRunning);
    }

    #[test]
    fn test_recurring_fires_with_fresh_ids_until_limit() {
        let (queue, scheduler) = setup();
        let template_id =
            scheduler.schedule_recurring("a", doc(), JobPriority::High, 10, Some(2));

        let mut fired = Vec::new();
        for _ in 0..2 {
            // Force the template due
            {
                let mut inner = scheduler.inner.lock().unwrap();
                inner.recurring.get_mut(&template_id).unwrap().next_run_at = now_millis() - 1;
            }
            assert_eq!(scheduler.tick(), 1);
            let job = queue.dequeue().unwrap();
            assert_eq!(job.priority, JobPriority::High);
            assert!(job.tags.contains(&format!("recurring:{}", template_id)));
            fired.push(job.id);
        }
        assert_ne!(fired[0], fired[1]);

        // Limit reached; template inactive, no more firings
        {
            let mut inner = scheduler.inner.lock().unwrap();
            inner.recurring.get_mut(&template_id).unwrap().next_run_at = now_millis() - 1;
        }
        assert_eq!(scheduler.tick(), 0);
        let template = &scheduler.recurring_templates()[0];
        assert!(!template.active);
        assert_eq!(template.runs_completed, 2);
    }

    #[test]
    fn test_cancel_recurring_stops_firing() {
        let (_, scheduler) = setup();
        let template_id = scheduler.schedule_recurring("a", doc(), JobPriority::Normal, 10, None);
        assert!(scheduler.cancel_recurring(template_id));
        {
            let mut inner = scheduler.inner.lock().unwrap();
            inner.recurring.get_mut(&template_id).unwrap().next_run_at = now_millis() - 1;
        }
        assert_eq!(scheduler.tick(), 0);
        assert!(!scheduler.cancel_recurring(Uuid::now_v7()));
    }

    #[test]
    fn test_load_demotes_and_restores_normal_jobs() {
        let (queue, scheduler) = setup();
        let normal = Job::new("a", doc());
        let critical = Job::new("b", doc()).with_priority(JobPriority::Critical);
        let id_normal = normal.id;
        queue.enqueue(normal).unwrap();
        queue.enqueue(critical).unwrap();

        scheduler.set_load(0.9);
        assert_eq!(queue.get_job(id_normal).unwrap().priority, JobPriority::Low);

        scheduler.set_load(0.1);
        assert_eq!(
            queue.get_job(id_normal).unwrap().priority,
            JobPriority::Normal
        );
    }

    #[test]
    fn test_load_skips_recurring_jobs() {
        let (queue, scheduler) = setup();
        let template_id =
            scheduler.schedule_recurring("a", doc(), JobPriority::Normal, 10, Some(1));
        {
            let mut inner = scheduler.inner.lock().unwrap();
            inner.recurring.get_mut(&template_id).unwrap().next_run_at = now_millis() - 1;
        }
        scheduler.tick();

        scheduler.set_load(0.9);
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.jobs[0].priority, JobPriority::Normal);
    }

    #[test]
    fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler_state.json");

        let (_, scheduler) = setup();
        scheduler
            .schedule_once(Job::new("a", doc()), now_millis() + 60_000)
            .unwrap();
        scheduler.schedule_recurring("b", doc(), JobPriority::High, 1_000, Some(5));
        scheduler.save_state(&path).unwrap();

        let (_, restored) = setup();
        assert_eq!(restored.load_state(&path).unwrap(), 2);
        assert_eq!(restored.scheduled_count(), 1);
        assert_eq!(restored.recurring_templates().len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_shutdown() {
        let (queue, scheduler) = setup();
        scheduler
            .schedule_once(Job::new("a", doc()), now_millis() - 1)
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let scheduler = Arc::new(scheduler);
        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run(rx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(queue.size(), 1);
    }
}
