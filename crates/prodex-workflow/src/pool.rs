//! Parallel worker pool draining the processing queue
//!
//! Each worker loops dequeue, execute, report. Execution runs in a
//! child task so a panic is contained to the job, and a heartbeat task
//! keeps the job's lease alive for as long as the worker is making
//! progress. Stopping gracefully lets in-flight jobs finish; stopping
//! forcefully aborts them and requeues their jobs.

use crate::config::PoolConfig;
use crate::error::WorkflowError;
use crate::executor::{ExecutionOutcome, JobExecutor};
use prodex_queue::{Job, JobId, ProcessingQueue, RetryOutcome};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

/// Lifetime counters for the pool
#[derive(Debug, Default)]
pub struct PoolStats {
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    cancelled: AtomicU64,
    panics: AtomicU64,
    timeouts: AtomicU64,
}

/// Point-in-time copy of the pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    /// Jobs completed successfully
    pub completed: u64,
    /// Jobs failed terminally at the pool
    pub failed: u64,
    /// Jobs handed back for retry
    pub retried: u64,
    /// Jobs whose cancellation a worker confirmed
    pub cancelled: u64,
    /// Executor panics contained at the worker boundary
    pub panics: u64,
    /// Jobs force-failed by the wall-clock timeout
    pub timeouts: u64,
}

impl PoolStats {
    fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Fixed-size pool of queue-draining workers
pub struct WorkerPool {
    queue: Arc<ProcessingQueue>,
    executor: Arc<dyn JobExecutor>,
    config: PoolConfig,
    paused: Arc<AtomicBool>,
    stats: Arc<PoolStats>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a stopped pool
    pub fn new(
        queue: Arc<ProcessingQueue>,
        executor: Arc<dyn JobExecutor>,
        config: PoolConfig,
    ) -> Self {
        Self {
            queue,
            executor,
            config,
            paused: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(PoolStats::default()),
            shutdown: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the configured number of workers
    pub fn start(&self) -> Result<(), WorkflowError> {
        let mut shutdown = self.shutdown.lock().unwrap();
        if shutdown.is_some() {
            return Err(WorkflowError::AlreadyRunning);
        }

        let (tx, rx) = watch::channel(false);
        let mut handles = self.handles.lock().unwrap();
        for worker_id in 0..self.config.workers {
            let queue = self.queue.clone();
            let executor = self.executor.clone();
            let config = self.config.clone();
            let paused = self.paused.clone();
            let stats = self.stats.clone();
            let rx = rx.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, executor, config, paused, stats, rx).await;
            }));
        }
        *shutdown = Some(tx);
        info!(workers = self.config.workers, "worker pool started");
        Ok(())
    }

    /// Stop the pool.
    ///
    /// Graceful: workers finish their current job, dequeue nothing
    /// further, and the call waits up to `stop_grace_secs` before
    /// aborting stragglers. Forced: workers are aborted immediately. In
    /// both modes every job still in flight afterwards is requeued.
    pub async fn stop(&self, graceful: bool) -> Result<Vec<JobId>, WorkflowError> {
        let tx = self
            .shutdown
            .lock()
            .unwrap()
            .take()
            .ok_or(WorkflowError::NotRunning)?;
        let _ = tx.send(true);

        let handles: Vec<JoinHandle<()>> = self.handles.lock().unwrap().drain(..).collect();

        if graceful {
            let deadline = Instant::now() + Duration::from_secs(self.config.stop_grace_secs);
            for mut handle in handles {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if timeout(remaining, &mut handle).await.is_err() {
                    warn!("worker exceeded stop grace period, aborting");
                    handle.abort();
                }
            }
        } else {
            for handle in handles {
                handle.abort();
            }
        }

        let interrupted = self.queue.requeue_interrupted();
        info!(
            graceful,
            requeued = interrupted.len(),
            "worker pool stopped"
        );
        Ok(interrupted)
    }

    /// Workers idle without dequeuing; in-flight jobs are unaffected
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("worker pool paused");
    }

    /// Workers resume dequeuing
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        info!("worker pool resumed");
    }

    /// Whether the pool currently has workers running
    pub fn is_running(&self) -> bool {
        self.shutdown.lock().unwrap().is_some()
    }

    /// Current counters
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<ProcessingQueue>,
    executor: Arc<dyn JobExecutor>,
    config: PoolConfig,
    paused: Arc<AtomicBool>,
    stats: Arc<PoolStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker_id, "worker started");
    let poll = Duration::from_millis(config.poll_interval_ms);

    loop {
        if *shutdown.borrow() {
            break;
        }
        if paused.load(Ordering::SeqCst) {
            sleep(poll).await;
            continue;
        }

        let Some(job) = queue.dequeue() else {
            // Bounded poll while empty; wakes early on shutdown
            tokio::select! {
                _ = sleep(poll) => {}
                _ = shutdown.changed() => {}
            }
            continue;
        };

        run_job(worker_id, &queue, &executor, &config, &stats, job).await;
    }

    debug!(worker_id, "worker exited");
}

async fn run_job(
    worker_id: usize,
    queue: &Arc<ProcessingQueue>,
    executor: &Arc<dyn JobExecutor>,
    config: &PoolConfig,
    stats: &PoolStats,
    job: Job,
) {
    let job_id = job.id;
    debug!(worker_id, job_id = %job_id, product_id = %job.product_id, "job picked up");

    let heartbeat = {
        let queue = queue.clone();
        let interval_ms = config.heartbeat_interval_ms;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.tick().await;
            loop {
                interval.tick().await;
                if !queue.heartbeat(job_id) {
                    break;
                }
            }
        })
    };

    // Child task: a panic in the executor must not take the worker down
    let cancel = queue.cancel_flag(job_id);
    let mut work = {
        let executor = executor.clone();
        let job = job.clone();
        tokio::spawn(async move { executor.execute(&job, cancel).await })
    };

    let job_timeout = Duration::from_secs(config.job_timeout_secs);
    let outcome = timeout(job_timeout, &mut work).await;
    heartbeat.abort();

    match outcome {
        Err(_) => {
            work.abort();
            stats.timeouts.fetch_add(1, Ordering::Relaxed);
            warn!(worker_id, job_id = %job_id, "job exceeded wall-clock timeout");
            // Forced failure, regardless of remaining retry budget
            if let Err(e) = queue.mark_failed(
                job_id,
                format!("exceeded wall-clock timeout of {}s", config.job_timeout_secs),
            ) {
                warn!(job_id = %job_id, error = %e, "could not record timeout failure");
            }
            stats.failed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(Err(join_err)) => {
            let reason = if join_err.is_panic() {
                stats.panics.fetch_add(1, Ordering::Relaxed);
                error!(worker_id, job_id = %job_id, "executor panicked");
                "executor panicked".to_string()
            } else {
                format!("executor task failed: {}", join_err)
            };
            report_retryable_failure(queue, stats, job_id, reason);
        }
        Ok(Ok(ExecutionOutcome::Completed(result))) => {
            if let Err(e) = queue.mark_completed(job_id) {
                warn!(job_id = %job_id, error = %e, "could not mark job completed");
            } else {
                stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    worker_id,
                    job_id = %job_id,
                    status = ?result.status,
                    entries = result.entry_count(),
                    "job completed"
                );
            }
        }
        Ok(Ok(ExecutionOutcome::Cancelled)) => {
            if let Err(e) = queue.acknowledge_cancel(job_id) {
                warn!(job_id = %job_id, error = %e, "could not confirm cancellation");
            } else {
                stats.cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(Ok(ExecutionOutcome::Failed { error, retryable })) => {
            if retryable {
                report_retryable_failure(queue, stats, job_id, error);
            } else {
                if let Err(e) = queue.mark_failed(job_id, error) {
                    warn!(job_id = %job_id, error = %e, "could not record job failure");
                }
                stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn report_retryable_failure(
    queue: &ProcessingQueue,
    stats: &PoolStats,
    job_id: JobId,
    error: String,
) {
    match queue.requeue_for_retry(job_id, error) {
        Ok(RetryOutcome::Requeued { attempt, delay_ms }) => {
            stats.retried.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %job_id, attempt, delay_ms, "job requeued for retry");
        }
        Ok(RetryOutcome::Exhausted) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(job_id = %job_id, "job retry budget exhausted");
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "could not requeue job");
        }
    }
}
