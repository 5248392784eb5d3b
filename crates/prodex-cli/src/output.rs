//! Colored summary output for the CLI.

use colored::Colorize;
use prodex_queue::{Job, JobStatus};
use prodex_workflow::{BatchStatus, BatchSummary, WorkflowStatus};

/// Renders human-readable summaries, optionally colored.
pub struct Printer;

impl Printer {
    /// Create a printer; `color = false` disables ANSI codes globally
    pub fn new(color: bool) -> Self {
        if !color {
            colored::control::set_override(false);
        }
        Self
    }

    /// One line per finished job
    pub fn job_line(&self, job: &Job) {
        let mut line = format!("{}  {}", status_label(job.status), job.product_id);
        if let Some(error) = &job.last_error {
            line.push_str(&format!("  ({})", error));
        }
        if job.attempt_count > 0 {
            line.push_str(&format!("  [{} retries]", job.attempt_count));
        }
        println!("{}", line);
    }

    /// Aggregate line for a batch
    pub fn batch_summary(&self, summary: &BatchSummary) {
        let label = match summary.status {
            BatchStatus::Completed => "batch completed".green().bold(),
            BatchStatus::PartiallyFailed => "batch partially failed".yellow().bold(),
            BatchStatus::Failed => "batch failed".red().bold(),
            BatchStatus::Pending | BatchStatus::InProgress => "batch in progress".normal(),
        };
        println!(
            "{}: {} total, {} completed, {} failed, {} cancelled",
            label, summary.total, summary.completed, summary.failed, summary.cancelled
        );
    }

    /// Periodic status line for the long-running service
    pub fn status_line(&self, status: &WorkflowStatus) {
        println!("{}", status_text(status));
    }
}

fn status_text(status: &WorkflowStatus) -> String {
    let queued = status
        .queue
        .jobs
        .iter()
        .filter(|j| matches!(j.status, JobStatus::Pending | JobStatus::InQueue))
        .count();
    format!(
        "workers={} queued={} in_flight={} scheduled={} completed={} failed={} retried={}",
        status.workers,
        queued,
        status.queue.in_flight,
        status.scheduled,
        status.pool.completed,
        status.pool.failed,
        status.pool.retried,
    )
}

fn status_label(status: JobStatus) -> colored::ColoredString {
    match status {
        JobStatus::Completed => "ok".green().bold(),
        JobStatus::Failed => "failed".red().bold(),
        JobStatus::Cancelled => "cancelled".yellow(),
        JobStatus::Pending => "pending".normal(),
        JobStatus::InQueue => "queued".normal(),
        JobStatus::Processing => "processing".normal(),
        JobStatus::Paused => "paused".normal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodex_domain::DocumentRef;
    use prodex_queue::{QueueSnapshot, QueueStats};
    use prodex_workflow::PoolStatsSnapshot;

    fn job_with_status(status: JobStatus) -> Job {
        let mut job = Job::new(
            "p",
            DocumentRef::Inline {
                name: "d".to_string(),
                text: "t".to_string(),
            },
        );
        job.status = status;
        job
    }

    #[test]
    fn test_status_line_counts_only_waiting_jobs() {
        let jobs = vec![
            job_with_status(JobStatus::Pending),
            job_with_status(JobStatus::InQueue),
            job_with_status(JobStatus::Processing),
            job_with_status(JobStatus::Paused),
        ];
        let status = WorkflowStatus {
            running: true,
            workers: 4,
            queue: QueueSnapshot {
                jobs,
                stats: QueueStats::default(),
                in_flight: 1,
            },
            pool: PoolStatsSnapshot::default(),
            scheduled: 0,
            load: 0.0,
        };

        let line = status_text(&status);
        assert!(line.contains("queued=2"), "{}", line);
        assert!(line.contains("in_flight=1"), "{}", line);
    }
}
