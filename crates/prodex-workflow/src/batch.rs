//! Batch submission from directories and CSV manifests
//!
//! A batch is a reporting handle over a set of jobs; it holds no
//! processing logic, and its status is derived from member job
//! statuses on demand.

use crate::error::WorkflowError;
use prodex_domain::DocumentRef;
use prodex_queue::{Job, JobId, JobPriority, JobStatus, ProcessingQueue};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// File extensions treated as processable documents
const DOCUMENT_EXTENSIONS: [&str; 4] = ["txt", "md", "html", "htm"];

/// A submitted set of jobs, tracked together for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identity
    pub batch_id: Uuid,
    /// Member jobs in submission order
    pub job_ids: Vec<JobId>,
}

/// Aggregate of member job statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// No member has started yet
    Pending,
    /// At least one member is running or still waiting
    InProgress,
    /// Every member completed
    Completed,
    /// Members finished with a mix of outcomes
    PartiallyFailed,
    /// Every member failed or was cancelled
    Failed,
}

/// Point-in-time counts for a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Derived aggregate status
    pub status: BatchStatus,
    /// Member count
    pub total: usize,
    /// Members completed
    pub completed: usize,
    /// Members failed terminally
    pub failed: usize,
    /// Members cancelled
    pub cancelled: usize,
    /// Members waiting to run
    pub waiting: usize,
    /// Members currently running
    pub processing: usize,
}

impl BatchSummary {
    /// True once every member reached a terminal status
    pub fn is_done(&self) -> bool {
        self.waiting == 0 && self.processing == 0
    }
}

/// Builds batches of jobs from documents on disk
pub struct BatchProcessor {
    queue: Arc<ProcessingQueue>,
}

impl BatchProcessor {
    /// Create a processor submitting into the given queue
    pub fn new(queue: Arc<ProcessingQueue>) -> Self {
        Self { queue }
    }

    /// Enqueue one job per processable document in a directory.
    ///
    /// Files are submitted in name order; the file stem becomes the
    /// product id.
    pub fn submit_directory(
        &self,
        dir: &Path,
        priority: JobPriority,
    ) -> Result<Batch, WorkflowError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_document = path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| DOCUMENT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false);
            if is_document {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(WorkflowError::EmptyBatch(dir.to_path_buf()));
        }
        paths.sort();

        let mut job_ids = Vec::with_capacity(paths.len());
        for path in paths {
            let product_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unnamed")
                .to_string();
            let job = Job::new(product_id, DocumentRef::File { path }).with_priority(priority);
            job_ids.push(job.id);
            self.queue.enqueue(job)?;
        }

        let batch = Batch {
            batch_id: Uuid::now_v7(),
            job_ids,
        };
        info!(batch_id = %batch.batch_id, jobs = batch.job_ids.len(), dir = %dir.display(), "directory batch submitted");
        Ok(batch)
    }

    /// Enqueue one job per row of a CSV manifest.
    ///
    /// Required column: `product_id`. Each row needs `document_path` or
    /// inline `text`; an optional `priority` column overrides the
    /// default per row.
    pub fn submit_csv(
        &self,
        path: &Path,
        default_priority: JobPriority,
    ) -> Result<Batch, WorkflowError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let product_col = column("product_id").ok_or_else(|| {
            WorkflowError::Config(format!(
                "{}: missing required column 'product_id'",
                path.display()
            ))
        })?;
        let path_col = column("document_path");
        let text_col = column("text");
        let priority_col = column("priority");

        let mut job_ids = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = i + 1;
            let field = |col: Option<usize>| {
                col.and_then(|c| record.get(c))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };

            let product_id = field(Some(product_col)).ok_or(WorkflowError::CsvRow {
                row,
                reason: "empty product_id".to_string(),
            })?;

            let document = if let Some(doc_path) = field(path_col) {
                DocumentRef::File {
                    path: doc_path.into(),
                }
            } else if let Some(text) = field(text_col) {
                DocumentRef::Inline {
                    name: product_id.to_string(),
                    text: text.to_string(),
                }
            } else {
                return Err(WorkflowError::CsvRow {
                    row,
                    reason: "needs either 'document_path' or 'text'".to_string(),
                });
            };

            let priority = match field(priority_col) {
                Some(value) => JobPriority::parse(value).ok_or(WorkflowError::CsvRow {
                    row,
                    reason: format!("unknown priority {:?}", value),
                })?,
                None => default_priority,
            };

            let job = Job::new(product_id, document).with_priority(priority);
            debug!(row, job_id = %job.id, "CSV row accepted");
            job_ids.push(job.id);
            self.queue.enqueue(job)?;
        }

        if job_ids.is_empty() {
            return Err(WorkflowError::EmptyBatch(path.to_path_buf()));
        }

        let batch = Batch {
            batch_id: Uuid::now_v7(),
            job_ids,
        };
        info!(batch_id = %batch.batch_id, jobs = batch.job_ids.len(), csv = %path.display(), "CSV batch submitted");
        Ok(batch)
    }

    /// Derive the batch's current aggregate from member job statuses
    pub fn summary(&self, batch: &Batch) -> BatchSummary {
        let mut summary = BatchSummary {
            status: BatchStatus::Pending,
            total: batch.job_ids.len(),
            completed: 0,
            failed: 0,
            cancelled: 0,
            waiting: 0,
            processing: 0,
        };

        for id in &batch.job_ids {
            match self.queue.get_job(*id).map(|j| j.status) {
                Some(JobStatus::Completed) => summary.completed += 1,
                Some(JobStatus::Failed) => summary.failed += 1,
                Some(JobStatus::Cancelled) => summary.cancelled += 1,
                Some(JobStatus::Processing) => summary.processing += 1,
                Some(_) => summary.waiting += 1,
                // Unknown to the queue (state was reset): count as failed
                None => summary.failed += 1,
            }
        }

        summary.status = if summary.is_done() {
            if summary.completed == summary.total {
                BatchStatus::Completed
            } else if summary.completed == 0 {
                BatchStatus::Failed
            } else {
                BatchStatus::PartiallyFailed
            }
        } else if summary.completed + summary.failed + summary.cancelled + summary.processing > 0 {
            BatchStatus::InProgress
        } else {
            BatchStatus::Pending
        };
        summary
    }
}
