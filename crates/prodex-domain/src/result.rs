//! The merged extraction result for one product

use crate::record::{DataTable, FaqEntry, Relation, Specification};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current timestamp in seconds since Unix epoch
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Lifecycle status of an extraction result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Created, no chunk processed yet
    NotStarted,
    /// Chunk processing underway
    InProgress,
    /// All chunks succeeded; validation pending
    Completed,
    /// Some chunks failed, others succeeded
    PartiallyCompleted,
    /// All chunks failed
    Failed,
    /// Passed all validation checks; result is immutable from here
    Validated,
    /// Validation failed after the correction budget was exhausted
    ValidationFailed,
}

impl ExtractionStatus {
    /// Whether the result may still be mutated
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractionStatus::Validated | ExtractionStatus::ValidationFailed
        )
    }
}

/// Metadata recorded alongside an extraction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Unique id of this result instance (new per re-processing)
    pub result_id: Uuid,

    /// Version number; re-processing a validated result bumps this
    pub version: u32,

    /// Creation timestamp, seconds since Unix epoch
    pub created_at: u64,

    /// Document length in characters
    pub document_chars: usize,

    /// Number of chunks the document was split into
    pub chunk_count: usize,

    /// Number of chunks whose extraction failed
    pub failed_chunks: usize,

    /// Transient LLM errors retried during processing
    pub transient_retries: u32,

    /// Times a fallback provider produced the accepted response
    pub fallback_uses: u32,

    /// Correction round-trips issued during validation
    pub correction_attempts: u32,

    /// Total processing time in milliseconds
    pub processing_time_ms: u64,
}

impl ResultMetadata {
    /// Fresh metadata for a new (version 1) result
    pub fn new(document_chars: usize) -> Self {
        Self {
            result_id: Uuid::now_v7(),
            version: 1,
            created_at: current_timestamp(),
            document_chars,
            chunk_count: 0,
            failed_chunks: 0,
            transient_retries: 0,
            fallback_uses: 0,
            correction_attempts: 0,
            processing_time_ms: 0,
        }
    }
}

/// One consistent, merged record of everything extracted for a product.
///
/// Owned exclusively by the processor while under construction. Once
/// the status reaches `Validated` the result is immutable; re-processing
/// produces a new result with a bumped version, never an in-place edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductResult {
    /// Product identifier the result belongs to
    pub product_id: String,

    /// Lifecycle status
    pub status: ExtractionStatus,

    /// Compatibility relations, deduplicated across chunks
    pub relations: Vec<Relation>,

    /// Technical specifications, deduplicated across chunks
    pub specifications: Vec<Specification>,

    /// Data tables, deduplicated across chunks
    pub data_tables: Vec<DataTable>,

    /// FAQ entries, deduplicated across chunks
    pub faq: Vec<FaqEntry>,

    /// Errors absorbed during processing (chunk failures, validation)
    pub errors: Vec<String>,

    /// Warnings (dropped low-confidence entries, recovered problems)
    pub warnings: Vec<String>,

    /// Processing metadata
    pub metadata: ResultMetadata,
}

impl ProductResult {
    /// Create an empty result for a product
    pub fn new(product_id: impl Into<String>, document_chars: usize) -> Self {
        Self {
            product_id: product_id.into(),
            status: ExtractionStatus::NotStarted,
            relations: Vec::new(),
            specifications: Vec::new(),
            data_tables: Vec::new(),
            faq: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: ResultMetadata::new(document_chars),
        }
    }

    /// Record an error. Does not change a terminal status.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Record a warning
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Total number of extracted entries across all categories
    pub fn entry_count(&self) -> usize {
        self.relations.len() + self.specifications.len() + self.data_tables.len() + self.faq.len()
    }

    /// Whether the result passed validation
    pub fn is_validated(&self) -> bool {
        self.status == ExtractionStatus::Validated
    }
}
