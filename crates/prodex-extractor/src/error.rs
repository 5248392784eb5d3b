//! Extraction pipeline errors

use prodex_domain::IoFailure;
use thiserror::Error;

/// Failures that abort a whole extraction, as opposed to chunk-level
/// problems which are absorbed into the result's error list.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Reading the source document failed; nothing to process
    #[error("document read failed: {0}")]
    Source(#[from] IoFailure),

    /// The document exceeds the configured size ceiling
    #[error("document is {size} chars, limit is {limit}")]
    DocumentTooLarge {
        /// Size of the offending document in characters
        size: usize,
        /// Configured ceiling in characters
        limit: usize,
    },

    /// Persisting the merged result failed after bounded retries
    #[error("result write failed after {attempts} attempts: {source}")]
    Store {
        /// Write attempts made
        attempts: u32,
        /// The last I/O failure
        source: IoFailure,
    },

    /// The job's advisory cancel flag was observed at a chunk boundary
    #[error("cancelled at chunk boundary before chunk {next_chunk}")]
    Cancelled {
        /// Index of the chunk that was not started
        next_chunk: usize,
    },

    /// Invalid extractor configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
