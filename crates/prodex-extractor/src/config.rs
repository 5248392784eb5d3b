//! Extraction pipeline configuration

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};

/// Tunables for chunking, filtering, and model invocation.
///
/// Loaded from the `[extractor]` section of the workspace TOML config;
/// every field has a default so a missing section works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Documents above this many characters are split into chunks
    pub chunk_threshold: usize,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap carried between consecutive chunks, in characters
    pub chunk_overlap: usize,

    /// Entries scoring below this confidence are dropped before merge
    pub confidence_threshold: f64,

    /// Hard ceiling on document size in characters
    pub max_document_chars: usize,

    /// Bounded retries for recoverable result-store writes
    pub store_write_retries: u32,

    /// Sampling temperature for extraction calls
    pub temperature: f32,

    /// Token ceiling per extraction call; provider default when unset
    pub max_tokens: Option<u32>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            chunk_threshold: 15_000,
            chunk_size: 15_000,
            chunk_overlap: 2_000,
            confidence_threshold: 0.3,
            max_document_chars: 2_000_000,
            store_write_retries: 2,
            temperature: 0.2,
            max_tokens: None,
        }
    }
}

impl ExtractorConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.chunk_size == 0 {
            return Err(ExtractError::Config("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ExtractError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ExtractError::Config(format!(
                "confidence_threshold {} must be within [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.max_document_chars < self.chunk_size {
            return Err(ExtractError::Config(
                "max_document_chars must be at least chunk_size".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let config = ExtractorConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ExtractError::Config(_))));
    }

    #[test]
    fn test_confidence_threshold_range() {
        let config = ExtractorConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
