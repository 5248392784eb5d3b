//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the orchestration core and
//! its collaborators. Infrastructure implementations live in other
//! crates (prodex-llm, prodex-workflow).

use crate::error::{IoFailure, LlmError};
use crate::result::ProductResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for a single LLM invocation
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Sampling temperature, provider default when unset
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens, provider default when unset
    pub max_tokens: Option<u32>,
}

/// Capability interface for an LLM backend.
///
/// One prompt in, one raw text completion out. Implementations classify
/// every failure as transient or permanent; retry and fallback policy
/// live in the caller (the `LlmClient` chain), not here.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Generate a completion for the prompt
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<String, LlmError>;

    /// Human-readable provider name, used in logs and metadata
    fn name(&self) -> &str;
}

/// Reference to a document to be processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentRef {
    /// A file on disk
    File {
        /// Path to the file
        path: PathBuf,
    },
    /// Text supplied directly (tests, API callers)
    Inline {
        /// Display name for logs
        name: String,
        /// The document text
        text: String,
    },
}

impl DocumentRef {
    /// Short display name for logging
    pub fn display_name(&self) -> String {
        match self {
            DocumentRef::File { path } => path.display().to_string(),
            DocumentRef::Inline { name, .. } => name.clone(),
        }
    }
}

/// Yields raw document text given a reference.
///
/// Source read failures are critical (the job cannot proceed).
pub trait DocumentSource: Send + Sync {
    /// Fetch the full text of the referenced document
    fn fetch(&self, reference: &DocumentRef) -> Result<String, IoFailure>;
}

/// Persists extraction results and raw LLM responses.
///
/// Writes are append-only or versioned; a validated result is never
/// overwritten in place.
pub trait ResultStore: Send + Sync {
    /// Persist a merged result, returning where it was written
    fn save(&self, result: &ProductResult) -> Result<PathBuf, IoFailure>;

    /// Archive a raw LLM response for a product chunk
    fn save_raw(&self, product_id: &str, chunk_index: usize, raw: &str)
        -> Result<PathBuf, IoFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ref_display_name() {
        let file = DocumentRef::File {
            path: PathBuf::from("/tmp/doc.txt"),
        };
        assert_eq!(file.display_name(), "/tmp/doc.txt");

        let inline = DocumentRef::Inline {
            name: "spec-sheet".to_string(),
            text: "...".to_string(),
        };
        assert_eq!(inline.display_name(), "spec-sheet");
    }

    #[test]
    fn test_document_ref_serde() {
        let inline = DocumentRef::Inline {
            name: "n".to_string(),
            text: "t".to_string(),
        };
        let json = serde_json::to_string(&inline).unwrap();
        let back: DocumentRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, inline);
    }
}
