//! Prodex extraction pipeline
//!
//! Turns one product document into a merged, validated `ProductResult`:
//! the document is split into overlapping chunks, each chunk goes
//! through the LLM with parse/correction handling, and the per-chunk
//! payloads are merged deterministically with confidence filtering.

#![warn(missing_docs)]

pub mod chunking;
pub mod config;
pub mod error;
pub mod merge;
pub mod parser;
pub mod processor;
pub mod prompt;

pub use chunking::{Chunk, TextChunker};
pub use config::ExtractorConfig;
pub use error::ExtractError;
pub use merge::{merge_chunks, ChunkResult, MergeOutcome};
pub use parser::{extract_json, payload_from_value, ChunkPayload};
pub use processor::ChunkProcessor;
