//! Prodex Domain Layer
//!
//! This crate contains the data model shared by all layers of the
//! extraction pipeline. It defines the product record that extraction
//! produces (`ProductResult` and its typed entries) and the trait seams
//! the orchestration core uses to talk to its collaborators (LLM backend,
//! document source, result store).
//!
//! ## Key Concepts
//!
//! - **ProductResult**: one consistent record per product, merged from
//!   per-chunk extraction results
//! - **Confidence**: every extracted entry carries a [0, 1] score
//! - **ExtractionStatus**: lifecycle of a result, terminal at
//!   `Validated` or `ValidationFailed`
//! - **Trait seams**: `LlmService`, `DocumentSource`, `ResultStore`;
//!   infrastructure implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod result;
pub mod traits;

// Re-exports for convenience
pub use error::{IoFailure, LlmError};
pub use record::{DataTable, FaqEntry, Relation, Specification};
pub use result::{ExtractionStatus, ProductResult, ResultMetadata};
pub use traits::{DocumentRef, DocumentSource, InvokeOptions, LlmService, ResultStore};
