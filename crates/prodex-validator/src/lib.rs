//! Validation of extraction payloads with LLM-driven correction
//!
//! An extraction payload that fails structural validation is sent back
//! to the LLM with a correction prompt describing each finding; the
//! loop is bounded by a configurable attempt limit and every pass
//! re-validates from scratch.

#![warn(missing_docs)]

mod engine;
mod report;

pub use engine::{CorrectionOutcome, ValidationEngine, ValidatorConfig};
pub use report::{Issue, IssueKind, Severity, ValidationReport};
