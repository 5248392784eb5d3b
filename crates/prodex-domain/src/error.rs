//! Shared error taxonomy for collaborator failures

use thiserror::Error;

/// Failure from an LLM backend call.
///
/// The two variants drive retry policy: transient failures (network,
/// timeout, rate limit) are retried with backoff before falling back to
/// the next provider; permanent failures (auth, invalid request) skip
/// retry and go straight to the fallback chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Retryable failure: network error, timeout, rate limit
    #[error("transient LLM failure: {0}")]
    Transient(String),

    /// Non-retryable failure: auth error, invalid request, bad model
    #[error("permanent LLM failure: {0}")]
    Permanent(String),
}

impl LlmError {
    /// Whether this failure is worth retrying on the same provider
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}

/// Failure reading a document or writing a result.
///
/// Source reads are classified critical (the job cannot proceed without
/// its input); auxiliary writes are recoverable and retried a bounded
/// number of times.
#[derive(Error, Debug)]
pub enum IoFailure {
    /// The failure aborts the job
    #[error("critical I/O failure: {0}")]
    Critical(String),

    /// The failure may be retried
    #[error("recoverable I/O failure: {0}")]
    Recoverable(String),
}

impl IoFailure {
    /// Whether the caller may retry the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IoFailure::Recoverable(_))
    }

    /// Critical failure from any displayable cause
    pub fn critical(err: impl std::fmt::Display) -> Self {
        IoFailure::Critical(err.to_string())
    }

    /// Recoverable failure from any displayable cause
    pub fn recoverable(err: impl std::fmt::Display) -> Self {
        IoFailure::Recoverable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Transient("timeout".into()).is_transient());
        assert!(!LlmError::Permanent("bad auth".into()).is_transient());
    }

    #[test]
    fn test_io_failure_classification() {
        assert!(IoFailure::recoverable("disk busy").is_recoverable());
        assert!(!IoFailure::critical("missing file").is_recoverable());
    }
}
