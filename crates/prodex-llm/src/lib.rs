//! Prodex LLM Service Layer
//!
//! Implementations of the `LlmService` trait from `prodex-domain`, plus
//! the `LlmClient` wrapper that adds per-call timeouts, transient-error
//! retry with exponential backoff, and a fallback provider chain.
//!
//! # Providers
//!
//! - `MockService`: deterministic, scriptable mock for testing
//! - `OllamaService`: local Ollama HTTP API integration
//!
//! # Examples
//!
//! ```no_run
//! use prodex_llm::MockService;
//! use prodex_domain::{InvokeOptions, LlmService};
//!
//! # async fn example() {
//! let service = MockService::new("Hello from LLM!");
//! let text = service.invoke("prompt", &InvokeOptions::default()).await.unwrap();
//! assert_eq!(text, "Hello from LLM!");
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod ollama;

use async_trait::async_trait;
use prodex_domain::{InvokeOptions, LlmError, LlmService};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub use client::{Invocation, LlmClient, RetryPolicy};
pub use ollama::OllamaService;

/// Mock LLM service for deterministic testing.
///
/// Returns a fixed default response, or outcomes scripted in order with
/// [`MockService::push_outcome`]. Scripted outcomes are consumed one per
/// call before the default kicks back in, which makes
/// fail-twice-then-succeed retry tests straightforward.
///
/// Clones share the same script and call counter.
#[derive(Debug, Clone)]
pub struct MockService {
    name: String,
    default_response: String,
    scripted: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockService {
    /// Create a mock returning a fixed response for every prompt
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            name: "mock".to_string(),
            default_response: response.into(),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Set the provider name reported in logs and metadata
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue an outcome for the next unscripted call
    pub fn push_outcome(&self, outcome: Result<String, LlmError>) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    /// Queue a transient error for the next call
    pub fn push_transient_error(&self, message: impl Into<String>) {
        self.push_outcome(Err(LlmError::Transient(message.into())));
    }

    /// Queue a permanent error for the next call
    pub fn push_permanent_error(&self, message: impl Into<String>) {
        self.push_outcome(Err(LlmError::Permanent(message.into())));
    }

    /// Number of times `invoke` has been called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new("{}")
    }
}

#[async_trait]
impl LlmService for MockService {
    async fn invoke(&self, _prompt: &str, _options: &InvokeOptions) -> Result<String, LlmError> {
        *self.call_count.lock().unwrap() += 1;

        if let Some(outcome) = self.scripted.lock().unwrap().pop_front() {
            return outcome;
        }

        Ok(self.default_response.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
