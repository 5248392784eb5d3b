//! Retry, backoff, and fallback orchestration around `LlmService`
//!
//! The `LlmClient` is the single place retry policy lives: per-call
//! timeouts, capped exponential backoff on transient failures, then the
//! next provider in the fallback chain. Providers themselves make one
//! attempt per `invoke` and only classify their failures.

use prodex_domain::{InvokeOptions, LlmError, LlmService};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Retry and timeout policy for LLM calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per provider before moving down the fallback chain
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds (`base * 2^retry`, capped)
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay in milliseconds
    pub backoff_cap_ms: u64,

    /// Per-call timeout in seconds; elapsing counts as a transient error
    pub call_timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            call_timeout_secs: 120,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `retry` (0-based)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exp = self
            .backoff_base_ms
            .saturating_mul(1u64 << retry.min(16));
        Duration::from_millis(exp.min(self.backoff_cap_ms))
    }
}

/// Outcome of one successful orchestrated invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Raw completion text
    pub text: String,

    /// Name of the provider that produced the accepted response
    pub provider: String,

    /// Transient failures retried before success
    pub transient_retries: u32,

    /// Whether a fallback provider (not the primary) answered
    pub used_fallback: bool,

    /// Wall-clock latency of the whole orchestrated call
    pub latency_ms: u64,
}

/// Orchestrates calls across a primary provider and its fallback chain
pub struct LlmClient {
    providers: Vec<Arc<dyn LlmService>>,
    policy: RetryPolicy,
}

impl LlmClient {
    /// Create a client over a primary provider
    pub fn new(primary: Arc<dyn LlmService>, policy: RetryPolicy) -> Self {
        Self {
            providers: vec![primary],
            policy,
        }
    }

    /// Append a fallback provider, tried after the previous one fails
    pub fn with_fallback(mut self, provider: Arc<dyn LlmService>) -> Self {
        self.providers.push(provider);
        self
    }

    /// The active retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke the chain for one prompt.
    ///
    /// Transient failures are retried on the same provider up to
    /// `max_attempts` with capped exponential backoff; permanent
    /// failures (and transient exhaustion) advance to the next provider.
    /// The returned stats feed result metadata.
    pub async fn invoke(
        &self,
        prompt: &str,
        options: &InvokeOptions,
    ) -> Result<Invocation, LlmError> {
        let started = Instant::now();
        let mut transient_retries: u32 = 0;
        let mut last_error = LlmError::Permanent("no providers configured".to_string());

        for (provider_index, provider) in self.providers.iter().enumerate() {
            let mut attempt: u32 = 0;

            loop {
                let call = provider.invoke(prompt, options);
                let outcome = match timeout(Duration::from_secs(self.policy.call_timeout_secs), call)
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Transient(format!(
                        "call timed out after {}s",
                        self.policy.call_timeout_secs
                    ))),
                };

                match outcome {
                    Ok(text) => {
                        let invocation = Invocation {
                            text,
                            provider: provider.name().to_string(),
                            transient_retries,
                            used_fallback: provider_index > 0,
                            latency_ms: started.elapsed().as_millis() as u64,
                        };
                        debug!(
                            provider = invocation.provider,
                            retries = transient_retries,
                            fallback = invocation.used_fallback,
                            "LLM invocation succeeded"
                        );
                        return Ok(invocation);
                    }
                    Err(e) if e.is_transient() => {
                        attempt += 1;
                        transient_retries += 1;
                        if attempt >= self.policy.max_attempts {
                            warn!(
                                provider = provider.name(),
                                "transient retries exhausted, trying next provider"
                            );
                            last_error = e;
                            break;
                        }
                        let delay = self.policy.backoff_delay(attempt - 1);
                        debug!(
                            provider = provider.name(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transient LLM failure, backing off: {}",
                            e
                        );
                        last_error = e;
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        warn!(
                            provider = provider.name(),
                            "permanent LLM failure, trying next provider: {}", e
                        );
                        last_error = e;
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }
}

// The client is itself a service: callers that only need text (the
// correction loop, for one) get retry and fallback behavior for free.
#[async_trait::async_trait]
impl LlmService for LlmClient {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<String, LlmError> {
        LlmClient::invoke(self, prompt, options)
            .await
            .map(|invocation| invocation.text)
    }

    fn name(&self) -> &str {
        "client"
    }
}
