//! Ollama Service Implementation
//!
//! Integration with Ollama's local LLM API. Makes exactly one attempt
//! per `invoke` and classifies failures as transient or permanent; retry
//! and fallback policy live in [`crate::LlmClient`].

use async_trait::async_trait;
use prodex_domain::{InvokeOptions, LlmError, LlmService};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default HTTP client timeout (seconds); the orchestrating client
/// applies its own per-call timeout on top
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 180;

/// Ollama API provider for local LLM inference
pub struct OllamaService {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    name: String,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaModelOptions>,
}

#[derive(Serialize)]
struct OllamaModelOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

impl OllamaService {
    /// Create a new Ollama service
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g. "http://localhost:11434")
    /// - `model`: model to use (e.g. "llama3", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Permanent(format!("failed to build HTTP client: {}", e)))?;

        let model = model.into();
        Ok(Self {
            endpoint: endpoint.into(),
            name: format!("ollama:{}", model),
            model,
            client,
        })
    }

    /// Create a service against the default local endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> LlmError {
        // Rate limits and server-side failures are worth retrying;
        // client errors are not.
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            LlmError::Transient(format!("HTTP {}: {}", status, body))
        } else {
            LlmError::Permanent(format!("HTTP {}: {}", status, body))
        }
    }
}

#[async_trait]
impl LlmService for OllamaService {
    async fn invoke(&self, prompt: &str, options: &InvokeOptions) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);

        let model_options = if options.temperature.is_some() || options.max_tokens.is_some() {
            Some(OllamaModelOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            })
        } else {
            None
        };

        let request_body = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: model_options,
        };

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                // Connection refused, DNS failure, socket timeout
                LlmError::Transient(format!("request failed: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::Permanent(format!(
                "model not available: {}",
                self.model
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(Self::classify_status(status, &body));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Permanent(format!("failed to parse response: {}", e)))?;

        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_creation() {
        let service = OllamaService::new("http://localhost:11434", "llama3").unwrap();
        assert_eq!(service.endpoint, "http://localhost:11434");
        assert_eq!(service.model, "llama3");
        assert_eq!(service.name(), "ollama:llama3");
    }

    #[test]
    fn test_status_classification() {
        let rate_limited =
            OllamaService::classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(rate_limited.is_transient());

        let server_error =
            OllamaService::classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(server_error.is_transient());

        let bad_request = OllamaService::classify_status(reqwest::StatusCode::BAD_REQUEST, "nope");
        assert!(!bad_request.is_transient());
    }

    #[tokio::test]
    async fn test_connection_failure_is_transient() {
        // Nothing listens on this port
        let service = OllamaService::new("http://localhost:59999", "llama3").unwrap();
        let err = service
            .invoke("test", &InvokeOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
