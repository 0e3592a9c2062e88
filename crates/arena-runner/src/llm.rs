//! LLM backends implementing [`DecisionProvider`].
//!
//! Enum dispatch over an OpenAI-compatible chat completions backend and
//! the Anthropic Messages API, both over `reqwest`. HTTP outcomes are
//! classified into [`ProviderError`] so the core can decide what to retry:
//!
//! | Outcome | Error |
//! |---------|-------|
//! | connect/send failure, 5xx | `Unreachable` |
//! | 429 | `RateLimited` |
//! | other non-2xx, bad JSON, missing content | `MalformedPayload` |
//! | blank content | `EmptyResponse` |

use std::future::Future;

use arena_core::decision::{CompletionRequest, DecisionProvider, ProviderError};
use reqwest::StatusCode;
use tracing::debug;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::RunnerError;

const MAX_TOKENS: u32 = 512;

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An LLM backend reachable over HTTP.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

impl DecisionProvider for LlmBackend {
    fn request_completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        async move {
            match self {
                Self::OpenAi(backend) => backend.complete(&request).await,
                Self::Anthropic(backend) => backend.complete(&request).await,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP handling
// ---------------------------------------------------------------------------

/// POST `body` and return the decoded JSON of a 2xx response.
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    backend: &str,
) -> Result<serde_json::Value, ProviderError> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::Unreachable(format!("{backend} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(classify_status(status, &error_body, backend));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedPayload(format!("{backend} response parse failed: {e}")))
}

/// Map a non-success status to a provider error.
fn classify_status(status: StatusCode, body: &str, backend: &str) -> ProviderError {
    debug!(backend, %status, body, "provider returned error status");
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited
    } else if status.is_server_error() {
        ProviderError::Unreachable(format!("{backend} returned {status}"))
    } else {
        ProviderError::MalformedPayload(format!("{backend} returned {status}: {body}"))
    }
}

/// Reject blank completions.
fn non_empty(text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmBackendConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }

    /// Send a request and return the response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.api_url);
        let body = openai_body(request);
        let builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let json = post_json(builder, &body, "OpenAI").await?;
        extract_openai_content(&json).and_then(non_empty)
    }
}

/// System message first, then each user message in order.
fn openai_body(request: &CompletionRequest) -> serde_json::Value {
    let mut messages = vec![serde_json::json!({"role": "system", "content": request.system})];
    messages.extend(
        request
            .user
            .iter()
            .map(|content| serde_json::json!({"role": "user", "content": content})),
    );
    serde_json::json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": MAX_TOKENS,
    })
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            ProviderError::MalformedPayload(
                "OpenAI response missing choices[0].message.content".to_owned(),
            )
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Anthropic uses a different request format from `OpenAI`:
/// - Uses `x-api-key` header instead of `Authorization: Bearer`
/// - System text is a top-level field, not a message
/// - Response structure differs: `content[0].text`
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmBackendConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        }
    }

    /// Send a request and return the response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let url = format!("{}/messages", self.api_url);
        let body = anthropic_body(request);
        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let json = post_json(builder, &body, "Anthropic").await?;
        extract_anthropic_content(&json).and_then(non_empty)
    }
}

/// User messages joined into a single turn.
fn anthropic_body(request: &CompletionRequest) -> serde_json::Value {
    serde_json::json!({
        "model": request.model,
        "max_tokens": MAX_TOKENS,
        "temperature": request.temperature,
        "system": request.system,
        "messages": [
            {"role": "user", "content": request.user.join("\n\n")}
        ]
    })
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            ProviderError::MalformedPayload("Anthropic response missing content[0].text".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> Result<LlmBackend, RunnerError> {
    let client = reqwest::Client::builder().build()?;
    Ok(match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config, client)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config, client)),
    })
}
