//! OpenAI-compatible chat-completion provider
//!
//! Talks to any endpoint implementing `POST {endpoint}/v1/chat/completions`
//! (OpenAI, Azure-style gateways, vLLM, llama.cpp server).
//!
//! # Features
//!
//! - Async HTTP communication via reqwest
//! - Bearer-token authentication
//! - JSON-object response mode
//! - Retry logic with exponential backoff for transient failures
//! - Per-request timeout reported as [`LlmError::Timeout`]
//!
//! # Examples
//!
//! ```no_run
//! use scrivener_llm::OpenAiProvider;
//!
//! let provider = OpenAiProvider::new("https://api.openai.com", "sk-...")
//!     .unwrap()
//!     .with_max_retries(2);
//! ```

use crate::LlmError;
use scrivener_domain::{ChatMessage, ChatProvider, ChatRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";

/// Default timeout for LLM requests (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Chat-completion provider for OpenAI-compatible APIs
pub struct OpenAiProvider {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Request body for the chat completions API
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

/// Response from the chat completions API
#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a new provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: API base URL (e.g., "https://api.openai.com")
    /// - `api_key`: Bearer token
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::with_timeout(endpoint, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new provider with a custom per-request timeout
    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
            timeout,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Set the maximum number of attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Run a chat completion
    ///
    /// Rate limits, 5xx responses and connection failures are retried with
    /// exponential backoff (1s, 2s, 4s, ...). Timeouts, missing models and
    /// malformed bodies are returned immediately.
    ///
    /// # Errors
    ///
    /// - [`LlmError::Timeout`] when the request exceeds the configured timeout
    /// - [`LlmError::ModelNotAvailable`] on HTTP 404
    /// - [`LlmError::RateLimitExceeded`] when 429 persists across retries
    /// - [`LlmError::InvalidResponse`] when the body has no message content
    /// - [`LlmError::Communication`] for other transport or HTTP failures
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);

        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response.json::<CompletionResponse>().await.map_err(|e| {
                            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                        })?;
                        return parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|choice| choice.message.content)
                            .ok_or_else(|| {
                                LlmError::InvalidResponse("Response has no message content".into())
                            });
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(request.model.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        warn!(model = %request.model, "Rate limited (attempt {})", attempts + 1);
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                        if status.is_client_error() {
                            break;
                        }
                    }
                }
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout(self.timeout));
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                debug!("Retrying chat completion in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

impl ChatProvider for OpenAiProvider {
    type Error = LlmError;

    async fn complete(&self, request: &ChatRequest) -> Result<String, Self::Error> {
        self.chat(request).await
    }
}
