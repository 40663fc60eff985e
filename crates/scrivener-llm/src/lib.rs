//! Scrivener LLM Provider Layer
//!
//! Chat-completion provider implementations of the `ChatProvider` trait from
//! `scrivener-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic scripted provider for testing
//! - `OpenAiProvider`: OpenAI-compatible `/v1/chat/completions` endpoint
//!
//! Model identifiers are deployment-specific and live in a typed
//! [`ModelRegistry`] keyed by [`ModelRole`](scrivener_domain::ModelRole).
//!
//! # Examples
//!
//! ```
//! use scrivener_llm::MockProvider;
//! use scrivener_domain::{ChatProvider, ChatRequest};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.complete(&ChatRequest::new("any").user("hi")).await.unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! # }
//! ```

#![warn(missing_docs)]

pub mod openai;
pub mod registry;

use scrivener_domain::{ChatProvider, ChatRequest, FailureKind, FailureSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

pub use openai::OpenAiProvider;
pub use registry::ModelRegistry;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl FailureSource for LlmError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            LlmError::Timeout(_) => FailureKind::Timeout,
            LlmError::InvalidResponse(_) => FailureKind::Parse,
            LlmError::Communication(_)
            | LlmError::RateLimitExceeded
            | LlmError::ModelNotAvailable(_)
            | LlmError::Other(_) => FailureKind::Api,
        }
    }
}

type Handler = dyn Fn(&ChatRequest) -> Result<String, LlmError> + Send + Sync;

#[derive(Default)]
struct MockState {
    by_model: HashMap<String, String>,
    by_content: HashMap<String, String>,
    failures: HashMap<String, FailureKind>,
    requests: Vec<ChatRequest>,
}

/// Mock LLM provider for deterministic testing
///
/// Returns scripted responses without any network calls. Lookup order for a
/// request is: custom handler, scripted failure for the user content,
/// response for the user content, response for the model, default response.
///
/// # Examples
///
/// ```
/// use scrivener_llm::MockProvider;
/// use scrivener_domain::{ChatProvider, ChatRequest};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let provider = MockProvider::default()
///     .with_model_response("classifier-model", "Critical")
///     .with_content_response("special clause", "Standard");
///
/// let request = ChatRequest::new("classifier-model").user("some clause");
/// assert_eq!(provider.complete(&request).await.unwrap(), "Critical");
///
/// let request = ChatRequest::new("classifier-model").user("special clause");
/// assert_eq!(provider.complete(&request).await.unwrap(), "Standard");
/// # }
/// ```
#[derive(Clone)]
pub struct MockProvider {
    default_response: String,
    state: Arc<Mutex<MockState>>,
    handler: Option<Arc<Handler>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all requests
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
            handler: None,
            delay: None,
        }
    }

    /// Create a provider that answers every request with `handler`
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Arc::new(handler)),
            ..Self::default()
        }
    }

    /// Respond with `response` whenever `model` is requested
    pub fn with_model_response(self, model: impl Into<String>, response: impl Into<String>) -> Self {
        self.lock().by_model.insert(model.into(), response.into());
        self
    }

    /// Respond with `response` when the last user message equals `content`
    pub fn with_content_response(
        self,
        content: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.lock().by_content.insert(content.into(), response.into());
        self
    }

    /// Fail with `kind` when the last user message equals `content`
    pub fn with_failure(self, content: impl Into<String>, kind: FailureKind) -> Self {
        self.lock().failures.insert(content.into(), kind);
        self
    }

    /// Sleep for `delay` before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of requests received
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Number of requests received for `model`
    pub fn calls_for_model(&self, model: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.model == model)
            .count()
    }

    /// Copies of all requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.lock().requests.clone()
    }

    /// Reset the recorded requests
    pub fn reset_call_count(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned mock only means another test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn respond(&self, request: &ChatRequest) -> Result<String, LlmError> {
        if let Some(handler) = &self.handler {
            return handler(request);
        }

        let state = self.lock();
        let content = request.user_content().unwrap_or_default();

        if let Some(kind) = state.failures.get(content) {
            return Err(match kind {
                FailureKind::Timeout => LlmError::Timeout(Duration::from_secs(30)),
                FailureKind::Api => LlmError::Communication("Mock error".to_string()),
                FailureKind::Parse => LlmError::InvalidResponse("Mock error".to_string()),
            });
        }
        if let Some(response) = state.by_content.get(content) {
            return Ok(response.clone());
        }
        if let Some(response) = state.by_model.get(&request.model) {
            return Ok(response.clone());
        }

        Ok(self.default_response.clone())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("default_response", &self.default_response)
            .field("delay", &self.delay)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl ChatProvider for MockProvider {
    type Error = LlmError;

    async fn complete(&self, request: &ChatRequest) -> Result<String, Self::Error> {
        self.lock().requests.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.respond(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str, content: &str) -> ChatRequest {
        ChatRequest::new(model).system("sys").user(content)
    }

    #[tokio::test]
    async fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        let result = provider.complete(&request("m", "any prompt")).await;
        assert_eq!(result.unwrap(), "Test response");
    }

    #[tokio::test]
    async fn test_mock_provider_specific_responses() {
        let provider = MockProvider::default()
            .with_content_response("hello", "world")
            .with_model_response("gen", "variant");

        assert_eq!(provider.complete(&request("x", "hello")).await.unwrap(), "world");
        assert_eq!(provider.complete(&request("gen", "other")).await.unwrap(), "variant");
        assert_eq!(
            provider.complete(&request("x", "unknown")).await.unwrap(),
            "Default mock response"
        );
    }

    #[tokio::test]
    async fn test_mock_provider_call_count() {
        let provider = MockProvider::new("test");
        assert_eq!(provider.call_count(), 0);

        provider.complete(&request("a", "1")).await.unwrap();
        provider.complete(&request("b", "2")).await.unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.calls_for_model("a"), 1);

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_provider_failures() {
        let provider = MockProvider::default()
            .with_failure("slow", FailureKind::Timeout)
            .with_failure("broken", FailureKind::Api);

        let err = provider.complete(&request("m", "slow")).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::Timeout);

        let err = provider.complete(&request("m", "broken")).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::Api);
    }

    #[tokio::test]
    async fn test_mock_provider_handler() {
        let provider = MockProvider::from_fn(|req| {
            Ok(format!("echo: {}", req.user_content().unwrap_or_default()))
        });
        let result = provider.complete(&request("m", "ping")).await.unwrap();
        assert_eq!(result, "echo: ping");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.complete(&request("m", "x")).await.unwrap();

        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            LlmError::Timeout(Duration::from_secs(1)).failure_kind(),
            FailureKind::Timeout
        );
        assert_eq!(LlmError::RateLimitExceeded.failure_kind(), FailureKind::Api);
        assert_eq!(
            LlmError::InvalidResponse("x".into()).failure_kind(),
            FailureKind::Parse
        );
    }
}
