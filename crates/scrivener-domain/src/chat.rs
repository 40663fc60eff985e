//! Chat-completion request types shared by providers and pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions
    System,
    /// Input content
    User,
    /// Model output
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker
    pub role: Role,
    /// Message body
    pub content: String,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Pipeline role a model is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Pulls items out of chunks
    Extractor,
    /// Labels items
    Classifier,
    /// Rewrites items into variants
    Generator,
    /// Judges variant quality
    Evaluator,
    /// Produces forward projections for metric sets
    Projector,
}

impl ModelRole {
    /// Get the role name
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Extractor => "extractor",
            ModelRole::Classifier => "classifier",
            ModelRole::Generator => "generator",
            ModelRole::Evaluator => "evaluator",
            ModelRole::Projector => "projector",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat-completion request
///
/// # Examples
///
/// ```
/// use scrivener_domain::ChatRequest;
///
/// let request = ChatRequest::new("gpt-4o-mini")
///     .system("Classify the clause.")
///     .user("Payment is due within 30 days.")
///     .temperature(0.0)
///     .max_tokens(20);
///
/// assert_eq!(request.messages.len(), 2);
/// assert_eq!(request.user_content(), Some("Payment is due within 30 days."));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,

    /// Conversation
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: f32,

    /// Completion token ceiling
    pub max_tokens: u32,

    /// Constrain the answer to a JSON object
    #[serde(default)]
    pub json_response: bool,
}

impl ChatRequest {
    /// Create an empty request for `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: 0.3,
            max_tokens: 1000,
            json_response: false,
        }
    }

    /// Append a system message
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    /// Append a user message
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token ceiling
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Require a JSON object answer
    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }

    /// Content of the last user message
    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}
