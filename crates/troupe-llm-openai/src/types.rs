//! Configuration and wire types for the chat-completions endpoint.

use serde::{Deserialize, Serialize};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// Default model ID.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Default per-request timeout (milliseconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Endpoint configuration shared by every generator a factory builds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatCompletionsConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Model ID sent with every request.
    pub model: String,
    /// Per-request timeout (milliseconds).
    pub timeout_ms: u64,
}

impl ChatCompletionsConfig {
    /// Config for `base_url` and `model` with the default timeout.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Full request URL.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl Default for ChatCompletionsConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

/// One message in a chat-completions request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Request body.
#[derive(Clone, Debug, Serialize)]
pub struct ChatCompletionsRequest {
    /// Model ID.
    pub model: String,
    /// Conversation, system message first.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Always `false`; replies are read whole.
    pub stream: bool,
}

/// Response body. Unknown fields are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatCompletionsResponse {
    /// Candidate replies; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// One candidate reply.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatChoice {
    /// Reply message.
    pub message: ChoiceMessage,
}

/// Reply message. `content` may be null on some providers.
#[derive(Clone, Debug, Deserialize)]
pub struct ChoiceMessage {
    /// Reply text.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionsResponse {
    /// Trimmed text of the first choice, `None` when absent or blank.
    pub fn first_text(&self) -> Option<String> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    }
}
