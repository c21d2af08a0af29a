//! # Generator Trait
//!
//! Core abstraction for text generation. The runtime treats each call as an
//! opaque function from a system prompt and a user prompt to a reply; the
//! provider's identity, model and endpoint are injected configuration.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use troupe_core::CredentialToken;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Ways a generation call can fail.
///
/// Each variant is one observable failure of a chat-completions call; the
/// agent turns any of them into an in-band error line.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No response arrived (connect, timeout) or its body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint refused the credential, or it cannot be sent at all.
    #[error("credential rejected: {message}")]
    CredentialRejected {
        /// Error description.
        message: String,
    },

    /// The credential is throttled or out of quota (HTTP 429).
    #[error("rate limited: {message}")]
    RateLimited {
        /// Delay from the `retry-after` header, when one was sent.
        retry_after_ms: Option<u64>,
        /// Error description.
        message: String,
    },

    /// Any other non-success status.
    #[error("endpoint returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error description, from the error body when it has one.
        message: String,
    },

    /// The reply body was not a chat-completions response.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// The reply decoded but carried no text.
    #[error("empty reply")]
    EmptyReply,
}

impl ProviderError {
    /// Whether the same call may succeed if repeated unchanged.
    ///
    /// Throttling, server-side statuses, dropped connections and empty
    /// samples are transient. A refused credential or an undecodable body
    /// is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } | Self::EmptyReply => true,
            Self::Status { status, .. } => *status >= 500,
            Self::CredentialRejected { .. } | Self::Malformed(_) => false,
        }
    }

    /// Error category string for logs and error payloads.
    pub fn category(&self) -> &str {
        match self {
            Self::Transport(_) => "network",
            Self::CredentialRejected { .. } => "credential",
            Self::RateLimited { .. } => "rate_limit",
            Self::Status { .. } => "status",
            Self::Malformed(_) | Self::EmptyReply => "reply",
        }
    }
}

/// Sampling parameters for one generation call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl GenerationParams {
    /// Same temperature with a different token limit.
    #[must_use]
    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        Self { max_tokens, ..self }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 2048,
        }
    }
}

/// A text generation backend.
///
/// Implementors must be `Send + Sync` so one generator can be held by an
/// agent across await points inside a session task.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model ID used for requests.
    fn model(&self) -> &str;

    /// Generate a reply to `user_prompt` under `system_prompt`.
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> ProviderResult<String>;
}

/// Builds generators bound to a specific credential.
///
/// Called once per participant when a cast is materialized, and once for the
/// coordinator's own identity.
pub trait GeneratorFactory: Send + Sync {
    /// Create a generator that authenticates with `credential`.
    fn for_credential(&self, credential: &CredentialToken) -> ProviderResult<Arc<dyn Generator>>;
}
