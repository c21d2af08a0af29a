//! Generation provider settings.

use serde::{Deserialize, Serialize};
use troupe_core::CredentialToken;

/// OpenAI-compatible endpoint and the fixed credential pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL of the chat-completions API.
    pub base_url: String,
    /// Model ID sent with every request.
    pub model: String,
    /// Fixed set of provider keys shared by all participants.
    pub credentials: Vec<String>,
    /// Per-request transport timeout in milliseconds.
    pub timeout_ms: u64,
}

impl ApiSettings {
    /// Configured credentials as opaque tokens, in configured order.
    pub fn credential_tokens(&self) -> Vec<CredentialToken> {
        self.credentials
            .iter()
            .map(|raw| CredentialToken::new(raw.as_str()))
            .collect()
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            credentials: Vec::new(),
            timeout_ms: 60_000,
        }
    }
}

/// Sampling parameters for generation calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    /// Sampling temperature.
    pub temperature: f64,
    /// Token limit for scenario building and character lines.
    pub max_tokens: u32,
    /// Token limit for turn-order decisions.
    pub scheduling_max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 2048,
            scheduling_max_tokens: 512,
        }
    }
}
