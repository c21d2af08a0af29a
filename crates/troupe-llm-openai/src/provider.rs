//! Chat-completions generator implementing the [`Generator`] trait.
//!
//! Each call sends a two-message conversation (system then user) and returns
//! the trimmed text of the first choice. Non-success statuses are mapped onto
//! [`ProviderError`] variants so callers can tell auth failures and quota
//! exhaustion apart from malformed requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, error, info, instrument};

use troupe_core::CredentialToken;
use troupe_llm::provider::{
    GenerationParams, Generator, GeneratorFactory, ProviderError, ProviderResult,
};

use crate::types::{
    ChatCompletionsConfig, ChatCompletionsRequest, ChatCompletionsResponse, ChatMessage,
};

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Generator bound to one credential.
pub struct ChatCompletionsProvider {
    config: ChatCompletionsConfig,
    credential: CredentialToken,
    /// HTTP client (shared with every other generator from the same factory).
    client: reqwest::Client,
}

impl ChatCompletionsProvider {
    /// Create a generator using an existing client.
    pub fn new(
        config: ChatCompletionsConfig,
        credential: CredentialToken,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            credential,
            client,
        }
    }

    /// Credential this generator authenticates with.
    pub fn credential(&self) -> &CredentialToken {
        &self.credential
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.credential.expose());
        let _ = headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| ProviderError::CredentialRejected {
                message: format!("credential is not a valid header value: {e}"),
            })?,
        );
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_request(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> ChatCompletionsRequest {
        ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: false,
        }
    }
}

/// Parse an error response body into `(message, code)`.
///
/// The code is only logged; callers branch on the status.
fn parse_api_error(body: &str, status: u16) -> (String, Option<String>) {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &json["error"];
        let message = error["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string();
        let code = error["code"]
            .as_str()
            .or_else(|| error["type"].as_str())
            .map(String::from);
        (message, code)
    } else {
        (format!("HTTP {status}: {body}"), None)
    }
}

/// Parse a `retry-after` header value into milliseconds.
///
/// Accepts integer seconds or an HTTP date.
fn parse_retry_after_header(value: &str) -> Option<u64> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(seconds.saturating_mul(1000));
    }
    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delay_ms = date
        .signed_duration_since(chrono::Utc::now())
        .num_milliseconds();
    Some(u64::try_from(delay_ms).unwrap_or(0))
}

#[async_trait]
impl Generator for ChatCompletionsProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip_all, fields(model = %self.config.model, credential = %self.credential))]
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> ProviderResult<String> {
        let headers = self.build_headers()?;
        let request = self.build_request(system_prompt, user_prompt, params);
        debug!(
            system_len = system_prompt.len(),
            user_len = user_prompt.len(),
            max_tokens = params.max_tokens,
            "Sending chat completion"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_header);
            let body_text = response.text().await.unwrap_or_default();
            let (message, code) = parse_api_error(&body_text, status.as_u16());
            let err = match status.as_u16() {
                401 | 403 => ProviderError::CredentialRejected { message },
                429 => ProviderError::RateLimited {
                    retry_after_ms: retry_after,
                    message,
                },
                status => ProviderError::Status { status, message },
            };
            error!(
                status = status.as_u16(),
                code = code.as_deref().unwrap_or("unknown"),
                retryable = err.is_retryable(),
                "Chat completions API error"
            );
            return Err(err);
        }

        let body = response.text().await?;
        let parsed: ChatCompletionsResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parsed.first_text().ok_or(ProviderError::EmptyReply)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Builds [`ChatCompletionsProvider`]s that share one HTTP client.
pub struct ChatCompletionsFactory {
    config: ChatCompletionsConfig,
    client: reqwest::Client,
}

impl ChatCompletionsFactory {
    /// Create a factory, building a client with the configured timeout.
    pub fn new(config: ChatCompletionsConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        info!(model = %config.model, base_url = %config.base_url, "Chat completions factory initialized");
        Ok(Self { config, client })
    }

    /// Endpoint configuration.
    pub fn config(&self) -> &ChatCompletionsConfig {
        &self.config
    }
}

impl GeneratorFactory for ChatCompletionsFactory {
    fn for_credential(&self, credential: &CredentialToken) -> ProviderResult<Arc<dyn Generator>> {
        Ok(Arc::new(ChatCompletionsProvider::new(
            self.config.clone(),
            credential.clone(),
            self.client.clone(),
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
