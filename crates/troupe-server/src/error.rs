//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use troupe_runtime::SessionError;

/// Errors returned by the HTTP routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing request body.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A background conversation run is already active.
    #[error("a conversation run is already in progress")]
    Busy,

    /// No route matched.
    #[error("no route for {0}")]
    NotFound(String),

    /// The session rejected the operation.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    /// Error category string, shared with log fields.
    pub fn category(&self) -> &str {
        match self {
            Self::BadRequest(_) => "invalid_input",
            Self::Busy => "busy",
            Self::NotFound(_) => "not_found",
            Self::Session(e) => e.category(),
        }
    }

    /// Whether the same request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::Session(e) => e.is_recoverable(),
            Self::BadRequest(_) | Self::NotFound(_) => false,
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self.category() {
            "invalid_input" | "not_initialized" | "out_of_turn" | "stopped" | "no_candidates"
            | "unknown_speaker" | "scenario" => StatusCode::BAD_REQUEST,
            "busy" => StatusCode::CONFLICT,
            "not_found" => StatusCode::NOT_FOUND,
            "provider" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(category = self.category(), error = %self, "request failed");
        } else {
            tracing::debug!(category = self.category(), error = %self, "request rejected");
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
            "category": self.category(),
            "retryable": self.is_retryable(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use troupe_runtime::{Phase, PoolError, ScenarioError};

    use super::*;

    #[test]
    fn client_errors_are_400() {
        let cases = [
            ApiError::BadRequest("x".into()),
            ApiError::Session(SessionError::NotInitialized),
            ApiError::Session(SessionError::Stopped),
            ApiError::Session(SessionError::OutOfTurn {
                expected: Phase::AwaitingHuman,
                actual: Phase::AwaitingSimulated,
            }),
            ApiError::Session(SessionError::Scenario(ScenarioError::BlankDescription)),
            ApiError::Session(SessionError::Scenario(ScenarioError::NoCast)),
            ApiError::Session(SessionError::UnknownSpeaker("Carol".into())),
        ];
        for err in cases {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{err}");
        }
    }

    #[test]
    fn busy_is_409() {
        assert_eq!(ApiError::Busy.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Busy.category(), "busy");
    }

    #[test]
    fn provider_failures_are_502() {
        let err = ApiError::Session(SessionError::Provider(
            troupe_llm::ProviderError::EmptyReply,
        ));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn retryable_follows_the_failure() {
        let throttled = ApiError::Session(SessionError::Provider(
            troupe_llm::ProviderError::RateLimited {
                retry_after_ms: None,
                message: "slow down".into(),
            },
        ));
        let refused = ApiError::Session(SessionError::Provider(
            troupe_llm::ProviderError::CredentialRejected {
                message: "bad key".into(),
            },
        ));
        assert!(throttled.is_retryable());
        assert!(!refused.is_retryable());
        assert!(ApiError::Busy.is_retryable());
        assert!(!ApiError::Session(SessionError::Stopped).is_retryable());
        assert!(!ApiError::BadRequest("x".into()).is_retryable());
    }

    #[test]
    fn pool_misconfiguration_is_500() {
        let err = ApiError::Session(SessionError::Pool(PoolError::Empty));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.category(), "configuration");
    }

    #[tokio::test]
    async fn body_carries_category() {
        let resp = ApiError::NotFound("/nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["category"], "not_found");
        assert_eq!(parsed["error"], "no route for /nope");
        assert_eq!(parsed["retryable"], false);
    }
}
