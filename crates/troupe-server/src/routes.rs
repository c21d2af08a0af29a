//! Route handlers.
//!
//! Every body is JSON. Successful responses carry `success: true` next to the
//! operation's fields; failures go through [`ApiError`].

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::Uri;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::MutexGuard;
use troupe_runtime::{
    HumanTurn, MessageExchange, NextSpeaker, RunSummary, ScenarioOutcome, ScriptSession,
    SessionStatus, SimulatedTurn, TurnOutcome,
};

use crate::error::{ApiError, ApiResult};
use crate::health::{self, HealthResponse};
use crate::server::AppState;

/// Routes listed by the service descriptor.
pub const ENDPOINTS: [&str; 12] = [
    "GET /",
    "GET /health",
    "GET /api/status",
    "POST /api/create-script",
    "POST /api/next-speaker",
    "POST /api/user-speak",
    "POST /api/ai-speak",
    "POST /api/send-message",
    "POST /api/start-conversation",
    "POST /api/stop-conversation",
    "POST /api/clear-history",
    "GET /api/get-history",
];

// ─────────────────────────────────────────────────────────────────────────────
// Bodies
// ─────────────────────────────────────────────────────────────────────────────

/// `{success: true, ...data}`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        data,
    })
}

/// `POST /api/create-script`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScriptRequest {
    /// Free-text scene description.
    pub scene_description: String,
}

/// What the human does in `POST /api/user-speak`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeakAction {
    /// Say `message`.
    #[default]
    Speak,
    /// Pass the turn.
    Skip,
    /// End the conversation.
    Quit,
}

/// `POST /api/user-speak`
#[derive(Debug, Default, Deserialize)]
pub struct UserSpeakRequest {
    /// Line to say when `action` is `speak`.
    #[serde(default)]
    pub message: Option<String>,
    /// Defaults to `speak`.
    #[serde(default)]
    pub action: SpeakAction,
}

impl UserSpeakRequest {
    fn into_turn(self) -> HumanTurn {
        match self.action {
            SpeakAction::Speak => HumanTurn::Speak(self.message.unwrap_or_default()),
            SpeakAction::Skip => HumanTurn::Skip,
            SpeakAction::Quit => HumanTurn::Quit,
        }
    }
}

/// `POST /api/next-speaker`
#[derive(Debug, Default, Deserialize)]
pub struct NextSpeakerRequest {
    /// Optional situation hint for the scheduler.
    #[serde(default)]
    pub situation: Option<String>,
}

/// `POST /api/ai-speak`
#[derive(Debug, Default, Deserialize)]
pub struct AiSpeakRequest {
    /// Participant to speak; the scheduler picks when absent.
    #[serde(default)]
    pub speaker: Option<String>,
    /// Optional situation hint.
    #[serde(default)]
    pub situation: Option<String>,
}

/// `POST /api/send-message`
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// The human's line.
    pub message: String,
}

/// `POST /api/start-conversation`
#[derive(Debug, Default, Deserialize)]
pub struct StartConversationRequest {
    /// Rounds to run; defaulted and clamped by server config.
    #[serde(default)]
    pub rounds: Option<u32>,
}

/// `GET /api/status` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    #[serde(flatten)]
    session: SessionStatus,
    running: bool,
    last_run: Option<RunSummary>,
}

/// `GET /api/get-history` body.
#[derive(Debug, Serialize)]
pub struct HistoryBody {
    history: Vec<String>,
    count: usize,
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Like [`parse`], but an empty body yields `T::default()`.
fn parse_optional<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(T::default())
    } else {
        parse(body)
    }
}

/// Lock the session for manual driving.
///
/// Refused while a background run owns the session. The run check is
/// repeated under the session lock: a run started after the first check
/// cannot play a round until this guard drops.
pub(crate) async fn idle_session(state: &AppState) -> ApiResult<MutexGuard<'_, ScriptSession>> {
    if state.runs.is_running() {
        return Err(ApiError::Busy);
    }
    let session = state.session.lock().await;
    if state.runs.is_running() {
        return Err(ApiError::Busy);
    }
    Ok(session)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "troupe",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.runs.is_running()))
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<Success<StatusBody>> {
    let session = state.session.status().await;
    ok(StatusBody {
        session,
        running: state.runs.is_running(),
        last_run: state.runs.last_summary(),
    })
}

/// POST /api/create-script
pub async fn create_script(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Success<ScenarioOutcome>>> {
    let req: CreateScriptRequest = parse(&body)?;
    let mut session = idle_session(&state).await?;
    let outcome = session.build_scenario(&req.scene_description).await?;
    Ok(ok(outcome))
}

/// POST /api/next-speaker
pub async fn next_speaker(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Success<NextSpeaker>>> {
    let req: NextSpeakerRequest = parse_optional(&body)?;
    let session = idle_session(&state).await?;
    let next = session
        .peek_next_speaker(req.situation.as_deref().unwrap_or_default())
        .await?;
    Ok(ok(next))
}

/// POST /api/user-speak
pub async fn user_speak(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Success<TurnOutcome>>> {
    let req: UserSpeakRequest = parse_optional(&body)?;
    let outcome = idle_session(&state).await?.advance_human(req.into_turn())?;
    Ok(ok(outcome))
}

/// POST /api/ai-speak
pub async fn ai_speak(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Success<SimulatedTurn>>> {
    let req: AiSpeakRequest = parse_optional(&body)?;
    let situation = req.situation.as_deref().unwrap_or_default();
    let mut session = idle_session(&state).await?;
    let turn = match req.speaker.as_deref() {
        Some(speaker) => session.advance_simulated_as(speaker, situation).await?,
        None => session.advance_simulated(situation).await?,
    };
    Ok(ok(turn))
}

/// POST /api/send-message
pub async fn send_message(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Success<MessageExchange>>> {
    let req: SendMessageRequest = parse(&body)?;
    let exchange = idle_session(&state).await?.send_message(&req.message).await?;
    Ok(ok(exchange))
}

/// POST /api/start-conversation
pub async fn start_conversation(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let req: StartConversationRequest = parse_optional(&body)?;
    let rounds = state.config.rounds_for(req.rounds);
    state
        .runs
        .start(state.session.clone(), rounds, &state.shutdown)?;
    Ok(Json(json!({ "success": true, "rounds": rounds })))
}

/// POST /api/stop-conversation
pub async fn stop_conversation(State(state): State<AppState>) -> Json<Value> {
    let stopped = state.runs.stop();
    Json(json!({ "success": true, "stopped": stopped }))
}

/// POST /api/clear-history
pub async fn clear_history(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    idle_session(&state).await?.clear();
    Ok(Json(json!({ "success": true })))
}

/// GET /api/get-history
pub async fn get_history(State(state): State<AppState>) -> Json<Success<HistoryBody>> {
    let history = state.session.history().await;
    ok(HistoryBody {
        count: history.len(),
        history,
    })
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_owned())
}
