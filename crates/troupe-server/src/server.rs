//! `TroupeServer`: Axum HTTP bridge over one script session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::routing::{get, post};
use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use troupe_runtime::SessionHandle;

use crate::config::ServerConfig;
use crate::routes;
use crate::runner::RunSlot;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session every route drives.
    pub session: SessionHandle,
    /// Background run slot.
    pub runs: Arc<RunSlot>,
    /// Cancelled on shutdown; background runs hold child tokens.
    pub shutdown: CancellationToken,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// The HTTP bridge.
pub struct TroupeServer {
    config: Arc<ServerConfig>,
    session: SessionHandle,
    runs: Arc<RunSlot>,
    shutdown: CancellationToken,
    start_time: Instant,
}

impl TroupeServer {
    /// Create a server around `session`.
    pub fn new(config: ServerConfig, session: SessionHandle) -> Self {
        Self {
            config: Arc::new(config),
            session,
            runs: Arc::new(RunSlot::new()),
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        }
    }

    fn state(&self) -> AppState {
        AppState {
            session: self.session.clone(),
            runs: Arc::clone(&self.runs),
            shutdown: self.shutdown.clone(),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(routes::index))
            .route("/health", get(routes::health))
            .route("/api/status", get(routes::status))
            .route("/api/create-script", post(routes::create_script))
            .route("/api/next-speaker", post(routes::next_speaker))
            .route("/api/user-speak", post(routes::user_speak))
            .route("/api/ai-speak", post(routes::ai_speak))
            .route("/api/send-message", post(routes::send_message))
            .route("/api/start-conversation", post(routes::start_conversation))
            .route("/api/stop-conversation", post(routes::stop_conversation))
            .route("/api/clear-history", post(routes::clear_history))
            .route("/api/get-history", get(routes::get_history))
            .fallback(routes::not_found)
            .with_state(self.state())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(error) = served {
                warn!(%error, "server exited with error");
            }
        });

        info!(%addr, session_id = %self.session.id(), "troupe server listening");
        Ok((addr, handle))
    }

    /// Stop accepting requests and wait for the listener and any
    /// background run to wind down.
    ///
    /// Cancelling the token ends `axum::serve` once in-flight requests
    /// finish and stops the background run before its next round. Tasks
    /// still busy after `shutdown_timeout_secs` (a run blocked in a
    /// generation call) are aborted.
    pub async fn stop(&self, server: JoinHandle<()>) {
        self.shutdown.cancel();
        let mut tasks = vec![server];
        tasks.extend(self.runs.take_handle());
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();

        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);
        info!(
            task_count = tasks.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for server tasks"
        );
        if tokio::time::timeout(timeout, join_all(tasks)).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
        }
    }

    /// Token cancelled when the server shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Whether [`stop`](Self::stop) has begun, or the token was cancelled.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// The session behind the routes.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use troupe_core::CredentialToken;
    use troupe_llm::ProviderError;
    use troupe_llm::testing::{ScriptedFactory, ScriptedGenerator};
    use troupe_runtime::{HumanTurn, RuntimeConfig, ScriptSession};

    const SCENARIO: &str = "【场景设定】\n山顶的旧灯塔\n【主要角色】\n我|the user|protagonist\nAlice|calm|the keeper\nBob|loud|a sailor\n【剧情大纲】\n暴风雨将至";

    fn make_server() -> (TroupeServer, Arc<ScriptedGenerator>) {
        make_server_with(ServerConfig::default())
    }

    fn make_server_with(config: ServerConfig) -> (TroupeServer, Arc<ScriptedGenerator>) {
        let generator = Arc::new(ScriptedGenerator::new());
        let factory = Arc::new(ScriptedFactory::new(generator.clone()));
        let session = ScriptSession::new(
            RuntimeConfig::default(),
            vec![
                CredentialToken::new("sk-server-a"),
                CredentialToken::new("sk-server-b"),
                CredentialToken::new("sk-server-c"),
            ],
            factory,
        )
        .unwrap();
        let server = TroupeServer::new(config, SessionHandle::new(session));
        (server, generator)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000)
            .await
            .unwrap();
        let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, parsed)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_req(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn created(app: &Router, generator: &ScriptedGenerator) {
        generator.push_reply(SCENARIO);
        let (status, body) = call(
            app,
            post_req("/api/create-script", &json!({ "sceneDescription": "灯塔" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    // ── Service ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (server, _) = make_server();
        let (status, body) = call(&server.router(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["running"], false);
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let (server, _) = make_server();
        let (status, body) = call(&server.router(), get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "troupe");
        assert_eq!(body["endpoints"].as_array().unwrap().len(), routes::ENDPOINTS.len());
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let (server, _) = make_server();
        let (status, body) = call(&server.router(), get_req("/nonexistent")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["category"], "not_found");
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let (server, _) = make_server();
        let req = Request::builder()
            .uri("/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    // ── Scenario ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn status_before_scenario() {
        let (server, _) = make_server();
        let (status, body) = call(&server.router(), get_req("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["initialized"], false);
        assert_eq!(body["phase"], "idle");
        assert_eq!(body["running"], false);
        assert_eq!(body["credentialsTotal"], 3);
    }

    #[tokio::test]
    async fn create_script_returns_cast() {
        let (server, generator) = make_server();
        let app = server.router();
        generator.push_reply(SCENARIO);
        let (status, body) = call(
            &app,
            post_req("/api/create-script", &json!({ "sceneDescription": "灯塔" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["sceneSetting"], "山顶的旧灯塔");
        assert_eq!(body["cast"].as_array().unwrap().len(), 3);

        let (_, status_body) = call(&app, get_req("/api/status")).await;
        assert_eq!(status_body["phase"], "awaiting_human");
        assert_eq!(status_body["credentialsAvailable"], 1);
    }

    #[tokio::test]
    async fn create_script_rejects_blank_description() {
        let (server, generator) = make_server();
        let (status, body) = call(
            &server.router(),
            post_req("/api/create-script", &json!({ "sceneDescription": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "invalid_input");
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn create_script_rejects_malformed_body() {
        let (server, _) = make_server();
        let req = Request::builder()
            .method("POST")
            .uri("/api/create-script")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = call(&server.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let (server, generator) = make_server();
        generator.push_error(ProviderError::CredentialRejected {
            message: "bad key".into(),
        });
        let (status, body) = call(
            &server.router(),
            post_req("/api/create-script", &json!({ "sceneDescription": "灯塔" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["category"], "provider");
        assert_eq!(body["retryable"], false);
    }

    // ── Turns ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn speak_before_scenario_is_not_initialized() {
        let (server, _) = make_server();
        let (status, body) = call(
            &server.router(),
            post_req("/api/user-speak", &json!({ "message": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "not_initialized");
    }

    #[tokio::test]
    async fn human_then_simulated_turn() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;

        let (status, body) = call(
            &app,
            post_req("/api/user-speak", &json!({ "message": "有人吗？", "action": "speak" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "spoke");
        assert_eq!(body["line"], "我：有人吗？");

        generator.push_reply("下一个说话的角色：Alice");
        generator.push_reply("Alice：欢迎来到灯塔。");
        let req = Request::builder()
            .method("POST")
            .uri("/api/ai-speak")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["speaker"], "Alice");
        assert_eq!(body["line"], "Alice：欢迎来到灯塔。");
        assert_eq!(body["round"], 2);

        let (_, history) = call(&app, get_req("/api/get-history")).await;
        assert_eq!(history["count"], 2);
        assert_eq!(history["history"][0], "我：有人吗？");
    }

    #[tokio::test]
    async fn ai_speak_out_of_turn() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;
        let (status, body) = call(&app, post_req("/api/ai-speak", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "out_of_turn");
    }

    #[tokio::test]
    async fn next_speaker_asks_user_on_human_turn() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;

        let (status, body) = call(&app, post_req("/api/next-speaker", &json!({}))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["action"], "ask_user");
        assert_eq!(body["speaker"], "我");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn next_speaker_then_named_ai_speak() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;
        let _ = call(&app, post_req("/api/user-speak", &json!({ "action": "skip" }))).await;

        generator.push_reply("下一个说话的角色：Bob");
        let (status, body) = call(
            &app,
            post_req("/api/next-speaker", &json!({ "situation": "雷声响起" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["action"], "ai_speak");
        assert_eq!(body["speaker"], "Bob");
        let (_, status_body) = call(&app, get_req("/api/status")).await;
        assert_eq!(status_body["phase"], "awaiting_simulated");
        assert_eq!(status_body["historyLen"], 0);

        generator.push_reply("Bob：快关灯！");
        let (status, body) = call(
            &app,
            post_req("/api/ai-speak", &json!({ "speaker": "Bob", "situation": "雷声响起" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["speaker"], "Bob");
        assert_eq!(body["line"], "Bob：快关灯！");
        assert_eq!(generator.call_count(), 3);

        let (status, body) = call(
            &app,
            post_req("/api/ai-speak", &json!({ "speaker": "Carol" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "out_of_turn");
    }

    #[tokio::test]
    async fn ai_speak_unknown_speaker() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;
        let _ = call(&app, post_req("/api/user-speak", &json!({ "action": "skip" }))).await;

        let (status, body) = call(
            &app,
            post_req("/api/ai-speak", &json!({ "speaker": "Carol" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "unknown_speaker");
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn send_message_runs_both_turns() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;

        generator.push_reply("下一个说话的角色：Bob");
        generator.push_reply("Bob：风太大了！");
        let (status, body) = call(
            &app,
            post_req("/api/send-message", &json!({ "message": "关窗" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["humanLine"], "我：关窗");
        assert_eq!(body["reply"]["speaker"], "Bob");

        let decision = &generator.calls()[1];
        assert!(decision.user_prompt.contains("关窗"));
    }

    #[tokio::test]
    async fn quit_then_clear_resets() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;

        let (_, body) = call(&app, post_req("/api/user-speak", &json!({ "action": "quit" }))).await;
        assert_eq!(body["action"], "quit");
        let (status, body) = call(&app, post_req("/api/user-speak", &json!({ "action": "skip" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "stopped");

        let (status, _) = call(&app, post_req("/api/clear-history", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, status_body) = call(&app, get_req("/api/status")).await;
        assert_eq!(status_body["phase"], "awaiting_human");
        assert_eq!(status_body["historyLen"], 0);
    }

    // ── Background runs ──────────────────────────────────────────────

    #[tokio::test]
    async fn start_conversation_runs_in_background() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;
        for _ in 0..2 {
            generator.push_reply("下一个说话的角色：Alice");
            generator.push_reply("Alice：继续巡视。");
        }

        let (status, body) = call(
            &app,
            post_req("/api/start-conversation", &json!({ "rounds": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rounds"], 2);

        let mut finished = Value::Null;
        for _ in 0..200 {
            let (_, status_body) = call(&app, get_req("/api/status")).await;
            if status_body["running"] == false && !status_body["lastRun"].is_null() {
                finished = status_body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(finished["lastRun"]["completed"], 2);
        assert_eq!(finished["historyLen"], 2);
    }

    #[tokio::test]
    async fn second_start_conflicts_and_stop_cancels() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;

        let guard = server.session().lock().await;
        let (status, _) = call(&app, post_req("/api/start-conversation", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, post_req("/api/start-conversation", &json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["category"], "busy");

        let (status, _) = call(&app, post_req("/api/clear-history", &json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = call(&app, post_req("/api/stop-conversation", &json!({}))).await;
        assert_eq!(body["stopped"], true);
        drop(guard);
    }

    #[tokio::test]
    async fn run_started_during_manual_turn_waits_for_it() {
        let (server, generator) = make_server();
        let app = server.router();
        created(&app, &generator).await;
        generator.push_reply("下一个说话的角色：Alice");
        generator.push_reply("Alice：谁？");

        let state = server.state();
        let mut session = routes::idle_session(&state).await.unwrap();
        let (status, _) = call(
            &app,
            post_req("/api/start-conversation", &json!({ "rounds": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let _ = session.advance_human(HumanTurn::Speak("敲门".into())).unwrap();
        drop(session);

        for _ in 0..200 {
            if !server.runs.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            server.session().history().await,
            ["我：敲门", "Alice：谁？"]
        );
    }

    #[tokio::test]
    async fn listen_and_stop() {
        let (server, _) = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.stop(handle).await;
        assert!(server.is_shutting_down());
    }

    #[tokio::test]
    async fn stop_gives_up_on_stuck_run() {
        let (server, generator) = make_server_with(ServerConfig {
            shutdown_timeout_secs: 1,
            ..ServerConfig::default()
        });
        let app = server.router();
        created(&app, &generator).await;
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        // The run stays parked on the session lock and never sees the token.
        let guard = server.session().lock().await;
        let (status, _) = call(&app, post_req("/api/start-conversation", &json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let started = Instant::now();
        server.stop(handle).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(server.is_shutting_down());
        drop(guard);
        assert_eq!(generator.call_count(), 1);
    }
}
