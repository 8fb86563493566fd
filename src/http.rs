// IDE Agent Gateway - HTTP Surface
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// axum server under /api/v1: the agent endpoint, one endpoint per tool, health.
// Every request names its workspace with the X-Session-ID header.

use crate::agent::{self, Agent, AgentResponse};
use crate::error::{SessionError, ToolError};
use crate::session::Session;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const SESSION_HEADER: &str = "X-Session-ID";

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub artifacts_root: Arc<PathBuf>,
}

impl AppState {
    pub fn new(agent: Arc<Agent>, artifacts_root: PathBuf) -> Self {
        Self { agent, artifacts_root: Arc::new(artifacts_root) }
    }

    fn resolve(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        let id = session_id(headers).ok_or(SessionError::MissingId(SESSION_HEADER))?;
        let storage = self.agent.gateway().storage().map(|s| s.as_ref());
        Session::resolve(&id, &self.artifacts_root, storage)
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub user_query: String,
}

/// Envelope returned by every tool endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolResponse {
    pub data: Option<Value>,
    pub message: String,
    pub error: Option<String>,
}

fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::MissingId(_) | SessionError::InvalidId(_) => StatusCode::BAD_REQUEST,
        SessionError::MissingCodebase(_) => StatusCode::NOT_FOUND,
        SessionError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn tool_status(err: &ToolError) -> StatusCode {
    match err {
        ToolError::UnknownTool(_) | ToolError::Validation(_) | ToolError::AccessDenied(_) => StatusCode::BAD_REQUEST,
        ToolError::NotFound(_) => StatusCode::NOT_FOUND,
        ToolError::Execution(_) | ToolError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ide-agent-gate",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn run_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AgentRequest>,
) -> (StatusCode, Json<AgentResponse>) {
    let session = match state.resolve(&headers) {
        Ok(s) => s,
        Err(err) => {
            let id = session_id(&headers).unwrap_or_default();
            return (session_status(&err), Json(agent::session_failure(&id, &err)));
        }
    };

    let outcome = state.agent.run(&request.user_query, &session).await;
    let response = AgentResponse::from_outcome(&session.id, outcome);
    let status = if response.success { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, Json(response))
}

async fn run_tool(tool: &'static str, state: AppState, headers: HeaderMap, args: Value) -> (StatusCode, Json<ToolResponse>) {
    let session = match state.resolve(&headers) {
        Ok(s) => s,
        Err(err) => {
            log::warn!("Rejected {} request: {}", tool, err);
            let body = ToolResponse { data: None, message: format!("{} failed", tool), error: Some(err.to_string()) };
            return (session_status(&err), Json(body));
        }
    };

    match state.agent.gateway().dispatch(tool, &args, &session).await {
        Ok(outcome) => {
            let message = match &outcome.error {
                None => format!("{} completed successfully", tool),
                Some(_) => format!("{} completed with errors", tool),
            };
            (StatusCode::OK, Json(ToolResponse { data: Some(outcome.data), message, error: outcome.error }))
        }
        Err(err) => {
            log::error!("{} endpoint failed ({}): {}", tool, err.kind(), err);
            let body = ToolResponse { data: None, message: format!("{} failed", tool), error: Some(err.to_string()) };
            (tool_status(&err), Json(body))
        }
    }
}

fn tool_route(tool: &'static str) -> MethodRouter<AppState> {
    post(move |State(state): State<AppState>, headers: HeaderMap, Json(args): Json<Value>| async move {
        run_tool(tool, state, headers, args).await
    })
}

// ============================================================================
// ROUTER + SERVER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ide-agent", post(run_agent))
        .route("/read-file", tool_route("read_file"))
        .route("/edit-file", tool_route("edit_file"))
        .route("/search-replace", tool_route("search_replace"))
        .route("/run-terminal-cmd", tool_route("run_terminal_cmd"))
        .route("/list-directory", tool_route("list_directory"))
        .route("/search-files", tool_route("search_files"))
        .route("/delete-file", tool_route("delete_file"))
        .route("/grep-search", tool_route("grep_search"))
        .route("/exit-tool", tool_route("exit_tool"));

    Router::new().nest("/api/v1", api_routes).with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", bind, e))?;

    log::info!("IDE agent gateway listening on {}", bind);
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
