//! Session API endpoints
//!
//! The trigger path in, the status path out. Starting a session is
//! non-blocking: the response carries the registered snapshot and callers
//! poll (or re-POST, it is idempotent) until the outcome appears.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use shared_types::SessionPhase;

use crate::api::ApiState;
use crate::trigger;

/// Session error codes for machine-readable error responses
#[derive(Debug, Clone)]
pub enum SessionErrorCode {
    InvalidRequest,
    SessionNotFound,
    OrchestratorUnavailable,
}

impl SessionErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            SessionErrorCode::InvalidRequest => "INVALID_REQUEST",
            SessionErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            SessionErrorCode::OrchestratorUnavailable => "ORCHESTRATOR_UNAVAILABLE",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            SessionErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            SessionErrorCode::SessionNotFound => StatusCode::NOT_FOUND,
            SessionErrorCode::OrchestratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn session_error(
    code: SessionErrorCode,
    message: impl Into<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    (
        code.status_code(),
        Json(json!({
            "error": {
                "code": code.as_str(),
                "message": message.into(),
            }
        })),
    )
}

fn status_code_for_phase(phase: SessionPhase) -> StatusCode {
    match phase {
        SessionPhase::Initiated | SessionPhase::Invoking | SessionPhase::Polling => {
            StatusCode::ACCEPTED
        }
        SessionPhase::Succeeded => StatusCode::OK,
        SessionPhase::Failed | SessionPhase::TimedOut => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /api/sessions - accept one work delivery and start (or re-observe)
/// its session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    /// Originating system, e.g. "scheduler" or "manual"
    pub source: String,
    /// Delivery identity assigned by the originating system
    pub request_id: String,
}

pub async fn start_session(
    State(state): State<ApiState>,
    Json(request): Json<StartSessionRequest>,
) -> impl IntoResponse {
    if request.source.trim().is_empty() {
        return session_error(SessionErrorCode::InvalidRequest, "source cannot be empty")
            .into_response();
    }
    if request.request_id.trim().is_empty() {
        return session_error(SessionErrorCode::InvalidRequest, "requestId cannot be empty")
            .into_response();
    }

    let correlation_id = trigger::derive_correlation_id(&request.source, &request.request_id);

    let handle = match state.app_state.start_session(correlation_id.clone()).await {
        Ok(handle) => handle,
        Err(err) => {
            return session_error(
                SessionErrorCode::OrchestratorUnavailable,
                format!("Failed to start session: {err}"),
            )
            .into_response();
        }
    };

    match handle.snapshot().await {
        Ok(Some(snapshot)) => {
            (status_code_for_phase(snapshot.phase), Json(snapshot)).into_response()
        }
        Ok(None) => session_error(
            SessionErrorCode::SessionNotFound,
            format!("Session {correlation_id} vanished after start"),
        )
        .into_response(),
        Err(err) => session_error(
            SessionErrorCode::OrchestratorUnavailable,
            format!("Orchestrator rpc failed: {err}"),
        )
        .into_response(),
    }
}

/// GET /api/sessions - all registered sessions, most recent first
pub async fn list_sessions(State(state): State<ApiState>) -> impl IntoResponse {
    match state.app_state.list_sessions().await {
        Ok(sessions) => (StatusCode::OK, Json(json!({ "sessions": sessions }))).into_response(),
        Err(err) => session_error(
            SessionErrorCode::OrchestratorUnavailable,
            format!("Orchestrator rpc failed: {err}"),
        )
        .into_response(),
    }
}

/// GET /api/sessions/{correlation_id} - snapshot for one session
pub async fn get_session(
    State(state): State<ApiState>,
    Path(correlation_id): Path<String>,
) -> impl IntoResponse {
    match state.app_state.session_status(correlation_id.clone()).await {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(snapshot)).into_response(),
        Ok(None) => session_error(
            SessionErrorCode::SessionNotFound,
            format!("No session for correlation id {correlation_id}"),
        )
        .into_response(),
        Err(err) => session_error(
            SessionErrorCode::OrchestratorUnavailable,
            format!("Orchestrator rpc failed: {err}"),
        )
        .into_response(),
    }
}
