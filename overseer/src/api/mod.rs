//! HTTP API routes for the Overseer service
//!
//! Stateless HTTP access to the session registry and the event journal:
//! triggers start sessions, remote workers append events, operators inspect
//! both.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub mod events;
pub mod sessions;

use crate::app_state::AppState;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: Arc<AppState>,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        // Session routes
        .route(
            "/api/sessions",
            get(sessions::list_sessions).post(sessions::start_session),
        )
        .route("/api/sessions/{correlation_id}", get(sessions::get_session))
        // Journal routes
        .route(
            "/api/sessions/{correlation_id}/events",
            get(events::list_session_events).post(events::append_session_event),
        )
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    match state.app_state.orchestrator_health().await {
        Ok(health) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "overseer",
                "version": "0.1.0",
                "sessions_total": health.sessions_total,
                "sessions_active": health.sessions_active,
                "supervision": {
                    "actor_started": health.supervision_event_counts.actor_started,
                    "actor_failed": health.supervision_event_counts.actor_failed,
                    "actor_terminated": health.supervision_event_counts.actor_terminated,
                },
            })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "error": err })),
        )
            .into_response(),
    }
}
