//! Journal API endpoints
//!
//! The worker-facing write path and the operator-facing inspection path.
//! Workers report progress and terminal results here; nothing calls a worker
//! back, the journal is the only channel.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use ractor::ActorRef;
use serde_json::json;

use shared_types::AppendEventRequest;

use crate::actors::event_store::{AppendSessionEvent, EventStoreMsg};
use crate::api::ApiState;

/// Append through the store actor, split out for testability
pub(crate) async fn append_to_store(
    event_store: &ActorRef<EventStoreMsg>,
    event: AppendSessionEvent,
) -> Result<bool, String> {
    match ractor::call!(event_store, |reply| EventStoreMsg::Append { event, reply }) {
        Ok(Ok(ack)) => Ok(ack.deduplicated),
        Ok(Err(err)) => Err(format!("EventStore error: {err}")),
        Err(err) => Err(format!("RPC error: {err}")),
    }
}

/// POST /api/sessions/{correlation_id}/events - append one journal event
///
/// Event types outside the core set are accepted as-is; completion detection
/// ignores what it does not recognize. A missing sequence key is stamped from
/// the service's own clock on arrival.
pub async fn append_session_event(
    State(state): State<ApiState>,
    Path(correlation_id): Path<String>,
    Json(request): Json<AppendEventRequest>,
) -> impl IntoResponse {
    if correlation_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "correlation id cannot be empty" })),
        )
            .into_response();
    }
    if request.event_type.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "eventType cannot be empty" })),
        )
            .into_response();
    }

    let sequence_key = request
        .sequence_key
        .unwrap_or_else(|| state.app_state.ingress_clock().next());

    let event = AppendSessionEvent {
        correlation_id,
        sequence_key: sequence_key.clone(),
        event_type: request.event_type,
        error_detail: request.error_detail,
    };

    match append_to_store(&state.app_state.event_store(), event).await {
        Ok(deduplicated) => {
            let status = if deduplicated {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (
                status,
                Json(json!({
                    "sequenceKey": sequence_key,
                    "deduplicated": deduplicated,
                })),
            )
                .into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err })),
        )
            .into_response(),
    }
}

/// GET /api/sessions/{correlation_id}/events - full journal, oldest first
pub async fn list_session_events(
    State(state): State<ApiState>,
    Path(correlation_id): Path<String>,
) -> impl IntoResponse {
    let event_store = state.app_state.event_store();
    match ractor::call!(&event_store, |reply| EventStoreMsg::ListSession {
        correlation_id: correlation_id.clone(),
        reply,
    }) {
        Ok(Ok(events)) => (StatusCode::OK, Json(json!({ "events": events }))).into_response(),
        Ok(Err(err)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("EventStore error: {err}") })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("RPC error: {err}") })),
        )
            .into_response(),
    }
}
