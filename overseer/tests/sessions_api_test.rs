//! Integration tests for the session and journal API endpoints
//!
//! Tests full HTTP request/response cycles against an in-process router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ractor::Actor;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use async_trait::async_trait;

use overseer::actors::event_store::{EventStoreActor, EventStoreArguments};
use overseer::api;
use overseer::app_state::AppState;
use overseer::trigger;
use overseer::workflow::controller::WorkflowPolicy;
use overseer::workflow::launcher::{AgentLauncher, LaunchAck, LaunchError};

/// Accepts every launch; the worker never reports on its own. Tests that need
/// a terminal event post one through the journal endpoint.
struct AcceptingLauncher;

#[async_trait]
impl AgentLauncher for AcceptingLauncher {
    async fn launch(&self, _correlation_id: &str) -> Result<LaunchAck, LaunchError> {
        Ok(LaunchAck::default())
    }
}

async fn setup_test_app() -> (axum::Router, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test_events.db");
    let db_path_str = db_path.to_str().expect("Invalid database path");

    let (event_store, _handle) = Actor::spawn(
        None,
        EventStoreActor,
        EventStoreArguments::File(db_path_str.to_string()),
    )
    .await
    .expect("Failed to create event store");

    let policy = WorkflowPolicy {
        poll_interval: Duration::from_millis(50),
        session_deadline: Duration::from_secs(3),
        terminal_query_limit: 20,
        max_poll_attempts: 100,
    };
    let app_state = Arc::new(AppState::new(
        event_store,
        Arc::new(AcceptingLauncher),
        policy,
    ));
    let api_state = api::ApiState { app_state };

    let app = api::router().with_state(api_state);
    (app, temp_dir)
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).unwrap_or_else(|_| {
        let text = String::from_utf8_lossy(&body).to_string();
        json!({
            "error": {
                "message": text
            }
        })
    });
    (status, value)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Poll the session endpoint until an outcome appears.
async fn wait_for_outcome(app: &axum::Router, correlation_id: &str) -> Value {
    for _ in 0..40 {
        let (status, body) =
            json_response(app, get(&format!("/api/sessions/{correlation_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        if body.get("outcome").is_some() {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("session {correlation_id} never reached an outcome");
}

#[tokio::test]
async fn test_health_endpoint_reports_service() {
    let (app, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "overseer");
    assert_eq!(body["sessions_total"], 0);
}

#[tokio::test]
async fn test_start_session_validation_empty_source() {
    let (app, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        post_json(
            "/api/sessions",
            json!({ "source": "", "requestId": "api-val-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_start_session_validation_blank_request_id() {
    let (app, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        post_json(
            "/api/sessions",
            json!({ "source": "scheduler", "requestId": "   " }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_start_session_returns_derived_correlation_id() {
    let (app, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        post_json(
            "/api/sessions",
            json!({ "source": "scheduler", "requestId": "api-start-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        body["correlationId"],
        trigger::derive_correlation_id("scheduler", "api-start-1")
    );
    assert!(body["phase"].is_string());
    // No outcome yet, and the field is omitted rather than null.
    assert!(body.get("outcome").is_none());
}

#[tokio::test]
async fn test_start_session_is_idempotent_for_redelivery() {
    let (app, _temp_dir) = setup_test_app().await;
    let delivery = json!({ "source": "scheduler", "requestId": "api-redeliver-1" });

    let (first_status, first) =
        json_response(&app, post_json("/api/sessions", delivery.clone())).await;
    let (second_status, second) = json_response(&app, post_json("/api/sessions", delivery)).await;

    assert_eq!(first_status, StatusCode::ACCEPTED);
    assert_eq!(second_status, StatusCode::ACCEPTED);
    assert_eq!(first["correlationId"], second["correlationId"]);

    let (status, body) = json_response(&app, get("/api/sessions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_unknown_session_returns_not_found() {
    let (app, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(&app, get("/api/sessions/sess-does-not-exist")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn test_worker_terminal_event_resolves_session() {
    let (app, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        post_json(
            "/api/sessions",
            json!({ "source": "scheduler", "requestId": "api-resolve-1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let correlation_id = body["correlationId"].as_str().unwrap().to_string();

    // The worker reports success without its own sequence key; the service
    // stamps one on arrival.
    let (status, body) = json_response(
        &app,
        post_json(
            &format!("/api/sessions/{correlation_id}/events"),
            json!({ "eventType": "WORKER_SUCCEEDED" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["deduplicated"], false);
    assert!(body["sequenceKey"].is_string());

    let session = wait_for_outcome(&app, &correlation_id).await;
    assert_eq!(session["outcome"]["result"], "succeeded");
    assert_eq!(session["phase"], "succeeded");
}

#[tokio::test]
async fn test_worker_failure_surfaces_kind_and_detail() {
    let (app, _temp_dir) = setup_test_app().await;

    let (_, body) = json_response(
        &app,
        post_json(
            "/api/sessions",
            json!({ "source": "scheduler", "requestId": "api-fail-1" }),
        ),
    )
    .await;
    let correlation_id = body["correlationId"].as_str().unwrap().to_string();

    let (status, _) = json_response(
        &app,
        post_json(
            &format!("/api/sessions/{correlation_id}/events"),
            json!({ "eventType": "WORKER_FAILED", "errorDetail": "disk full" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let session = wait_for_outcome(&app, &correlation_id).await;
    assert_eq!(session["outcome"]["result"], "failed");
    assert_eq!(session["outcome"]["kind"], "worker_reported_failure");
    assert_eq!(session["outcome"]["detail"], "disk full");
}

#[tokio::test]
async fn test_append_event_is_deduplicated_by_sequence_key() {
    let (app, _temp_dir) = setup_test_app().await;
    let event = json!({
        "eventType": "STEP_COMPLETED",
        "sequenceKey": "2026-03-01T10:00:00.000000Z",
    });

    let (first_status, first) = json_response(
        &app,
        post_json("/api/sessions/sess-api-dedup/events", event.clone()),
    )
    .await;
    let (second_status, second) = json_response(
        &app,
        post_json("/api/sessions/sess-api-dedup/events", event),
    )
    .await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(first["deduplicated"], false);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(second["deduplicated"], true);

    let (_, body) = json_response(&app, get("/api/sessions/sess-api-dedup/events")).await;
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_session_events_returns_journal_ascending() {
    let (app, _temp_dir) = setup_test_app().await;

    // Appended out of order on purpose.
    for key in [
        "2026-03-01T10:00:02.000000Z",
        "2026-03-01T10:00:01.000000Z",
        "2026-03-01T10:00:03.000000Z",
    ] {
        let (status, _) = json_response(
            &app,
            post_json(
                "/api/sessions/sess-api-journal/events",
                json!({ "eventType": "STEP_COMPLETED", "sequenceKey": key }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = json_response(&app, get("/api/sessions/sess-api-journal/events")).await;

    assert_eq!(status, StatusCode::OK);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    let keys: Vec<&str> = events
        .iter()
        .map(|e| e["sequenceKey"].as_str().unwrap())
        .collect();
    assert_eq!(
        keys,
        vec![
            "2026-03-01T10:00:01.000000Z",
            "2026-03-01T10:00:02.000000Z",
            "2026-03-01T10:00:03.000000Z",
        ]
    );
    assert_eq!(events[0]["correlationId"], "sess-api-journal");
    assert_eq!(events[0]["eventType"], "STEP_COMPLETED");
}

#[tokio::test]
async fn test_append_event_rejects_empty_type() {
    let (app, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        post_json(
            "/api/sessions/sess-api-badtype/events",
            json!({ "eventType": "   " }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
