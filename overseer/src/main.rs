use axum::http::{header, Method};
use overseer::actors::event_store::{EventStoreActor, EventStoreArguments};
use overseer::api;
use overseer::app_state::AppState;
use overseer::config::Config;
use overseer::workflow::launcher::{HttpAgentLauncher, SharedAgentLauncher};
use ractor::Actor;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    for dir in cwd.ancestors() {
        let candidate = dir.join(".env");
        if !candidate.exists() {
            continue;
        }
        match dotenvy::from_path(&candidate) {
            Ok(_) => {
                tracing::info!(path = %candidate.display(), "Loaded environment from .env");
            }
            Err(e) => {
                tracing::warn!(
                    path = %candidate.display(),
                    error = %e,
                    "Failed to load .env file"
                );
            }
        }
        return;
    }

    tracing::info!(
        cwd = %cwd.display(),
        "No .env file found in current directory or ancestors; using process environment only"
    );
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load .env values early so running from `overseer/` still picks up a
    // repo-root `.env`.
    load_env_file();

    let config = Config::from_env().expect("Invalid configuration");

    tracing::info!("Starting Overseer session service");

    let db_path = std::path::PathBuf::from(&config.database_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create data directory");
    }

    // libsql takes a plain file path (not a sqlite:// URL)
    let db_path_str = db_path.to_str().expect("Invalid database path");
    tracing::info!(database_path = %db_path_str, "Opening session journal");
    let (event_store, _handle) = Actor::spawn(
        None,
        EventStoreActor,
        EventStoreArguments::File(db_path_str.to_string()),
    )
    .await
    .expect("Failed to create event store");

    tracing::info!("EventStoreActor started");

    let launcher: SharedAgentLauncher =
        Arc::new(HttpAgentLauncher::new(config.agent_endpoint.clone()));
    let app_state = Arc::new(AppState::new(
        event_store,
        launcher,
        config.workflow_policy(),
    ));
    let _ = app_state
        .ensure_orchestrator()
        .await
        .expect("Failed to spawn SessionOrchestratorActor");

    tracing::info!(
        agent_endpoint = %config.agent_endpoint,
        poll_ms = config.poll_interval.as_millis() as u64,
        deadline_secs = config.session_deadline.as_secs(),
        max_poll_attempts = config.max_poll_attempts,
        "Session workflow configured"
    );

    // Workers and operator tools call this API from anywhere; the API carries
    // no cookies, so a permissive CORS policy is enough.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    let api_state = api::ApiState { app_state };

    let app = api::router().with_state(api_state).layer(cors);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server listening");
    axum::serve(listener, app).await
}
