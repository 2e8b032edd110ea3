//! Shared application state for the HTTP API
//!
//! Owns the handles the API layer needs: the journal store, the launcher,
//! the workflow policy, and a lazily spawned orchestrator. Cloning is cheap;
//! everything lives behind one Arc.

use std::sync::Arc;
use std::time::Duration;

use ractor::{Actor, ActorRef};
use tokio::sync::Mutex;

use shared_types::{SequenceClock, SessionOutcome, SessionSnapshot};

use crate::actors::event_store::EventStoreMsg;
use crate::actors::orchestrator::{
    OrchestratorArguments, OrchestratorHealth, OrchestratorMsg, SessionHandle,
    SessionOrchestratorActor,
};
use crate::workflow::controller::WorkflowPolicy;
use crate::workflow::launcher::SharedAgentLauncher;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    event_store: ActorRef<EventStoreMsg>,
    launcher: SharedAgentLauncher,
    policy: WorkflowPolicy,
    ingress_clock: SequenceClock,
    orchestrator: Mutex<Option<ActorRef<OrchestratorMsg>>>,
}

impl AppState {
    pub fn new(
        event_store: ActorRef<EventStoreMsg>,
        launcher: SharedAgentLauncher,
        policy: WorkflowPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                event_store,
                launcher,
                policy,
                ingress_clock: SequenceClock::new(),
                orchestrator: Mutex::new(None),
            }),
        }
    }

    pub fn event_store(&self) -> ActorRef<EventStoreMsg> {
        self.inner.event_store.clone()
    }

    /// Sequence-key clock for events accepted over HTTP without their own key
    pub fn ingress_clock(&self) -> &SequenceClock {
        &self.inner.ingress_clock
    }

    /// Get or create the session orchestrator
    pub async fn ensure_orchestrator(&self) -> Result<ActorRef<OrchestratorMsg>, String> {
        let mut guard = self.inner.orchestrator.lock().await;
        if let Some(orchestrator) = guard.as_ref() {
            return Ok(orchestrator.clone());
        }

        let (orchestrator, _handle) = Actor::spawn(
            Some(format!("session_orchestrator:{}", ulid::Ulid::new())),
            SessionOrchestratorActor,
            OrchestratorArguments {
                event_store: self.inner.event_store.clone(),
                launcher: self.inner.launcher.clone(),
                policy: self.inner.policy.clone(),
            },
        )
        .await
        .map_err(|e| e.to_string())?;

        *guard = Some(orchestrator.clone());
        Ok(orchestrator)
    }

    /// Start the workflow for a correlation id (idempotent) and return a
    /// handle that can wait for its outcome
    pub async fn start_session(&self, correlation_id: String) -> Result<SessionHandle, String> {
        let orchestrator = self.ensure_orchestrator().await?;
        let snapshot = ractor::call!(&orchestrator, |reply| OrchestratorMsg::StartSession {
            correlation_id,
            reply,
        })
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
        Ok(SessionHandle::new(snapshot.correlation_id, orchestrator))
    }

    /// Start a session and block until its outcome is known
    pub async fn run_session(
        &self,
        correlation_id: String,
        await_poll_interval: Duration,
    ) -> Result<SessionOutcome, String> {
        let handle = self.start_session(correlation_id).await?;
        handle
            .wait(await_poll_interval)
            .await
            .map_err(|e| e.to_string())
    }

    pub async fn session_status(
        &self,
        correlation_id: String,
    ) -> Result<Option<SessionSnapshot>, String> {
        let orchestrator = self.ensure_orchestrator().await?;
        ractor::call!(&orchestrator, |reply| OrchestratorMsg::GetSession {
            correlation_id,
            reply,
        })
        .map_err(|e| e.to_string())
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, String> {
        let orchestrator = self.ensure_orchestrator().await?;
        ractor::call!(&orchestrator, |reply| OrchestratorMsg::ListSessions { reply })
            .map_err(|e| e.to_string())
    }

    pub async fn orchestrator_health(&self) -> Result<OrchestratorHealth, String> {
        let orchestrator = self.ensure_orchestrator().await?;
        ractor::call!(&orchestrator, |reply| OrchestratorMsg::GetHealth { reply })
            .map_err(|e| e.to_string())
    }
}
