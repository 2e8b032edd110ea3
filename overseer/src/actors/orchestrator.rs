//! SessionOrchestratorActor - session registry and supervision root
//!
//! One orchestrator owns the session registry. Starting a session is
//! get-or-create on the correlation id: the first request spawns a linked
//! runner actor, re-deliveries observe the existing entry. Runners report
//! exactly one terminal outcome each; the registry records the first report
//! and ignores the rest, so a finished session can never change its result.
//!
//! ## Supervision
//!
//! Runner actors are spawn-linked. A runner that crashes before reporting is
//! marked failed from the supervision event, so waiters never hang on a dead
//! session.

use std::collections::HashMap;

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use shared_types::{FailureKind, SessionOutcome, SessionPhase, SessionSnapshot};

use crate::actors::event_store::EventStoreMsg;
use crate::actors::session_runner::{SessionRunnerActor, SessionRunnerArguments};
use crate::workflow::controller::WorkflowPolicy;
use crate::workflow::launcher::SharedAgentLauncher;

/// Actor that owns the session registry
#[derive(Debug, Default)]
pub struct SessionOrchestratorActor;

/// Arguments for spawning SessionOrchestratorActor
pub struct OrchestratorArguments {
    pub event_store: ActorRef<EventStoreMsg>,
    pub launcher: SharedAgentLauncher,
    pub policy: WorkflowPolicy,
}

/// State for SessionOrchestratorActor
pub struct OrchestratorState {
    event_store: ActorRef<EventStoreMsg>,
    launcher: SharedAgentLauncher,
    policy: WorkflowPolicy,
    sessions: HashMap<String, SessionSnapshot>,
    supervision_event_counts: SupervisionEventCounts,
    last_supervision_failure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisionEventCounts {
    pub actor_started: u64,
    pub actor_failed: u64,
    pub actor_terminated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorHealth {
    pub sessions_total: usize,
    pub sessions_active: usize,
    pub supervision_event_counts: SupervisionEventCounts,
    pub last_supervision_failure: Option<String>,
}

/// Errors surfaced by orchestrator operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("failed to spawn session runner: {0}")]
    SpawnFailed(String),

    #[error("orchestrator rpc failed: {0}")]
    Rpc(String),
}

// ============================================================================
// Messages
// ============================================================================

/// Messages handled by SessionOrchestratorActor
#[derive(Debug)]
pub enum OrchestratorMsg {
    /// Start (or re-observe) the session for a correlation id. Idempotent.
    StartSession {
        correlation_id: String,
        reply: RpcReplyPort<Result<SessionSnapshot, OrchestratorError>>,
    },
    /// Current snapshot for one session
    GetSession {
        correlation_id: String,
        reply: RpcReplyPort<Option<SessionSnapshot>>,
    },
    /// All sessions, most recently created first
    ListSessions {
        reply: RpcReplyPort<Vec<SessionSnapshot>>,
    },
    /// Non-terminal progress report from a running workflow
    SessionPhaseChanged {
        correlation_id: String,
        phase: SessionPhase,
    },
    /// Terminal outcome report from a session runner
    SessionFinished {
        correlation_id: String,
        outcome: SessionOutcome,
    },
    /// Return health snapshot and supervision counters
    GetHealth {
        reply: RpcReplyPort<OrchestratorHealth>,
    },
}

#[async_trait]
impl Actor for SessionOrchestratorActor {
    type Msg = OrchestratorMsg;
    type State = OrchestratorState;
    type Arguments = OrchestratorArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            "SessionOrchestratorActor starting"
        );

        Ok(OrchestratorState {
            event_store: args.event_store,
            launcher: args.launcher,
            policy: args.policy,
            sessions: HashMap::new(),
            supervision_event_counts: SupervisionEventCounts::default(),
            last_supervision_failure: None,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            OrchestratorMsg::StartSession {
                correlation_id,
                reply,
            } => {
                let result = self
                    .handle_start_session(&myself, correlation_id, state)
                    .await;
                let _ = reply.send(result);
            }
            OrchestratorMsg::GetSession {
                correlation_id,
                reply,
            } => {
                let _ = reply.send(state.sessions.get(&correlation_id).cloned());
            }
            OrchestratorMsg::ListSessions { reply } => {
                let mut sessions: Vec<SessionSnapshot> =
                    state.sessions.values().cloned().collect();
                sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                let _ = reply.send(sessions);
            }
            OrchestratorMsg::SessionPhaseChanged {
                correlation_id,
                phase,
            } => {
                if let Some(snapshot) = state.sessions.get_mut(&correlation_id) {
                    snapshot.advance(phase);
                } else {
                    tracing::debug!(
                        correlation_id = %correlation_id,
                        "Phase report for unknown session ignored"
                    );
                }
            }
            OrchestratorMsg::SessionFinished {
                correlation_id,
                outcome,
            } => {
                Self::handle_session_finished(state, correlation_id, outcome);
            }
            OrchestratorMsg::GetHealth { reply } => {
                let sessions_active = state
                    .sessions
                    .values()
                    .filter(|snapshot| snapshot.outcome.is_none())
                    .count();
                let _ = reply.send(OrchestratorHealth {
                    sessions_total: state.sessions.len(),
                    sessions_active,
                    supervision_event_counts: state.supervision_event_counts.clone(),
                    last_supervision_failure: state.last_supervision_failure.clone(),
                });
            }
        }
        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        event: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::debug!(
            orchestrator = %myself.get_id(),
            event = ?event,
            "SessionOrchestratorActor received supervision event"
        );
        match &event {
            SupervisionEvent::ActorStarted(_) => {
                state.supervision_event_counts.actor_started += 1;
            }
            SupervisionEvent::ActorFailed(actor_cell, failure) => {
                state.supervision_event_counts.actor_failed += 1;
                state.last_supervision_failure =
                    Some(format!("actor_id={} error={failure}", actor_cell.get_id()));
                Self::mark_failed_runner(state, actor_cell.get_name(), &failure.to_string());
            }
            SupervisionEvent::ActorTerminated(_, _, _) => {
                state.supervision_event_counts.actor_terminated += 1;
            }
            _ => {}
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            "SessionOrchestratorActor stopped"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl SessionOrchestratorActor {
    async fn handle_start_session(
        &self,
        myself: &ActorRef<OrchestratorMsg>,
        correlation_id: String,
        state: &mut OrchestratorState,
    ) -> Result<SessionSnapshot, OrchestratorError> {
        if let Some(snapshot) = state.sessions.get(&correlation_id) {
            tracing::info!(
                correlation_id = %correlation_id,
                phase = ?snapshot.phase,
                "Session already registered, re-delivery observed"
            );
            return Ok(snapshot.clone());
        }

        let snapshot = SessionSnapshot::new(correlation_id.clone());
        Actor::spawn_linked(
            Some(format!("session:{correlation_id}")),
            SessionRunnerActor,
            SessionRunnerArguments {
                orchestrator: myself.clone(),
                event_store: state.event_store.clone(),
                launcher: state.launcher.clone(),
                policy: state.policy.clone(),
                correlation_id: correlation_id.clone(),
            },
            myself.get_cell(),
        )
        .await
        .map_err(|e| OrchestratorError::SpawnFailed(e.to_string()))?;

        tracing::info!(correlation_id = %correlation_id, "Session runner started");
        state.sessions.insert(correlation_id, snapshot.clone());
        Ok(snapshot)
    }

    fn handle_session_finished(
        state: &mut OrchestratorState,
        correlation_id: String,
        outcome: SessionOutcome,
    ) {
        match state.sessions.get_mut(&correlation_id) {
            Some(snapshot) => {
                if snapshot.finish(outcome.clone()) {
                    tracing::info!(
                        correlation_id = %correlation_id,
                        outcome = ?outcome,
                        "Session finished"
                    );
                } else {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        outcome = outcome.label(),
                        "Late outcome report ignored, session already terminal"
                    );
                }
            }
            None => {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    "Outcome reported for unknown session"
                );
            }
        }
    }

    /// A runner that died without reporting leaves its session failed rather
    /// than forever pending.
    fn mark_failed_runner(
        state: &mut OrchestratorState,
        actor_name: Option<String>,
        failure: &str,
    ) {
        let Some(name) = actor_name else { return };
        let Some(correlation_id) = name.strip_prefix("session:") else {
            return;
        };
        let Some(snapshot) = state.sessions.get_mut(correlation_id) else {
            return;
        };
        if snapshot.outcome.is_none() {
            tracing::error!(
                correlation_id = %correlation_id,
                failure,
                "Session runner failed before reporting an outcome"
            );
            snapshot.finish(SessionOutcome::Failed {
                kind: FailureKind::InvocationFailed,
                detail: Some(format!("session runner failed: {failure}")),
            });
        }
    }
}

// ============================================================================
// Session Handle
// ============================================================================

/// Client handle to one session
#[derive(Clone)]
pub struct SessionHandle {
    correlation_id: String,
    orchestrator: ActorRef<OrchestratorMsg>,
}

impl SessionHandle {
    pub fn new(correlation_id: String, orchestrator: ActorRef<OrchestratorMsg>) -> Self {
        Self {
            correlation_id,
            orchestrator,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Current registry snapshot for this session
    pub async fn snapshot(&self) -> Result<Option<SessionSnapshot>, OrchestratorError> {
        ractor::call!(&self.orchestrator, |reply| OrchestratorMsg::GetSession {
            correlation_id: self.correlation_id.clone(),
            reply,
        })
        .map_err(|e| OrchestratorError::Rpc(e.to_string()))
    }

    /// Suspend until the session reaches its terminal outcome.
    ///
    /// The deadline baked into the workflow bounds how long this can take;
    /// the interval only controls how often the registry is re-checked.
    pub async fn wait(
        &self,
        poll_interval: std::time::Duration,
    ) -> Result<SessionOutcome, OrchestratorError> {
        loop {
            match self.snapshot().await? {
                Some(snapshot) => {
                    if let Some(outcome) = snapshot.outcome {
                        return Ok(outcome);
                    }
                }
                None => {
                    return Err(OrchestratorError::SessionNotFound(
                        self.correlation_id.clone(),
                    ))
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::event_store::{EventStoreActor, EventStoreArguments};
    use crate::workflow::launcher::{AgentLauncher, LaunchAck, LaunchError};
    use async_trait::async_trait;
    use ractor::Actor;
    use std::sync::Arc;
    use std::time::Duration;

    struct AcceptingLauncher;

    #[async_trait]
    impl AgentLauncher for AcceptingLauncher {
        async fn launch(&self, _correlation_id: &str) -> Result<LaunchAck, LaunchError> {
            Ok(LaunchAck::default())
        }
    }

    async fn spawn_orchestrator() -> (ActorRef<OrchestratorMsg>, ActorRef<EventStoreMsg>) {
        let (store_ref, _handle) =
            Actor::spawn(None, EventStoreActor, EventStoreArguments::InMemory)
                .await
                .unwrap();
        let (orchestrator, _handle) = Actor::spawn(
            None,
            SessionOrchestratorActor,
            OrchestratorArguments {
                event_store: store_ref.clone(),
                launcher: Arc::new(AcceptingLauncher),
                policy: WorkflowPolicy {
                    poll_interval: Duration::from_millis(50),
                    session_deadline: Duration::from_secs(30),
                    terminal_query_limit: 20,
                    max_poll_attempts: 1000,
                },
            },
        )
        .await
        .unwrap();
        (orchestrator, store_ref)
    }

    async fn start(orchestrator: &ActorRef<OrchestratorMsg>, correlation_id: &str) -> SessionSnapshot {
        ractor::call!(orchestrator, |reply| OrchestratorMsg::StartSession {
            correlation_id: correlation_id.to_string(),
            reply,
        })
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn test_start_session_is_get_or_create() {
        let (orchestrator, store_ref) = spawn_orchestrator().await;

        let first = start(&orchestrator, "orc-idem").await;
        let second = start(&orchestrator, "orc-idem").await;
        assert_eq!(first.correlation_id, second.correlation_id);

        let sessions = ractor::call!(&orchestrator, |reply| OrchestratorMsg::ListSessions {
            reply
        })
        .unwrap();
        assert_eq!(sessions.len(), 1);

        orchestrator.stop(None);
        store_ref.stop(None);
    }

    #[tokio::test]
    async fn test_first_outcome_report_wins() {
        let (orchestrator, store_ref) = spawn_orchestrator().await;
        start(&orchestrator, "orc-once").await;

        orchestrator
            .send_message(OrchestratorMsg::SessionFinished {
                correlation_id: "orc-once".to_string(),
                outcome: SessionOutcome::Succeeded,
            })
            .unwrap();
        orchestrator
            .send_message(OrchestratorMsg::SessionFinished {
                correlation_id: "orc-once".to_string(),
                outcome: SessionOutcome::TimedOut,
            })
            .unwrap();

        let snapshot = ractor::call!(&orchestrator, |reply| OrchestratorMsg::GetSession {
            correlation_id: "orc-once".to_string(),
            reply,
        })
        .unwrap()
        .unwrap();

        assert_eq!(snapshot.outcome, Some(SessionOutcome::Succeeded));
        assert_eq!(snapshot.phase, SessionPhase::Succeeded);

        orchestrator.stop(None);
        store_ref.stop(None);
    }

    #[tokio::test]
    async fn test_reports_for_unknown_sessions_are_ignored() {
        let (orchestrator, store_ref) = spawn_orchestrator().await;

        orchestrator
            .send_message(OrchestratorMsg::SessionFinished {
                correlation_id: "orc-ghost".to_string(),
                outcome: SessionOutcome::Succeeded,
            })
            .unwrap();

        let snapshot = ractor::call!(&orchestrator, |reply| OrchestratorMsg::GetSession {
            correlation_id: "orc-ghost".to_string(),
            reply,
        })
        .unwrap();
        assert!(snapshot.is_none());

        orchestrator.stop(None);
        store_ref.stop(None);
    }

    #[tokio::test]
    async fn test_handle_wait_sees_the_outcome() {
        let (orchestrator, store_ref) = spawn_orchestrator().await;
        let snapshot = start(&orchestrator, "orc-wait").await;
        let handle = SessionHandle::new(snapshot.correlation_id, orchestrator.clone());

        orchestrator
            .send_message(OrchestratorMsg::SessionFinished {
                correlation_id: "orc-wait".to_string(),
                outcome: SessionOutcome::Succeeded,
            })
            .unwrap();

        let outcome = handle.wait(Duration::from_millis(10)).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Succeeded);
        assert_eq!(handle.correlation_id(), "orc-wait");

        orchestrator.stop(None);
        store_ref.stop(None);
    }

    #[tokio::test]
    async fn test_health_counts_sessions() {
        let (orchestrator, store_ref) = spawn_orchestrator().await;
        start(&orchestrator, "orc-health-a").await;
        start(&orchestrator, "orc-health-b").await;

        orchestrator
            .send_message(OrchestratorMsg::SessionFinished {
                correlation_id: "orc-health-a".to_string(),
                outcome: SessionOutcome::Succeeded,
            })
            .unwrap();

        let health = ractor::call!(&orchestrator, |reply| OrchestratorMsg::GetHealth {
            reply
        })
        .unwrap();
        assert_eq!(health.sessions_total, 2);
        assert_eq!(health.sessions_active, 1);

        orchestrator.stop(None);
        store_ref.stop(None);
    }
}
