//! Session workflow state machine
//!
//! One controller drives one session from initiation to its terminal
//! outcome: journal the initiation, launch the worker through the invoker,
//! then poll the journal until a terminal event appears or the time budget
//! runs out. Outcomes are returned as values; the only signal a caller ever
//! gets is exactly one of succeeded, failed, or timed out.

use std::time::{Duration, Instant};

use ractor::ActorRef;
use shared_types::{EventKind, FailureKind, SequenceClock, SessionOutcome, SessionPhase};

use crate::actors::event_store::{AppendSessionEvent, EventStoreMsg};
use crate::actors::orchestrator::OrchestratorMsg;
use crate::workflow::detector::{Completion, CompletionDetector};
use crate::workflow::invoker::Invoker;
use crate::workflow::launcher::SharedAgentLauncher;

/// Default number of terminal events fetched per completion check
pub const DEFAULT_TERMINAL_QUERY_LIMIT: i64 = 20;

/// Tunable timing and query budget for one session workflow
#[derive(Debug, Clone)]
pub struct WorkflowPolicy {
    /// Time between journal polls
    pub poll_interval: Duration,
    /// Overall wall-clock budget, measured from workflow start
    pub session_deadline: Duration,
    /// Terminal events fetched per completion check
    pub terminal_query_limit: i64,
    /// Hard cap on polls, a backstop against deadline misconfiguration
    pub max_poll_attempts: u32,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            session_deadline: Duration::from_secs(1800),
            terminal_query_limit: DEFAULT_TERMINAL_QUERY_LIMIT,
            max_poll_attempts: 360,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Init,
    Invoking,
    Polling { attempt: u32 },
    Done(SessionOutcome),
}

/// Drives one session to its terminal outcome
pub struct WorkflowController {
    event_store: ActorRef<EventStoreMsg>,
    invoker: Invoker,
    detector: CompletionDetector,
    policy: WorkflowPolicy,
    clock: SequenceClock,
    progress: Option<ActorRef<OrchestratorMsg>>,
}

impl WorkflowController {
    pub fn new(
        event_store: ActorRef<EventStoreMsg>,
        launcher: SharedAgentLauncher,
        policy: WorkflowPolicy,
    ) -> Self {
        let invoker = Invoker::new(event_store.clone(), launcher);
        let detector = CompletionDetector::new(event_store.clone(), policy.terminal_query_limit);
        Self {
            event_store,
            invoker,
            detector,
            policy,
            clock: SequenceClock::new(),
            progress: None,
        }
    }

    /// Report non-terminal phase changes to the orchestrator registry.
    pub fn with_progress(mut self, orchestrator: ActorRef<OrchestratorMsg>) -> Self {
        self.progress = Some(orchestrator);
        self
    }

    /// Run the workflow to completion. Never returns early and never panics
    /// the caller into ambiguity: the result is exactly one outcome.
    pub async fn run(&self, correlation_id: &str) -> SessionOutcome {
        let started = Instant::now();
        let mut phase = Phase::Init;

        loop {
            phase = match phase {
                Phase::Init => self.initiate(correlation_id).await,
                Phase::Invoking => self.invoke(correlation_id).await,
                Phase::Polling { attempt } => self.poll(correlation_id, attempt, started).await,
                Phase::Done(outcome) => {
                    tracing::info!(
                        correlation_id,
                        outcome = outcome.label(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Session workflow finished"
                    );
                    return outcome;
                }
            };
        }
    }

    async fn initiate(&self, correlation_id: &str) -> Phase {
        let event = AppendSessionEvent::new(
            correlation_id,
            self.clock.next(),
            EventKind::SessionInitiated,
        );
        let appended = match ractor::call!(&self.event_store, |reply| EventStoreMsg::Append {
            event,
            reply
        }) {
            Ok(Ok(_ack)) => Ok(()),
            Ok(Err(err)) => Err(format!("event store error: {err}")),
            Err(err) => Err(format!("event store rpc error: {err}")),
        };

        match appended {
            Ok(()) => {
                tracing::info!(correlation_id, "Session initiated");
                self.report_phase(correlation_id, SessionPhase::Invoking);
                Phase::Invoking
            }
            Err(detail) => {
                tracing::error!(
                    correlation_id,
                    error = %detail,
                    "Session initiation could not be journaled"
                );
                Phase::Done(SessionOutcome::Failed {
                    kind: FailureKind::InitializationFailed,
                    detail: Some(detail),
                })
            }
        }
    }

    async fn invoke(&self, correlation_id: &str) -> Phase {
        match self.invoker.invoke(correlation_id).await {
            Ok(_handle) => {
                self.report_phase(correlation_id, SessionPhase::Polling);
                Phase::Polling { attempt: 0 }
            }
            Err(err) => {
                tracing::warn!(correlation_id, error = %err, "Invocation failed");
                Phase::Done(SessionOutcome::Failed {
                    kind: FailureKind::InvocationFailed,
                    detail: Some(err.to_string()),
                })
            }
        }
    }

    async fn poll(&self, correlation_id: &str, attempt: u32, started: Instant) -> Phase {
        match self.detector.check(correlation_id).await {
            Ok(Completion::Succeeded) => Phase::Done(SessionOutcome::Succeeded),
            Ok(Completion::Failed { detail }) => Phase::Done(SessionOutcome::Failed {
                kind: FailureKind::WorkerReportedFailure,
                detail,
            }),
            Ok(Completion::Pending) => self.next_tick(correlation_id, attempt, started).await,
            Err(err) => {
                // A failed read never decides a session; the time budget
                // bounds how long reads can keep failing.
                tracing::warn!(correlation_id, attempt, error = %err, "Journal poll failed");
                self.next_tick(correlation_id, attempt, started).await
            }
        }
    }

    async fn next_tick(&self, correlation_id: &str, attempt: u32, started: Instant) -> Phase {
        if started.elapsed() >= self.policy.session_deadline {
            tracing::warn!(
                correlation_id,
                attempt,
                deadline_ms = self.policy.session_deadline.as_millis() as u64,
                "Session deadline exceeded with no terminal event"
            );
            return Phase::Done(SessionOutcome::TimedOut);
        }

        let next_attempt = attempt + 1;
        if next_attempt >= self.policy.max_poll_attempts {
            tracing::warn!(
                correlation_id,
                attempts = next_attempt,
                "Polling attempt budget exhausted"
            );
            return Phase::Done(SessionOutcome::TimedOut);
        }

        tokio::time::sleep(self.policy.poll_interval).await;
        Phase::Polling {
            attempt: next_attempt,
        }
    }

    fn report_phase(&self, correlation_id: &str, phase: SessionPhase) {
        if let Some(orchestrator) = &self.progress {
            let _ = orchestrator.send_message(OrchestratorMsg::SessionPhaseChanged {
                correlation_id: correlation_id.to_string(),
                phase,
            });
        }
    }
}
