//! Invocation bracketing around the remote agent launch
//!
//! Every launch attempt is bracketed by journal events so the session's
//! history shows whether work could have started. The start record is written
//! before the launch call and the call never happens without it: an untracked
//! invocation is strictly worse than a failed one.

use ractor::ActorRef;
use shared_types::{EventKind, SequenceClock};

use crate::actors::event_store::{AppendSessionEvent, EventStoreMsg};
use crate::workflow::launcher::SharedAgentLauncher;

/// Errors from one invocation attempt
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    /// A bracketing event could not be journaled; the launch was either not
    /// made or can no longer be trusted as tracked
    #[error("journaling failed: {0}")]
    JournalingFailed(String),

    /// The launch call itself failed; the worker may not have started
    #[error("launch call failed: {0}")]
    CallFailed(String),
}

/// Receipt for a launched and journaled invocation
#[derive(Debug, Clone)]
pub struct InvocationHandle {
    pub correlation_id: String,
    pub reference: Option<String>,
}

/// Performs the journal-bracketed launch of one remote worker
pub struct Invoker {
    event_store: ActorRef<EventStoreMsg>,
    launcher: SharedAgentLauncher,
    clock: SequenceClock,
}

impl Invoker {
    pub fn new(event_store: ActorRef<EventStoreMsg>, launcher: SharedAgentLauncher) -> Self {
        Self {
            event_store,
            launcher,
            clock: SequenceClock::new(),
        }
    }

    /// Start exactly one remote worker run for this correlation id.
    ///
    /// One bracketing pair per attempt, no internal retries: retry policy
    /// belongs to the caller, at new-correlation-id granularity.
    pub async fn invoke(&self, correlation_id: &str) -> Result<InvocationHandle, InvocationError> {
        self.append(correlation_id, EventKind::InvocationStarted, None)
            .await
            .map_err(InvocationError::JournalingFailed)?;

        match self.launcher.launch(correlation_id).await {
            Ok(ack) => {
                self.append(correlation_id, EventKind::InvocationSucceeded, None)
                    .await
                    .map_err(|e| {
                        InvocationError::JournalingFailed(format!(
                            "launch acknowledged but journaling failed: {e}; the agent may be running"
                        ))
                    })?;
                tracing::info!(
                    correlation_id,
                    reference = ?ack.reference,
                    "Agent launch journaled"
                );
                Ok(InvocationHandle {
                    correlation_id: correlation_id.to_string(),
                    reference: ack.reference,
                })
            }
            Err(launch_err) => {
                let detail = launch_err.to_string();
                if let Err(journal_err) = self
                    .append(
                        correlation_id,
                        EventKind::InvocationFailed,
                        Some(detail.clone()),
                    )
                    .await
                {
                    tracing::warn!(
                        correlation_id,
                        error = %journal_err,
                        "Could not journal the launch failure"
                    );
                }
                Err(InvocationError::CallFailed(detail))
            }
        }
    }

    async fn append(
        &self,
        correlation_id: &str,
        kind: EventKind,
        detail: Option<String>,
    ) -> Result<(), String> {
        let mut event = AppendSessionEvent::new(correlation_id, self.clock.next(), kind);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        match ractor::call!(&self.event_store, |reply| EventStoreMsg::Append {
            event,
            reply
        }) {
            Ok(Ok(_ack)) => Ok(()),
            Ok(Err(err)) => Err(format!("event store error: {err}")),
            Err(err) => Err(format!("event store rpc error: {err}")),
        }
    }
}
