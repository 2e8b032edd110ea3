//! Completion detection over the session journal
//!
//! Classification is a pure function of the terminal-prefixed events present
//! for one correlation id. Nothing here mutates state, so repeated checks
//! with no intervening writes always agree.

use ractor::ActorRef;
use shared_types::{EventKind, SessionEvent, TERMINAL_EVENT_PREFIX};

use crate::actors::event_store::{EventStoreMsg, StoreError};

/// Classification of a session's current journal contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// No terminal event observed yet
    Pending,
    Succeeded,
    Failed { detail: Option<String> },
}

/// Errors reading the journal for classification
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("event store error: {0}")]
    Store(#[from] StoreError),

    #[error("event store rpc failed: {0}")]
    Rpc(String),
}

/// Classify journal events into a completion state.
///
/// Only recognized terminal kinds participate: progress events under the
/// `WORKER_` prefix and unknown types are skipped. When a worker has reported
/// more than once, the greatest sequence key wins; writer clock skew can make
/// that ordering differ from true causality, which is accepted.
pub fn classify(events: &[SessionEvent]) -> Completion {
    let newest_terminal = events
        .iter()
        .filter(|event| event.kind().is_some_and(EventKind::is_terminal))
        .max_by(|a, b| a.sequence_key.cmp(&b.sequence_key));

    match newest_terminal.and_then(SessionEvent::kind) {
        Some(EventKind::WorkerSucceeded) => Completion::Succeeded,
        Some(EventKind::WorkerFailed) => Completion::Failed {
            detail: newest_terminal.and_then(|event| event.error_detail.clone()),
        },
        _ => Completion::Pending,
    }
}

/// Queries the journal for terminal events and classifies them
#[derive(Clone)]
pub struct CompletionDetector {
    event_store: ActorRef<EventStoreMsg>,
    query_limit: i64,
}

impl CompletionDetector {
    pub fn new(event_store: ActorRef<EventStoreMsg>, query_limit: i64) -> Self {
        Self {
            event_store,
            query_limit,
        }
    }

    /// Current completion state for one correlation id
    pub async fn check(&self, correlation_id: &str) -> Result<Completion, DetectError> {
        let events = ractor::call!(&self.event_store, |reply| EventStoreMsg::QueryRecent {
            correlation_id: correlation_id.to_string(),
            event_type_prefix: Some(TERMINAL_EVENT_PREFIX.to_string()),
            limit: self.query_limit,
            reply,
        })
        .map_err(|e| DetectError::Rpc(e.to_string()))??;

        Ok(classify(&events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::event_store::{
        append_event, AppendSessionEvent, EventStoreActor, EventStoreArguments,
    };
    use chrono::Utc;
    use ractor::Actor;

    fn event(sequence_key: &str, event_type: &str, detail: Option<&str>) -> SessionEvent {
        SessionEvent {
            correlation_id: "sess-1".to_string(),
            sequence_key: sequence_key.to_string(),
            event_type: event_type.to_string(),
            error_detail: detail.map(ToString::to_string),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_terminal_events_is_pending() {
        let events = vec![
            event("2026-01-01T00:00:01.000000Z", "SESSION_INITIATED", None),
            event("2026-01-01T00:00:02.000000Z", "INVOCATION_SUCCEEDED", None),
        ];
        assert_eq!(classify(&events), Completion::Pending);
        assert_eq!(classify(&[]), Completion::Pending);
    }

    #[test]
    fn test_single_terminal_event_decides() {
        let success = vec![event("2026-01-01T00:00:03.000000Z", "WORKER_SUCCEEDED", None)];
        assert_eq!(classify(&success), Completion::Succeeded);

        let failure = vec![event(
            "2026-01-01T00:00:03.000000Z",
            "WORKER_FAILED",
            Some("disk full"),
        )];
        assert_eq!(
            classify(&failure),
            Completion::Failed {
                detail: Some("disk full".to_string())
            }
        );
    }

    #[test]
    fn test_greatest_sequence_key_wins_regardless_of_slice_order() {
        // Failure carries the greater key but appears first in the slice.
        let events = vec![
            event("2026-01-01T00:00:01.000000Z", "WORKER_FAILED", Some("X")),
            event("2026-01-01T00:00:00.500000Z", "WORKER_SUCCEEDED", None),
        ];
        assert_eq!(
            classify(&events),
            Completion::Failed {
                detail: Some("X".to_string())
            }
        );

        let reversed: Vec<SessionEvent> = events.into_iter().rev().collect();
        assert_eq!(
            classify(&reversed),
            Completion::Failed {
                detail: Some("X".to_string())
            }
        );
    }

    #[test]
    fn test_progress_and_unknown_types_are_ignored() {
        let events = vec![
            event("2026-01-01T00:00:05.000000Z", "WORKER_HEARTBEAT", None),
            event("2026-01-01T00:00:04.000000Z", "WORKER_CHECKPOINT", None),
            event("2026-01-01T00:00:03.000000Z", "WORKER_SUCCEEDED", None),
        ];
        // The heartbeat has the greatest key but is not a terminal kind.
        assert_eq!(classify(&events), Completion::Succeeded);
    }

    #[test]
    fn test_failure_without_detail_classifies_clean() {
        let events = vec![event("2026-01-01T00:00:03.000000Z", "WORKER_FAILED", None)];
        assert_eq!(classify(&events), Completion::Failed { detail: None });
    }

    #[tokio::test]
    async fn test_check_reads_through_the_store() {
        let (store_ref, _handle) =
            Actor::spawn(None, EventStoreActor, EventStoreArguments::InMemory)
                .await
                .unwrap();

        let detector = CompletionDetector::new(store_ref.clone(), 20);
        assert_eq!(detector.check("sess-1").await.unwrap(), Completion::Pending);

        append_event(
            &store_ref,
            AppendSessionEvent::new(
                "sess-1",
                "2026-01-01T00:00:00.500000Z",
                EventKind::WorkerSucceeded,
            ),
        )
        .await
        .unwrap()
        .unwrap();

        append_event(
            &store_ref,
            AppendSessionEvent::new(
                "sess-1",
                "2026-01-01T00:00:01.000000Z",
                EventKind::WorkerFailed,
            )
            .with_detail("X"),
        )
        .await
        .unwrap()
        .unwrap();

        let first = detector.check("sess-1").await.unwrap();
        assert_eq!(
            first,
            Completion::Failed {
                detail: Some("X".to_string())
            }
        );

        // Re-checking with no new writes returns the same answer.
        let second = detector.check("sess-1").await.unwrap();
        assert_eq!(first, second);

        store_ref.stop(None);
    }
}
