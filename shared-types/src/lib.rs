//! Shared wire types for the Overseer session journal
//!
//! These types are used by both:
//! - The Overseer service (orchestrator, journal store, HTTP API)
//! - Remote workers reporting progress and terminal events
//!
//! The journal is append-only and multi-writer: the service and the workers
//! write through different paths and nobody calls anybody back. Everything a
//! writer needs lives here so both sides agree on event identity, ordering
//! keys, and the outcome taxonomy.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ============================================================================
// Event Kinds
// ============================================================================

/// Prefix shared by every terminal event type.
///
/// Completion detection only queries this prefix, so workers can append
/// progress types outside it without widening the polled set.
pub const TERMINAL_EVENT_PREFIX: &str = "WORKER_";

/// Event types produced and consumed by the core session workflow.
///
/// The journal stores event types as plain text: the set can grow, and
/// workers may append types outside this enumeration. The core parses what it
/// recognizes and ignores the rest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A session was accepted and registered
    SessionInitiated,
    /// The service is about to call the remote agent runtime
    InvocationStarted,
    /// The remote agent runtime acknowledged the launch
    InvocationSucceeded,
    /// The launch call failed; the worker may never have started
    InvocationFailed,
    /// The worker finished its task successfully
    WorkerSucceeded,
    /// The worker finished and reported failure
    WorkerFailed,
}

impl EventKind {
    /// True for the event types that settle a session's outcome.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::WorkerSucceeded | EventKind::WorkerFailed)
    }
}

// ============================================================================
// Journal Events
// ============================================================================

/// One immutable journal record.
///
/// Identity is `(correlation_id, sequence_key, event_type)`; appending the
/// same identity twice is acknowledged but changes nothing. `recorded_at` is
/// assigned by the store on arrival and is diagnostic only, ordering always
/// uses `sequence_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Session this event belongs to
    pub correlation_id: String,

    /// Writer-supplied ordering key, see [`format_sequence_key`]
    pub sequence_key: String,

    /// Event type name, e.g. "WORKER_SUCCEEDED"
    pub event_type: String,

    /// Failure description, set on failure events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Store-side arrival time (diagnostic, not used for ordering)
    pub recorded_at: DateTime<Utc>,
}

impl SessionEvent {
    /// Parse the event type against the core enumeration.
    ///
    /// `None` for types the core does not recognize, such as worker progress
    /// events or types added by newer writers.
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.parse().ok()
    }
}

/// Append request accepted from remote workers over HTTP.
///
/// `sequence_key` may be omitted, in which case the service stamps one from
/// its own clock on arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendEventRequest {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

// ============================================================================
// Sequence Keys
// ============================================================================

/// Format an instant as a sequence key: RFC 3339 UTC with fixed six-digit
/// fractional seconds, so lexicographic order equals chronological order.
///
/// All writers should produce keys through this format (or [`SequenceClock`])
/// so keys from different writers compare consistently.
pub fn format_sequence_key(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_nanosecond(instant.nanosecond() / 1_000 * 1_000)
        .unwrap_or(instant)
}

/// Per-writer sequence-key generator.
///
/// Keys are wall-clock derived but strictly increasing for one clock
/// instance: a reading that does not advance past the previous key (clock
/// stall or step backwards) is bumped one microsecond past it. Keys from
/// different writers are only as ordered as their wall clocks.
#[derive(Debug, Clone, Default)]
pub struct SequenceClock {
    last: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl SequenceClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next strictly-increasing sequence key for this writer.
    pub fn next(&self) -> String {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut now = truncate_to_micros(Utc::now());
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + chrono::Duration::microseconds(1);
            }
        }
        *last = Some(now);
        format_sequence_key(now)
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The initiation event could not be journaled; no work was attempted
    InitializationFailed,
    /// The launch call or its bracketing journal writes failed
    InvocationFailed,
    /// The worker ran and explicitly reported failure
    WorkerReportedFailure,
}

/// Terminal result of one session, exactly one per correlation id.
///
/// Timeouts are a distinct variant rather than a [`FailureKind`]: a timed-out
/// worker may still complete out of band, and callers need to treat that case
/// apart from a definite failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SessionOutcome {
    Succeeded,
    Failed {
        kind: FailureKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    TimedOut,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Succeeded)
    }

    /// Short lowercase label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Succeeded => "succeeded",
            SessionOutcome::Failed { .. } => "failed",
            SessionOutcome::TimedOut => "timed_out",
        }
    }
}

// ============================================================================
// Session Snapshots
// ============================================================================

/// Observable lifecycle phase of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Initiated,
    Invoking,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionPhase::Succeeded | SessionPhase::Failed | SessionPhase::TimedOut
        )
    }

    /// Terminal phase matching an outcome.
    pub fn from_outcome(outcome: &SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Succeeded => SessionPhase::Succeeded,
            SessionOutcome::Failed { .. } => SessionPhase::Failed,
            SessionOutcome::TimedOut => SessionPhase::TimedOut,
        }
    }
}

/// Registry view of one session, served by the orchestrator and the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub correlation_id: String,
    pub phase: SessionPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SessionOutcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            correlation_id: correlation_id.into(),
            phase: SessionPhase::Initiated,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Record a non-terminal phase change. Terminal phases only enter through
    /// [`SessionSnapshot::finish`], and a finished session never moves again.
    pub fn advance(&mut self, phase: SessionPhase) {
        if self.is_terminal() || phase.is_terminal() {
            return;
        }
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    /// Record the terminal outcome. The first outcome wins; later reports
    /// return false and change nothing, so a finished session can never flip
    /// its result.
    pub fn finish(&mut self, outcome: SessionOutcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.phase = SessionPhase::from_outcome(&outcome);
        self.outcome = Some(outcome);
        self.updated_at = Utc::now();
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
