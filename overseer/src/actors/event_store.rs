//! EventStoreActor - Append-only session journal using ractor
//!
//! This actor owns the durable event journal backing completion detection.
//! It supports both file-based and in-memory databases (libsql).
//!
//! # Architecture
//!
//! - Append-only: rows are never updated or deleted
//! - Multi-writer: the workflow and remote workers write interleaved
//! - Idempotent: event identity is `(correlation_id, sequence_key, event_type)`
//!   and re-appending an existing identity is acknowledged as a no-op
//! - Ordering uses the writer-supplied `sequence_key`, never arrival order
//!
//! # Example
//!
//! ```rust,ignore
//! use ractor::{Actor, call};
//!
//! let (store_ref, _handle) = Actor::spawn(
//!     None,
//!     EventStoreActor,
//!     EventStoreArguments::File("/path/to/session_events.db".to_string()),
//! ).await?;
//!
//! let ack = call!(store_ref, |reply| EventStoreMsg::Append {
//!     event: AppendSessionEvent::new("sess-1", clock.next(), EventKind::SessionInitiated),
//!     reply,
//! })?;
//! ```

use async_trait::async_trait;
use libsql::Connection;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{EventKind, SessionEvent};

/// Rows returned when listing a whole session journal.
const SESSION_LIST_LIMIT: i64 = 1000;

/// Actor that manages the append-only session journal
#[derive(Debug, Default)]
pub struct EventStoreActor;

/// Arguments for spawning EventStoreActor
#[derive(Debug, Clone)]
pub enum EventStoreArguments {
    /// File-based database path
    File(String),
    /// In-memory database (for testing)
    InMemory,
}

/// State for EventStoreActor
pub struct EventStoreState {
    conn: Connection,
}

// ============================================================================
// Messages
// ============================================================================

/// Messages handled by EventStoreActor
#[derive(Debug)]
pub enum EventStoreMsg {
    /// Append one event; duplicate identities are acknowledged, not re-written
    Append {
        event: AppendSessionEvent,
        reply: RpcReplyPort<Result<AppendAck, StoreError>>,
    },
    /// Most recent events for a session, greatest sequence key first,
    /// optionally restricted to an event-type prefix
    QueryRecent {
        correlation_id: String,
        event_type_prefix: Option<String>,
        limit: i64,
        reply: RpcReplyPort<Result<Vec<SessionEvent>, StoreError>>,
    },
    /// Full journal for a session, oldest first
    ListSession {
        correlation_id: String,
        reply: RpcReplyPort<Result<Vec<SessionEvent>, StoreError>>,
    },
}

impl EventStoreActor {
    async fn new_with_path(database_path: &str) -> Result<Connection, libsql::Error> {
        // Ensure parent directory exists for file-based databases
        if database_path != ":memory:" {
            if let Some(parent) = std::path::Path::new(database_path).parent() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let db = libsql::Builder::new_local(database_path).build().await?;
        let conn = db.connect()?;

        // Run migrations manually (libsql doesn't have built-in migration runner)
        Self::run_migrations(&conn).await?;

        Ok(conn)
    }

    async fn run_migrations(conn: &Connection) -> Result<(), libsql::Error> {
        // The primary key doubles as the idempotency guard for re-deliveries.
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS session_events (
                correlation_id TEXT NOT NULL,
                sequence_key TEXT NOT NULL,
                event_type TEXT NOT NULL,
                error_detail TEXT,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (correlation_id, sequence_key, event_type)
            )
            "#,
            (),
        )
        .await?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_events_type ON session_events(correlation_id, event_type)",
            (),
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Actor for EventStoreActor {
    type Msg = EventStoreMsg;
    type State = EventStoreState;
    type Arguments = EventStoreArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            "EventStoreActor starting"
        );

        let conn = match args {
            EventStoreArguments::File(path) => {
                tracing::info!(database_path = %path, "Opening file-based journal");
                Self::new_with_path(&path).await.map_err(|e| {
                    ActorProcessingErr::from(format!("Failed to open database: {e}"))
                })?
            }
            EventStoreArguments::InMemory => {
                tracing::info!("Opening in-memory journal");
                Self::new_with_path(":memory:").await.map_err(|e| {
                    ActorProcessingErr::from(format!("Failed to open in-memory database: {e}"))
                })?
            }
        };

        Ok(EventStoreState { conn })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            "EventStoreActor started successfully"
        );
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            EventStoreMsg::Append { event, reply } => {
                let result = self.handle_append(event, state).await;
                let _ = reply.send(result);
            }
            EventStoreMsg::QueryRecent {
                correlation_id,
                event_type_prefix,
                limit,
                reply,
            } => {
                let result = self
                    .handle_query_recent(correlation_id, event_type_prefix, limit, state)
                    .await;
                let _ = reply.send(result);
            }
            EventStoreMsg::ListSession {
                correlation_id,
                reply,
            } => {
                let result = self.handle_list_session(correlation_id, state).await;
                let _ = reply.send(result);
            }
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
            "EventStoreActor stopped"
        );
        Ok(())
    }
}

// ============================================================================
// Data Types
// ============================================================================

/// Event to append to the journal
#[derive(Debug, Clone)]
pub struct AppendSessionEvent {
    pub correlation_id: String,
    pub sequence_key: String,
    pub event_type: String,
    pub error_detail: Option<String>,
}

impl AppendSessionEvent {
    /// Create an append request for a core event kind
    pub fn new(
        correlation_id: impl Into<String>,
        sequence_key: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            sequence_key: sequence_key.into(),
            event_type: kind.as_ref().to_string(),
            error_detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }
}

/// Acknowledgement for an append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendAck {
    /// True when the event identity already existed and nothing was written
    pub deduplicated: bool,
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur in EventStoreActor
#[derive(Debug, thiserror::Error, Clone)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid timestamp format: {0}")]
    InvalidTimestamp(String),
}

impl From<libsql::Error> for StoreError {
    fn from(e: libsql::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl EventStoreActor {
    async fn handle_append(
        &self,
        msg: AppendSessionEvent,
        state: &mut EventStoreState,
    ) -> Result<AppendAck, StoreError> {
        let conn = &state.conn;

        // INSERT OR IGNORE keeps duplicate deliveries harmless: zero affected
        // rows means the identity was already journaled.
        let affected = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO session_events
                    (correlation_id, sequence_key, event_type, error_detail)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                libsql::params![
                    msg.correlation_id,
                    msg.sequence_key,
                    msg.event_type,
                    msg.error_detail
                ],
            )
            .await?;

        Ok(AppendAck {
            deduplicated: affected == 0,
        })
    }

    async fn handle_query_recent(
        &self,
        correlation_id: String,
        event_type_prefix: Option<String>,
        limit: i64,
        state: &mut EventStoreState,
    ) -> Result<Vec<SessionEvent>, StoreError> {
        let conn = &state.conn;
        let safe_limit = limit.clamp(1, 1000);

        let mut rows = conn
            .query(
                r#"
                SELECT correlation_id, sequence_key, event_type, error_detail, recorded_at
                FROM session_events
                WHERE correlation_id = ?1
                  AND (?2 IS NULL OR event_type LIKE (?2 || '%'))
                ORDER BY sequence_key DESC
                LIMIT ?3
                "#,
                libsql::params![correlation_id, event_type_prefix, safe_limit],
            )
            .await?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(event_from_row(&row)?);
        }

        Ok(events)
    }

    async fn handle_list_session(
        &self,
        correlation_id: String,
        state: &mut EventStoreState,
    ) -> Result<Vec<SessionEvent>, StoreError> {
        let conn = &state.conn;

        let mut rows = conn
            .query(
                r#"
                SELECT correlation_id, sequence_key, event_type, error_detail, recorded_at
                FROM session_events
                WHERE correlation_id = ?1
                ORDER BY sequence_key ASC
                LIMIT ?2
                "#,
                libsql::params![correlation_id, SESSION_LIST_LIMIT],
            )
            .await?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(event_from_row(&row)?);
        }

        Ok(events)
    }
}

fn event_from_row(row: &libsql::Row) -> Result<SessionEvent, StoreError> {
    let error_detail = match row.get_value(3)? {
        libsql::Value::Text(text) => Some(text),
        _ => None,
    };

    // Parse SQLite datetime format: "2026-01-31 02:24:30"
    let recorded_str: String = row.get(4)?;
    let naive_dt = chrono::NaiveDateTime::parse_from_str(&recorded_str, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| StoreError::InvalidTimestamp(e.to_string()))?;

    Ok(SessionEvent {
        correlation_id: row.get(0)?,
        sequence_key: row.get(1)?,
        event_type: row.get(2)?,
        error_detail,
        recorded_at: chrono::DateTime::from_naive_utc_and_offset(naive_dt, chrono::Utc),
    })
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to append an event
pub async fn append_event(
    store: &ActorRef<EventStoreMsg>,
    event: AppendSessionEvent,
) -> Result<Result<AppendAck, StoreError>, ractor::RactorErr<EventStoreMsg>> {
    ractor::call!(store, |reply| EventStoreMsg::Append { event, reply })
}

/// Convenience function to query recent events for a session
pub async fn query_recent(
    store: &ActorRef<EventStoreMsg>,
    correlation_id: impl Into<String>,
    event_type_prefix: Option<String>,
    limit: i64,
) -> Result<Result<Vec<SessionEvent>, StoreError>, ractor::RactorErr<EventStoreMsg>> {
    ractor::call!(store, |reply| EventStoreMsg::QueryRecent {
        correlation_id: correlation_id.into(),
        event_type_prefix,
        limit,
        reply,
    })
}

/// Convenience function to list a session's full journal
pub async fn list_session(
    store: &ActorRef<EventStoreMsg>,
    correlation_id: impl Into<String>,
) -> Result<Result<Vec<SessionEvent>, StoreError>, ractor::RactorErr<EventStoreMsg>> {
    ractor::call!(store, |reply| EventStoreMsg::ListSession {
        correlation_id: correlation_id.into(),
        reply,
    })
}

// ============================================================================
// Tests
// ============================================================================
