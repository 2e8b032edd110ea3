//! Actor implementations for the Overseer runtime

pub mod event_store;
pub mod orchestrator;
pub mod session_runner;

pub use event_store::{
    append_event, list_session, query_recent, AppendAck, AppendSessionEvent, EventStoreActor,
    EventStoreArguments, EventStoreMsg, StoreError,
};
pub use orchestrator::{
    OrchestratorArguments, OrchestratorError, OrchestratorHealth, OrchestratorMsg, SessionHandle,
    SessionOrchestratorActor, SupervisionEventCounts,
};
pub use session_runner::{SessionRunnerActor, SessionRunnerArguments, SessionRunnerMsg};
