//! Overseer - agent session orchestration with journal-observed outcomes
//!
//! Overseer runs long-lived remote agent sessions and determines each
//! session's outcome purely by polling an append-only event journal. There is
//! no callback channel: workers report by appending events, the workflow
//! polls until a terminal event appears or the time budget runs out, and
//! every session resolves to exactly one of succeeded, failed, or timed out.

pub mod actors;
pub mod api;
pub mod app_state;
pub mod config;
pub mod trigger;
pub mod workflow;
