//! Session workflow: invocation, completion detection, and the state machine
//! that ties them to the time budget.

pub mod controller;
pub mod detector;
pub mod invoker;
pub mod launcher;

pub use controller::{WorkflowController, WorkflowPolicy, DEFAULT_TERMINAL_QUERY_LIMIT};
pub use detector::{classify, Completion, CompletionDetector, DetectError};
pub use invoker::{InvocationError, InvocationHandle, Invoker};
pub use launcher::{AgentLauncher, HttpAgentLauncher, LaunchAck, LaunchError, SharedAgentLauncher};
