//! SessionRunnerActor - one workflow run per actor
//!
//! Short-lived actor owning one session workflow: spawned (linked) by the
//! orchestrator, it drives the controller to a terminal outcome, reports the
//! outcome back, and stops itself. If it dies instead, the orchestrator's
//! supervision handler settles the session.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::actors::event_store::EventStoreMsg;
use crate::actors::orchestrator::OrchestratorMsg;
use crate::workflow::controller::{WorkflowController, WorkflowPolicy};
use crate::workflow::launcher::SharedAgentLauncher;

#[derive(Debug, Default)]
pub struct SessionRunnerActor;

/// Arguments for spawning SessionRunnerActor
pub struct SessionRunnerArguments {
    pub orchestrator: ActorRef<OrchestratorMsg>,
    pub event_store: ActorRef<EventStoreMsg>,
    pub launcher: SharedAgentLauncher,
    pub policy: WorkflowPolicy,
    pub correlation_id: String,
}

/// Messages handled by SessionRunnerActor
#[derive(Debug)]
pub enum SessionRunnerMsg {
    /// Drive the workflow to completion
    Run,
}

pub struct SessionRunnerState {
    orchestrator: ActorRef<OrchestratorMsg>,
    event_store: ActorRef<EventStoreMsg>,
    launcher: SharedAgentLauncher,
    policy: WorkflowPolicy,
    correlation_id: String,
}

#[async_trait]
impl Actor for SessionRunnerActor {
    type Msg = SessionRunnerMsg;
    type State = SessionRunnerState;
    type Arguments = SessionRunnerArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            correlation_id = %args.correlation_id,
            "SessionRunnerActor starting"
        );

        let state = SessionRunnerState {
            orchestrator: args.orchestrator,
            event_store: args.event_store,
            launcher: args.launcher,
            policy: args.policy,
            correlation_id: args.correlation_id,
        };

        // Kick off the run as soon as the mailbox opens.
        let _ = myself.send_message(SessionRunnerMsg::Run);

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionRunnerMsg::Run => {
                let controller = WorkflowController::new(
                    state.event_store.clone(),
                    state.launcher.clone(),
                    state.policy.clone(),
                )
                .with_progress(state.orchestrator.clone());

                let outcome = controller.run(&state.correlation_id).await;

                let _ = state
                    .orchestrator
                    .send_message(OrchestratorMsg::SessionFinished {
                        correlation_id: state.correlation_id.clone(),
                        outcome,
                    });

                myself.stop(None);
            }
        }
        Ok(())
    }
}
