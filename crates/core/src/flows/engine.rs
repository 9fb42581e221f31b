use thiserror::Error;
use tracing::debug;

use crate::flows::states::{LifecycleEvent, RequestState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleTransitionError {
    #[error("invalid request transition from {state:?} using event {event:?}")]
    InvalidTransition { state: RequestState, event: LifecycleEvent },
}

/// Tracks one request through `Init -> AgentsDispatched -> AgentsCompleted -> Merged -> Done`.
#[derive(Clone, Debug)]
pub struct RequestLifecycle {
    request_id: String,
    state: RequestState,
    history: Vec<TransitionOutcome>,
}

impl RequestLifecycle {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), state: RequestState::Init, history: Vec::new() }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn history(&self) -> &[TransitionOutcome] {
        &self.history
    }

    pub fn apply(&mut self, event: LifecycleEvent) -> Result<RequestState, LifecycleTransitionError> {
        let outcome = transition(self.state, event)?;
        debug!(
            event_name = "orchestration.lifecycle.transition",
            request_id = %self.request_id,
            from = ?outcome.from,
            to = ?outcome.to,
            trigger = ?outcome.event,
            "request lifecycle advanced"
        );
        self.state = outcome.to;
        self.history.push(outcome);
        Ok(self.state)
    }
}

pub fn transition(
    current: RequestState,
    event: LifecycleEvent,
) -> Result<TransitionOutcome, LifecycleTransitionError> {
    use LifecycleEvent::{
        AgentsDispatched, AgentsJoined, GatewayFailed, PrimaryEntityMissing, ResultReturned,
        ResultsMerged,
    };
    use RequestState as S;

    let to = match (current, event) {
        (S::Init, AgentsDispatched) => S::AgentsDispatched,
        (S::AgentsDispatched, AgentsJoined) => S::AgentsCompleted,
        (S::AgentsCompleted, ResultsMerged) => S::Merged,
        (S::Merged, ResultReturned) => S::Done,
        (S::Init, PrimaryEntityMissing) | (S::Init, GatewayFailed) => S::Failed,
        _ => return Err(LifecycleTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event })
}
