use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Init,
    AgentsDispatched,
    AgentsCompleted,
    Merged,
    Done,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    AgentsDispatched,
    AgentsJoined,
    ResultsMerged,
    ResultReturned,
    PrimaryEntityMissing,
    GatewayFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestState,
    pub to: RequestState,
    pub event: LifecycleEvent,
}
