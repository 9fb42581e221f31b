pub mod engine;
pub mod states;

pub use engine::{LifecycleTransitionError, RequestLifecycle};
pub use states::{LifecycleEvent, RequestState, TransitionOutcome};
