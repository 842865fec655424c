pub mod engine;
pub mod states;

pub use engine::{check_retirement_eligibility, ApprovalFlow, FlowDefinition, FlowEngine, FlowTransitionError};
pub use states::{ActionName, TransitionContext, TransitionOutcome, WorkflowAction, WorkflowEffect};
