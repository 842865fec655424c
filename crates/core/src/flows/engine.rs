use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::request::{Request, RequestCategory, RequestKind, RequestStatus};
use crate::errors::DomainError;
use crate::flows::states::{
    ActionName, TransitionContext, TransitionOutcome, WorkflowAction, WorkflowEffect,
};

pub trait FlowDefinition {
    fn initial_state(&self) -> RequestStatus;
    fn transition(
        &self,
        current: &RequestStatus,
        action: &WorkflowAction,
        context: &TransitionContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// The single approval lifecycle shared by every request kind:
/// `pending -> approved | rejected`, both terminal.
#[derive(Clone, Debug, Default)]
pub struct ApprovalFlow;

impl FlowDefinition for ApprovalFlow {
    fn initial_state(&self) -> RequestStatus {
        RequestStatus::Pending
    }

    fn transition(
        &self,
        current: &RequestStatus,
        action: &WorkflowAction,
        context: &TransitionContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_approval(current, action, context)
    }
}

#[derive(Clone, Debug)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> RequestStatus {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &RequestStatus,
        action: &WorkflowAction,
        context: &TransitionContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, action, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: &RequestStatus,
        action: &WorkflowAction,
        context: &TransitionContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, action, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "workflow.transition_applied",
                        AuditCategory::Workflow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("category", context.category.as_str())
                    .with_metadata("from", outcome.from.as_str())
                    .with_metadata("to", outcome.to.as_str())
                    .with_metadata("action", outcome.action.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "workflow.transition_rejected",
                        AuditCategory::Workflow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("category", context.category.as_str())
                    .with_metadata("action", action.name().to_string())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<ApprovalFlow> {
    fn default() -> Self {
        Self::new(ApprovalFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using action {action}")]
    InvalidTransition { state: RequestStatus, action: ActionName },
    #[error("missing required input `{field}` in state {state:?}")]
    MissingInput { state: RequestStatus, field: &'static str },
}

fn transition_approval(
    current: &RequestStatus,
    action: &WorkflowAction,
    context: &TransitionContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use RequestStatus::{Approved, Pending, Rejected};
    use WorkflowEffect::{CreatePurchaseOrder, LinkVendor, RecordRejectionReason};

    let (to, effects) = match (current, action) {
        (Pending, WorkflowAction::Approve { vendor }) => match context.category {
            RequestCategory::MaterialRequest => {
                let vendor = non_blank(vendor.as_deref())
                    .ok_or(FlowTransitionError::MissingInput { state: Pending, field: "vendor" })?;
                (
                    Approved,
                    vec![LinkVendor { vendor: vendor.clone() }, CreatePurchaseOrder { vendor }],
                )
            }
            RequestCategory::Advance | RequestCategory::Retirement | RequestCategory::Leave => {
                (Approved, Vec::new())
            }
        },
        (Pending, WorkflowAction::Reject { reason }) => {
            let reason = non_blank(Some(reason))
                .ok_or(FlowTransitionError::MissingInput { state: Pending, field: "reason" })?;
            (Rejected, vec![RecordRejectionReason { reason }])
        }
        (Approved | Rejected, _) => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                action: action.name(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, action: action.name(), effects })
}

/// Cross-entity guard for filing a retirement: the advance must be approved
/// and not yet retired. The advance's own status is left untouched.
pub fn check_retirement_eligibility(advance: &Request) -> Result<(), DomainError> {
    let refuse = |reason: &str| DomainError::RetirementNotAllowed {
        advance_id: advance.id.0.clone(),
        reason: reason.to_string(),
    };

    let RequestKind::Advance { has_retirement, .. } = &advance.kind else {
        return Err(refuse("only advances can be retired"));
    };
    if advance.status != RequestStatus::Approved {
        return Err(refuse(&format!("advance is {}", advance.status.as_str())));
    }
    if *has_retirement {
        return Err(refuse("a retirement has already been filed"));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
