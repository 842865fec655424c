use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::request::{RequestCategory, RequestStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    Approve,
    Reject,
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => f.write_str("approve"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowAction {
    Approve { vendor: Option<String> },
    Reject { reason: String },
}

impl WorkflowAction {
    pub fn name(&self) -> ActionName {
        match self {
            Self::Approve { .. } => ActionName::Approve,
            Self::Reject { .. } => ActionName::Reject,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContext {
    pub category: RequestCategory,
}

impl TransitionContext {
    pub fn new(category: RequestCategory) -> Self {
        Self { category }
    }
}

/// Side effects the caller must carry out after a transition is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowEffect {
    LinkVendor { vendor: String },
    CreatePurchaseOrder { vendor: String },
    RecordRejectionReason { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub action: ActionName,
    pub effects: Vec<WorkflowEffect>,
}
