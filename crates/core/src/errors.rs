use thiserror::Error;

use crate::{domain::request::RequestStatus, flows::FlowTransitionError, store::StoreError};

/// Coarse error class shared by every layer; drives HTTP status codes and CLI
/// exit classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    NotFound,
    Remote,
    Internal,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed for `{field}`: {message}")]
    Validation { field: String, message: String },
    #[error("cannot {action} a request in state {from:?}")]
    InvalidTransition { from: RequestStatus, action: String },
    #[error("advance `{advance_id}` cannot be retired: {reason}")]
    RetirementNotAllowed { advance_id: String, reason: String },
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::InvalidTransition { .. } | Self::RetirementNotAllowed { .. } => {
                ErrorKind::InvalidTransition
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvariantViolation(_) => ErrorKind::Internal,
        }
    }
}

impl From<FlowTransitionError> for DomainError {
    fn from(value: FlowTransitionError) -> Self {
        match value {
            FlowTransitionError::InvalidTransition { state, action } => {
                Self::InvalidTransition { from: state, action: action.to_string() }
            }
            FlowTransitionError::MissingInput { field, .. } => {
                Self::Validation { field: field.to_string(), message: format!("{field} is required") }
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("remote call failed: {0}")]
    Remote(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(error) => error.kind(),
            Self::Remote(_) => ErrorKind::Remote,
            Self::Configuration(_) => ErrorKind::Internal,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Remote(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Conflict { .. } => "The record is no longer in a state that allows this action.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry the action."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value.kind() {
            ErrorKind::Validation => Self::BadRequest { message: value.to_string(), correlation_id },
            ErrorKind::NotFound => Self::NotFound { message: value.to_string(), correlation_id },
            ErrorKind::InvalidTransition => {
                Self::Conflict { message: value.to_string(), correlation_id }
            }
            ErrorKind::Remote => {
                Self::ServiceUnavailable { message: value.to_string(), correlation_id }
            }
            ErrorKind::Internal => Self::Internal { message: value.to_string(), correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::request::RequestStatus;
    use crate::errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
    use crate::flows::FlowTransitionError;
    use crate::flows::states::ActionName;
    use crate::store::StoreError;

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::validation("vendor", "vendor is required"))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn invalid_transition_maps_to_conflict() {
        let interface = ApplicationError::from(DomainError::InvalidTransition {
            from: RequestStatus::Rejected,
            action: "reject".to_string(),
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn store_failure_maps_to_service_unavailable() {
        let error = ApplicationError::from(StoreError::Unavailable("database is locked".to_owned()));
        assert_eq!(error.kind(), ErrorKind::Remote);

        let interface = error.into_interface("req-3");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert!(interface.message().contains("database is locked"));
    }

    #[test]
    fn flow_errors_keep_their_class() {
        let missing = DomainError::from(FlowTransitionError::MissingInput {
            state: RequestStatus::Pending,
            field: "reason",
        });
        assert_eq!(missing.kind(), ErrorKind::Validation);

        let invalid = DomainError::from(FlowTransitionError::InvalidTransition {
            state: RequestStatus::Approved,
            action: ActionName::Approve,
        });
        assert_eq!(invalid.kind(), ErrorKind::InvalidTransition);
        assert_eq!(invalid.to_string(), "cannot approve a request in state Approved");
    }

    #[test]
    fn retirement_refusal_is_an_invalid_transition() {
        let error = DomainError::RetirementNotAllowed {
            advance_id: "ADV-1".to_string(),
            reason: "a retirement already exists".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::InvalidTransition);
        assert_eq!(ApplicationError::from(error).kind(), ErrorKind::InvalidTransition);
    }
}
