//! Flow-level error types.

use thiserror::Error;

use super::ErrorCode;
use crate::domain::model::{EndpointId, FlowId, ProjectId};

/// Flow-level errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    FlowNotFound(FlowId),
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),
    #[error("Flow {0} has no configured steps")]
    FlowNotConfigured(FlowId),
    #[error("Endpoint {endpoint_id} referenced by step {step_id} not found")]
    EndpointNotFound {
        step_id: String,
        endpoint_id: EndpointId,
    },
    #[error("Flow must contain exactly one START step (found {0})")]
    StartCardinality(usize),
    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),
    #[error("Invalid step {step_id}: {reason}")]
    InvalidStep { step_id: String, reason: String },
    #[error("No terminal endpoint found, flow would never finish")]
    NoTerminalStep,
    #[error("Infinite cycle detected: step {step_id} cannot reach a terminal endpoint")]
    NonTerminating { step_id: String },
    #[error("Invalid run configuration: {0}")]
    InvalidRunConfig(String),
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("System is busy, please try again later")]
    SystemBusy,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FlowError {
    pub fn invalid_step(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        FlowError::InvalidStep {
            step_id: step_id.into(),
            reason: reason.into(),
        }
    }

    /// Public classification of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            FlowError::FlowNotFound(_) => ErrorCode::FlowNotFound,
            FlowError::ProjectNotFound(_) => ErrorCode::ProjectNotFound,
            FlowError::EndpointNotFound { .. } => ErrorCode::EndpointNotFound,
            FlowError::FlowNotConfigured(_)
            | FlowError::StartCardinality(_)
            | FlowError::DuplicateStepId(_)
            | FlowError::InvalidStep { .. }
            | FlowError::NoTerminalStep
            | FlowError::NonTerminating { .. } => ErrorCode::FlowConfigurationError,
            FlowError::InvalidRunConfig(_) | FlowError::ConfigError(_) => ErrorCode::BadRequest,
            FlowError::UnsupportedProtocol(_) => ErrorCode::ExecutorUnsupportedType,
            FlowError::SystemBusy => ErrorCode::SystemBusy,
            FlowError::StoreError(_) | FlowError::InternalError(_) => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_error_display() {
        assert_eq!(
            FlowError::StartCardinality(0).to_string(),
            "Flow must contain exactly one START step (found 0)"
        );
        assert_eq!(
            FlowError::invalid_step("s1", "missing condition").to_string(),
            "Invalid step s1: missing condition"
        );
        assert_eq!(
            FlowError::SystemBusy.to_string(),
            "System is busy, please try again later"
        );
        assert!(FlowError::NonTerminating {
            step_id: "loop".into()
        }
        .to_string()
        .contains("loop"));
    }

    #[test]
    fn test_flow_error_codes() {
        assert_eq!(FlowError::ProjectNotFound(7).code().code(), 40000);
        assert_eq!(FlowError::SystemBusy.code().code(), 50000);
        assert_eq!(
            FlowError::NoTerminalStep.code(),
            ErrorCode::FlowConfigurationError
        );
        assert_eq!(
            FlowError::InternalError("boom".into()).code().message(),
            "Internal error"
        );
    }
}
