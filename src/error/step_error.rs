use thiserror::Error;

use crate::domain::model::EndpointId;

/// Errors that abort the current iteration of a virtual user
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Unknown step type '{kind}' at step {step_id}")]
    UnknownStepKind { step_id: String, kind: String },
    #[error("Step not found: {0}")]
    StepNotFound(String),
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(EndpointId),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}
