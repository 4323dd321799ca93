//! Error types for the flow engine.
//!
//! - [`FlowError`]: configuration, lookup and run-admission errors surfaced to callers.
//! - [`StepError`]: errors that abort a single virtual-user iteration.
//! - [`ErrorCode`]: stable public classification of a [`FlowError`].

pub mod error_context;
pub mod flow_error;
pub mod step_error;

pub use error_context::ErrorCode;
pub use flow_error::FlowError;
pub use step_error::StepError;

/// Convenience alias for flow-level results.
pub type FlowResult<T> = Result<T, FlowError>;
/// Convenience alias for step-level results.
pub type StepResult<T> = Result<T, StepError>;
