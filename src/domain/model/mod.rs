//! Flow, endpoint and run model types.

mod directives;
mod endpoint;
mod flow;
mod run;
mod run_config;
mod step;

pub use directives::Directives;
pub use endpoint::{Endpoint, Protocol};
pub use flow::{EnvironmentVariable, Flow, Project};
pub use run::{RequestLog, RunRecord, RunStatus};
pub use run_config::RunConfig;
pub use step::{FlowStep, FlowStepDto, StepKind};

pub type FlowId = i64;
pub type ProjectId = i64;
pub type EndpointId = i64;
pub type EnvironmentId = i64;
pub type RunId = i64;
