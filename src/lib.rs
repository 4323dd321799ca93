//! # FlowPilot: a load-testing flow engine
//!
//! `flowpilot` runs user-defined flows of HTTP, gRPC and GraphQL calls under
//! concurrent load. A flow is a directed graph of steps:
//!
//! - **START**: the single entry point.
//! - **ENDPOINT**: calls an endpoint template with `{{variable}}` substitution,
//!   then follows `nextIfTrue` on success or `nextIfFalse` on failure.
//! - **BRANCH**: evaluates a sandboxed boolean expression against the
//!   virtual user's variables.
//!
//! Steps can carry pre/post processors that `sleep`, `inject` variables or
//! `extract` values from the previous response.
//!
//! A run starts `threads` virtual users spaced over the ramp-up window. Each
//! repeats the flow with its own variables and cookies until the deadline.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use flowpilot::{
//!     ExecutorSet, FlowDocument, FlowService, HttpClientProvider, HttpPoolConfig, MemoryStore,
//!     Repositories, RunConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flowpilot::FlowError> {
//!     let doc = FlowDocument::load("checkout.toml".as_ref())?;
//!     let store = Arc::new(MemoryStore::new());
//!     doc.install(&store).await?;
//!
//!     let provider = HttpClientProvider::new(HttpPoolConfig::default())?;
//!     let service = FlowService::new(
//!         Repositories::memory(store),
//!         Arc::new(ExecutorSet::new(&provider)),
//!         4,
//!     );
//!     service.configure_flow(doc.flow.id, doc.steps.clone()).await?;
//!     let summary = service.run_flow(doc.flow.id, RunConfig::new(10, 60, 10)?).await?;
//!     println!("{} requests, {} failed", summary.requests, summary.failed);
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod core;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod graph;
pub mod processor;
pub mod scheduler;
pub mod store;
pub mod template;

pub use application::{DocumentFormat, FlowDocument, FlowService, Repositories, RequestLogWriter};
pub use crate::core::{
    CallCollector, CallRecord, HttpClientProvider, HttpPoolConfig, PilotConfig, RunRecorder,
    RunSummary, StopSignal, VariableEnvironment,
};
pub use domain::model::{
    Directives, Endpoint, FlowStep, FlowStepDto, Protocol, RunConfig, StepKind,
};
pub use error::{ErrorCode, FlowError, FlowResult, StepError, StepResult};
pub use executor::{EndpointExecutor, ExecutionResult, ExecutorSet};
pub use graph::{build_definition, validate_steps, FlowDefinition};
pub use scheduler::{LoadScheduler, RunPlan};
pub use store::MemoryStore;
