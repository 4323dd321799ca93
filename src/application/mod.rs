//! Application layer: flow use cases over the repositories.
//!
//! - [`FlowService`] configures flows and runs them under load.
//! - [`FlowDocument`] loads a project, flow, endpoints and environment from a
//!   single JSON or TOML file.
//! - [`RequestLogWriter`] streams request logs of a running flow to the store.

pub mod flow_document;
pub mod flow_service;
pub mod log_writer;

pub use flow_document::{DocumentFormat, FlowDocument};
pub use flow_service::{FlowService, Repositories};
pub use log_writer::{LogFlusher, RequestLogWriter};
