//! Flow graph construction and validation.
//!
//! A [`FlowDefinition`] is built from configured steps by [`build_definition`]
//! and walked by the [`StepDispatcher`](crate::core::dispatcher::StepDispatcher).
//! [`validate_steps`] runs once, when a flow is configured.

pub mod builder;
pub mod types;
pub mod validator;

pub use builder::*;
pub use types::*;
pub use validator::validate_steps;
