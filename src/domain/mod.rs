//! Domain layer: pure data shared across the engine.
//!
//! Nothing in here performs I/O. Submodules:
//! - [`model`]: flows, steps, endpoints, run configuration and run records.

pub mod model;
