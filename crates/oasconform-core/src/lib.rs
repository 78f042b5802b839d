//! oasconform-core: Result vocabulary for OpenAPI response conformance
//!
//! This crate provides the captured-response snapshot handed to the engine,
//! the violation and verdict types it produces, and the project configuration.

pub mod config;
pub mod report;
pub mod snapshot;
pub mod verdict;

pub use config::{Config, ConfigError};
pub use snapshot::ResponseSnapshot;
pub use verdict::{Category, Finding, Verdict, VerdictStatus, Violation};
