//! oasconform-engine: OpenAPI response conformance
//!
//! Normalizes Swagger 2.0 / OpenAPI 3.x documents into one canonical model and
//! checks captured responses against it:
//!
//! ```text
//! raw spec → adapter → SpecDocument
//! (method, path) → matcher → operation → responses (status) → media (content-type) → validator (body)
//! ```
//!
//! ```no_run
//! use oasconform_core::ResponseSnapshot;
//! use oasconform_engine::{ConformanceEngine, load_spec};
//!
//! let spec = load_spec("openapi.yaml".as_ref())?;
//! let response = ResponseSnapshot::new(200)
//!     .with_header("Content-Type", "application/json")
//!     .with_body(serde_json::json!({"name": "a"}));
//! let verdict = ConformanceEngine::new(&spec).check("GET", "/items/1", &response);
//! assert!(verdict.passed(), "{}", verdict.message());
//! # Ok::<(), oasconform_engine::LoadError>(())
//! ```

pub mod adapter;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod media;
pub mod model;
pub mod responses;
pub mod schema;
pub mod validator;

pub use adapter::normalize;
pub use engine::{CheckOptions, ConformanceEngine};
pub use error::{LoadError, SchemaError, SpecError};
pub use loader::load_spec;
pub use matcher::{MatchError, ResolvedRequest, match_request};
pub use model::{Method, SpecDocument, SpecVersion};
pub use validator::SchemaValidator;
