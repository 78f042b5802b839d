//! Error types: spec normalization, document loading, schema evaluation

use std::path::PathBuf;

/// The spec document cannot be normalized into the canonical model.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("spec document must be an object")]
    NotAnObject,

    #[error("unsupported spec version: {0}")]
    UnsupportedVersion(String),

    #[error("unresolved reference `{reference}` at {location}")]
    UnresolvedReference { location: String, reference: String },

    #[error("invalid path template `{template}`: {reason}")]
    InvalidPathTemplate { template: String, reason: String },

    #[error("path templates `{first}` and `{second}` are equivalent")]
    DuplicateTemplate { first: String, second: String },

    #[error("invalid response key `{selector}` at {location}")]
    InvalidStatusSelector { location: String, selector: String },

    #[error("response key `{selector}` is declared twice at {location}")]
    DuplicateStatusSelector { location: String, selector: String },

    #[error("invalid media type `{media_type}` at {location}")]
    InvalidMediaType { location: String, media_type: String },

    #[error("invalid schema at {location}: {reason}")]
    InvalidSchema { location: String, reason: String },

    #[error("invalid {what} at {location}: expected {expected}")]
    InvalidShape {
        location: String,
        what: &'static str,
        expected: &'static str,
    },
}

/// Reading and parsing a spec file failed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {shown}: {source}", shown = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// A schema node could not be evaluated. This is a defect in the spec,
/// never in the response under test.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unresolved reference `{reference}` reached at {location}")]
    UnresolvedReference { location: String, reference: String },

    #[error("schema nesting exceeds {limit} levels at {location} (self-referencing composition?)")]
    RecursionLimit { location: String, limit: usize },

    #[error("pattern `{pattern}` at {location} cannot be compiled: {reason}")]
    InvalidPattern {
        location: String,
        pattern: String,
        reason: String,
    },
}

/// Escape a key for use in a JSON pointer (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn pointer_escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
