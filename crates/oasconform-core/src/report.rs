//! JSON Schema export of the verdict format
//!
//! Downstream tooling consumes `oasconform check --output json`; this schema
//! is its contract.

use crate::verdict::Verdict;

/// Generate JSON Schema for the verdict format.
///
/// # Errors
///
/// Returns error if the generated schema cannot be serialized.
pub fn generate_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(Verdict);
    serde_json::to_string_pretty(&schema)
}
