//! `format` assertions

use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::{Value, json};

/// Formats that only annotate and never constrain a response value.
const ANNOTATIONS: [&str; 3] = ["byte", "binary", "password"];

/// `jsonschema` validators built on first use, keyed by format or pattern.
///
/// Lives for one validation pass; nothing is stored on schema nodes.
#[derive(Default)]
pub(crate) struct Checkers {
    /// `None` when `jsonschema` rejects the format schema (unknown formats pass)
    formats: HashMap<String, Option<Validator>>,
    patterns: HashMap<String, Result<Validator, String>>,
}

impl Checkers {
    /// Check a string against a `format`. Unknown formats pass.
    ///
    /// Checkers come from `jsonschema` (date-time, date, email, uri, uuid, ipv4, ...),
    /// so they match what JSON Schema tooling accepts.
    pub(crate) fn string_matches(&mut self, format: &str, value: &str) -> bool {
        if ANNOTATIONS.contains(&format) {
            return true;
        }
        let checker = self.formats.entry(format.to_string()).or_insert_with(|| {
            let schema = json!({ "type": "string", "format": format });
            jsonschema::options()
                .should_validate_formats(true)
                .build(&schema)
                .ok()
        });
        checker
            .as_ref()
            .is_none_or(|v| v.is_valid(&Value::String(value.to_string())))
    }

    /// Match a pattern `regex` cannot compile, using ECMA-262 semantics.
    pub(crate) fn deferred_pattern_matches(
        &mut self,
        pattern: &str,
        value: &str,
    ) -> Result<bool, String> {
        let checker = self.patterns.entry(pattern.to_string()).or_insert_with(|| {
            let schema = json!({ "type": "string", "pattern": pattern });
            jsonschema::validator_for(&schema).map_err(|e| e.to_string())
        });
        match checker {
            Ok(v) => Ok(v.is_valid(&Value::String(value.to_string()))),
            Err(reason) => Err(reason.clone()),
        }
    }

    #[cfg(test)]
    fn built(&self) -> usize {
        self.formats.len() + self.patterns.len()
    }
}

/// Range check for numeric formats. Returns the violated range on failure.
pub(crate) fn number_in_range(format: &str, value: &Value) -> Result<(), &'static str> {
    let Some(n) = value.as_f64() else {
        return Ok(());
    };
    match format {
        "int32" => {
            if n < f64::from(i32::MIN) || n > f64::from(i32::MAX) {
                return Err("a 32-bit signed integer");
            }
        }
        "int64" => {
            // u64 above i64::MAX does not fit
            if value.is_u64() && !value.is_i64() {
                return Err("a 64-bit signed integer");
            }
        }
        "float" => {
            if n.is_finite() && n.abs() > f64::from(f32::MAX) {
                return Err("a 32-bit float");
            }
        }
        _ => {}
    }
    Ok(())
}
