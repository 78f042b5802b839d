//! SchemaValidator - value × canonical schema → violations
//!
//! Pure function over an immutable schema tree. Violations are collected, not
//! short-circuited, so one run reports every mismatch it can locate.
//!
//! `oneOf`/`anyOf` diagnostics use a heuristic: when no branch matches, the
//! branch with the fewest violations (first on ties) is reported as the
//! closest match, together with a summary violation naming it. Nothing in
//! JSON Schema defines "closest"; it only keeps the output actionable.

mod format;

use std::cell::RefCell;

use indexmap::IndexMap;
use oasconform_core::Violation;
use serde_json::{Map, Value};

use self::format::Checkers;
use crate::error::{SchemaError, pointer_escape};
use crate::schema::{
    AdditionalProperties, ArrayConstraints, Bound, NumericConstraints, ObjectConstraints, Pattern,
    Schema, SchemaKind, StringConstraints, json_type,
};

/// Named-schema hops followed at one value location before the reference
/// chain is treated as a cycle. Descending into a property or item starts
/// the count again, so body nesting depth is not limited.
pub const MAX_DEPTH: usize = 256;

/// Relative tolerance for `multipleOf` on floating-point values.
const MULTIPLE_OF_TOLERANCE: f64 = 1e-9;

/// Validates values against canonical schemas of one document.
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator<'a> {
    /// Named schemas that `SchemaKind::Named` refers to
    definitions: &'a IndexMap<String, Schema>,
    validate_formats: bool,
}

impl<'a> SchemaValidator<'a> {
    #[must_use]
    pub const fn new(definitions: &'a IndexMap<String, Schema>) -> Self {
        Self {
            definitions,
            validate_formats: true,
        }
    }

    #[must_use]
    pub const fn with_formats(mut self, validate_formats: bool) -> Self {
        self.validate_formats = validate_formats;
        self
    }

    /// Validate `value`; locations are rooted at `root` (e.g. `body`).
    ///
    /// # Errors
    ///
    /// `SchemaError` when the schema itself cannot be evaluated (dangling
    /// reference, runaway recursion, uncompilable pattern).
    pub fn validate(
        &self,
        value: &Value,
        schema: &Schema,
        root: &str,
    ) -> Result<Vec<Violation>, SchemaError> {
        let pass = Pass {
            validator: self,
            checkers: RefCell::new(Checkers::default()),
        };
        let mut out = Vec::new();
        pass.check(value, schema, root, 0, &mut out)?;
        Ok(out)
    }
}

/// One `validate` call. Format and pattern checkers are built on first use
/// and reused for the rest of the call.
struct Pass<'v, 'a> {
    validator: &'v SchemaValidator<'a>,
    checkers: RefCell<Checkers>,
}

impl Pass<'_, '_> {
    fn evaluate(
        &self,
        value: &Value,
        schema: &Schema,
        location: &str,
        depth: usize,
    ) -> Result<Vec<Violation>, SchemaError> {
        let mut out = Vec::new();
        self.check(value, schema, location, depth, &mut out)?;
        Ok(out)
    }

    fn check(
        &self,
        value: &Value,
        schema: &Schema,
        location: &str,
        depth: usize,
        out: &mut Vec<Violation>,
    ) -> Result<(), SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::RecursionLimit {
                location: location.to_string(),
                limit: MAX_DEPTH,
            });
        }
        if value.is_null() && schema.nullable {
            return Ok(());
        }
        if let Some(allowed) = &schema.enumeration {
            if !allowed.iter().any(|a| values_equal(a, value)) {
                out.push(Violation::new(
                    location,
                    format!("one of {}", Value::Array(allowed.clone())),
                    value.clone(),
                    "value is not one of the allowed values",
                ));
            }
        }

        match &schema.kind {
            SchemaKind::Any => {}
            SchemaKind::Never => out.push(Violation::new(
                location,
                "nothing",
                value.clone(),
                "no value is allowed here",
            )),
            SchemaKind::Null => {
                if !value.is_null() {
                    out.push(type_violation(location, schema, value));
                }
            }
            SchemaKind::Boolean => {
                if !value.is_boolean() {
                    out.push(type_violation(location, schema, value));
                }
            }
            SchemaKind::Integer(c) => {
                if is_integer(value) {
                    self.check_number(value, c, location, out);
                } else {
                    out.push(type_violation(location, schema, value));
                }
            }
            SchemaKind::Number(c) => {
                if value.is_number() {
                    self.check_number(value, c, location, out);
                } else {
                    out.push(type_violation(location, schema, value));
                }
            }
            SchemaKind::String(c) => match value.as_str() {
                Some(s) => self.check_string(s, value, c, location, out)?,
                None => out.push(type_violation(location, schema, value)),
            },
            SchemaKind::Array(c) => match value.as_array() {
                Some(items) => self.check_array(items, value, c, location, out)?,
                None => out.push(type_violation(location, schema, value)),
            },
            SchemaKind::Object(c) => match value.as_object() {
                Some(obj) => self.check_object(obj, value, c, location, out)?,
                None => out.push(type_violation(location, schema, value)),
            },
            SchemaKind::AllOf(parts) => {
                for part in parts {
                    self.check(value, part, location, depth, out)?;
                }
            }
            SchemaKind::AnyOf(branches) => {
                let results = self.branch_results(value, branches, location, depth)?;
                if !results.iter().any(Vec::is_empty) {
                    report_closest("anyOf", "at least one", value, location, results, out);
                }
            }
            SchemaKind::OneOf(branches) => {
                let results = self.branch_results(value, branches, location, depth)?;
                let passing: Vec<usize> = results
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_empty())
                    .map(|(i, _)| i)
                    .collect();
                match passing.len() {
                    1 => {}
                    0 => report_closest("oneOf", "exactly one", value, location, results, out),
                    n => out.push(Violation::new(
                        location,
                        format!("exactly one of {} oneOf branches", branches.len()),
                        value.clone(),
                        format!(
                            "matches {n} oneOf branches ({}); exactly one is allowed",
                            join_indices(&passing)
                        ),
                    )),
                }
            }
            SchemaKind::Not(inner) => {
                if self.evaluate(value, inner, location, depth)?.is_empty() {
                    out.push(Violation::new(
                        location,
                        format!("not {}", inner.type_name()),
                        value.clone(),
                        "value matches a schema it must not match",
                    ));
                }
            }
            SchemaKind::Named(name) => {
                let target =
                    self.validator
                        .definitions
                        .get(name)
                        .ok_or_else(|| SchemaError::UnresolvedReference {
                            location: location.to_string(),
                            reference: name.clone(),
                        })?;
                self.check(value, target, location, depth + 1, out)?;
            }
            SchemaKind::Unresolved(reference) => {
                return Err(SchemaError::UnresolvedReference {
                    location: location.to_string(),
                    reference: reference.clone(),
                });
            }
        }
        Ok(())
    }

    fn branch_results(
        &self,
        value: &Value,
        branches: &[Schema],
        location: &str,
        depth: usize,
    ) -> Result<Vec<Vec<Violation>>, SchemaError> {
        branches
            .iter()
            .map(|b| self.evaluate(value, b, location, depth))
            .collect()
    }

    fn check_number(
        &self,
        value: &Value,
        c: &NumericConstraints,
        location: &str,
        out: &mut Vec<Violation>,
    ) {
        let Some(n) = value.as_f64() else {
            return;
        };
        if let Some(Bound { value: min, exclusive }) = c.minimum {
            if exclusive && n <= min {
                out.push(Violation::new(
                    location,
                    format!("exclusiveMinimum {}", number_text(min)),
                    value.clone(),
                    format!("must be greater than {}", number_text(min)),
                ));
            } else if !exclusive && n < min {
                out.push(Violation::new(
                    location,
                    format!("minimum {}", number_text(min)),
                    value.clone(),
                    format!("must be greater than or equal to {}", number_text(min)),
                ));
            }
        }
        if let Some(Bound { value: max, exclusive }) = c.maximum {
            if exclusive && n >= max {
                out.push(Violation::new(
                    location,
                    format!("exclusiveMaximum {}", number_text(max)),
                    value.clone(),
                    format!("must be less than {}", number_text(max)),
                ));
            } else if !exclusive && n > max {
                out.push(Violation::new(
                    location,
                    format!("maximum {}", number_text(max)),
                    value.clone(),
                    format!("must be less than or equal to {}", number_text(max)),
                ));
            }
        }
        if let Some(m) = c.multiple_of {
            let quotient = n / m;
            if (quotient - quotient.round()).abs() > MULTIPLE_OF_TOLERANCE * quotient.abs().max(1.0) {
                out.push(Violation::new(
                    location,
                    format!("multipleOf {}", number_text(m)),
                    value.clone(),
                    format!("must be a multiple of {}", number_text(m)),
                ));
            }
        }
        if self.validator.validate_formats {
            if let Some(fmt) = &c.format {
                if let Err(range) = format::number_in_range(fmt, value) {
                    out.push(Violation::new(
                        location,
                        format!("format {fmt}"),
                        value.clone(),
                        format!("does not fit in {range}"),
                    ));
                }
            }
        }
    }

    fn check_string(
        &self,
        s: &str,
        value: &Value,
        c: &StringConstraints,
        location: &str,
        out: &mut Vec<Violation>,
    ) -> Result<(), SchemaError> {
        let len = s.chars().count() as u64;
        if let Some(min) = c.min_length {
            if len < min {
                out.push(Violation::new(
                    location,
                    format!("minLength {min}"),
                    value.clone(),
                    format!("must be at least {min} characters long (got {len})"),
                ));
            }
        }
        if let Some(max) = c.max_length {
            if len > max {
                out.push(Violation::new(
                    location,
                    format!("maxLength {max}"),
                    value.clone(),
                    format!("must be at most {max} characters long (got {len})"),
                ));
            }
        }
        if let Some(pattern) = &c.pattern {
            let matched = match pattern {
                Pattern::Compiled(re) => re.is_match(s),
                Pattern::Deferred(source) => self
                    .checkers
                    .borrow_mut()
                    .deferred_pattern_matches(source, s)
                    .map_err(|reason| SchemaError::InvalidPattern {
                        location: location.to_string(),
                        pattern: source.clone(),
                        reason,
                    })?,
            };
            if !matched {
                out.push(Violation::new(
                    location,
                    format!("pattern {}", pattern.as_str()),
                    value.clone(),
                    format!("does not match pattern `{}`", pattern.as_str()),
                ));
            }
        }
        if self.validator.validate_formats {
            if let Some(fmt) = &c.format {
                if !self.checkers.borrow_mut().string_matches(fmt, s) {
                    out.push(Violation::new(
                        location,
                        format!("format {fmt}"),
                        value.clone(),
                        format!("is not a valid {fmt}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_array(
        &self,
        items: &[Value],
        value: &Value,
        c: &ArrayConstraints,
        location: &str,
        out: &mut Vec<Violation>,
    ) -> Result<(), SchemaError> {
        let len = items.len() as u64;
        if let Some(min) = c.min_items {
            if len < min {
                out.push(Violation::new(
                    location,
                    format!("minItems {min}"),
                    value.clone(),
                    format!("must have at least {min} items (got {len})"),
                ));
            }
        }
        if let Some(max) = c.max_items {
            if len > max {
                out.push(Violation::new(
                    location,
                    format!("maxItems {max}"),
                    value.clone(),
                    format!("must have at most {max} items (got {len})"),
                ));
            }
        }
        if c.unique_items {
            if let Some((i, j)) = first_duplicate(items) {
                out.push(Violation::new(
                    location,
                    "uniqueItems",
                    value.clone(),
                    format!("items must be unique (items {i} and {j} are equal)"),
                ));
            }
        }
        if let Some(item_schema) = &c.items {
            for (i, item) in items.iter().enumerate() {
                self.check(item, item_schema, &format!("{location}/{i}"), 0, out)?;
            }
        }
        Ok(())
    }

    fn check_object(
        &self,
        obj: &Map<String, Value>,
        value: &Value,
        c: &ObjectConstraints,
        location: &str,
        out: &mut Vec<Violation>,
    ) -> Result<(), SchemaError> {
        for name in &c.required {
            if obj.contains_key(name) {
                continue;
            }
            // write-only properties never appear in responses
            if c.properties.get(name).is_some_and(|p| p.write_only) {
                continue;
            }
            out.push(Violation::new(
                location,
                format!("required property {name}"),
                value.clone(),
                format!("missing required property: {name}"),
            ));
        }

        for (name, member) in obj {
            let member_location = format!("{location}/{}", pointer_escape(name));
            match (c.properties.get(name), &c.additional) {
                (Some(property), _) => {
                    self.check(member, property, &member_location, 0, out)?;
                }
                (None, AdditionalProperties::Allowed) => {}
                (None, AdditionalProperties::Forbidden) => out.push(Violation::new(
                    member_location,
                    "no additional properties",
                    member.clone(),
                    format!("unexpected property `{name}`"),
                )),
                (None, AdditionalProperties::Schema(extra)) => {
                    self.check(member, extra, &member_location, 0, out)?;
                }
            }
        }

        let count = obj.len() as u64;
        if let Some(min) = c.min_properties {
            if count < min {
                out.push(Violation::new(
                    location,
                    format!("minProperties {min}"),
                    value.clone(),
                    format!("must have at least {min} properties (got {count})"),
                ));
            }
        }
        if let Some(max) = c.max_properties {
            if count > max {
                out.push(Violation::new(
                    location,
                    format!("maxProperties {max}"),
                    value.clone(),
                    format!("must have at most {max} properties (got {count})"),
                ));
            }
        }
        Ok(())
    }
}

fn type_violation(location: &str, schema: &Schema, value: &Value) -> Violation {
    let expected = if schema.nullable {
        format!("{} or null", schema.type_name())
    } else {
        schema.type_name().to_string()
    };
    Violation::new(
        location,
        format!("type {expected}"),
        value.clone(),
        format!("expected {expected} but got {}", json_type(value)),
    )
}

/// Summary of a failed `oneOf`/`anyOf` followed by the closest branch's violations.
fn report_closest(
    keyword: &str,
    quantity: &str,
    value: &Value,
    location: &str,
    results: Vec<Vec<Violation>>,
    out: &mut Vec<Violation>,
) {
    let total = results.len();
    let Some((closest, violations)) = results
        .into_iter()
        .enumerate()
        .min_by_key(|(i, v)| (v.len(), *i))
    else {
        return;
    };
    out.push(Violation::new(
        location,
        format!("{quantity} of {total} {keyword} branches"),
        value.clone(),
        format!("matches none of the {total} {keyword} branches; closest is branch {closest}"),
    ));
    out.extend(violations);
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        _ => false,
    }
}

/// JSON equality with numbers compared by value (`1` equals `1.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

fn first_duplicate(items: &[Value]) -> Option<(usize, usize)> {
    for (i, a) in items.iter().enumerate() {
        for (j, b) in items.iter().enumerate().skip(i + 1) {
            if values_equal(a, b) {
                return Some((i, j));
            }
        }
    }
    None
}

fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
