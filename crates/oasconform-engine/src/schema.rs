//! Canonical schema tree
//!
//! Every dialect (Swagger 2, OpenAPI 3.0, OpenAPI 3.1) is normalized into this
//! one representation by the adapter, so the validator reasons about a single
//! dialect. Nodes are immutable once built.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

/// A schema node: a kind plus the flags every kind may carry.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub kind: SchemaKind,
    /// `null` is accepted in addition to the kind
    pub nullable: bool,
    /// Allowed values (`enum`, or `const` as a single value)
    pub enumeration: Option<Vec<Value>>,
    pub read_only: bool,
    pub write_only: bool,
}

#[derive(Debug, Clone, Default)]
pub enum SchemaKind {
    /// No constraint (`{}` or boolean `true`)
    #[default]
    Any,
    /// Nothing is accepted (boolean `false`)
    Never,
    Null,
    Boolean,
    Integer(NumericConstraints),
    Number(NumericConstraints),
    String(StringConstraints),
    Array(ArrayConstraints),
    Object(ObjectConstraints),
    AllOf(Vec<Schema>),
    AnyOf(Vec<Schema>),
    OneOf(Vec<Schema>),
    Not(Box<Schema>),
    /// Reference to a named component schema (`components/schemas`, `definitions`)
    Named(String),
    /// Reference left dangling by the loader; reaching it aborts validation
    Unresolved(String),
}

/// Inclusive or exclusive numeric bound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NumericConstraints {
    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub multiple_of: Option<f64>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StringConstraints {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Pattern>,
    pub format: Option<String>,
}

/// A `pattern` keyword.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Compiled with the `regex` crate
    Compiled(Regex),
    /// ECMA-262 syntax `regex` cannot compile (lookaround, backreferences);
    /// checked through `jsonschema` at validation time
    Deferred(String),
}

impl Pattern {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Compiled(re) => re.as_str(),
            Self::Deferred(source) => source,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArrayConstraints {
    pub items: Option<Box<Schema>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectConstraints {
    pub properties: IndexMap<String, Schema>,
    pub required: Vec<String>,
    pub additional: AdditionalProperties,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
}

/// `additionalProperties`: permissive unless explicitly `false` or a schema.
#[derive(Debug, Clone, Default)]
pub enum AdditionalProperties {
    #[default]
    Allowed,
    Forbidden,
    Schema(Box<Schema>),
}

impl Schema {
    #[must_use]
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// True for `{}`: any value, including no body at all, is acceptable.
    #[must_use]
    pub fn accepts_anything(&self) -> bool {
        matches!(self.kind, SchemaKind::Any) && self.enumeration.is_none()
    }

    /// Short name of the kind, as used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            SchemaKind::Any => "any",
            SchemaKind::Never => "nothing",
            SchemaKind::Null => "null",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Integer(_) => "integer",
            SchemaKind::Number(_) => "number",
            SchemaKind::String(_) => "string",
            SchemaKind::Array(_) => "array",
            SchemaKind::Object(_) => "object",
            SchemaKind::AllOf(_) => "allOf",
            SchemaKind::AnyOf(_) => "anyOf",
            SchemaKind::OneOf(_) => "oneOf",
            SchemaKind::Not(_) => "not",
            SchemaKind::Named(_) => "reference",
            SchemaKind::Unresolved(_) => "unresolved reference",
        }
    }
}

/// JSON type name of a value, as used in diagnostics.
#[must_use]
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(Schema::default().accepts_anything());
        let mut s = Schema::default();
        s.enumeration = Some(vec![json!(1)]);
        assert!(!s.accepts_anything());
        assert!(!Schema::new(SchemaKind::Boolean).accepts_anything());
    }

    #[test]
    fn json_type_names() {
        assert_eq!(json_type(&json!(1)), "integer");
        assert_eq!(json_type(&json!(1.5)), "number");
        assert_eq!(json_type(&json!(null)), "null");
        assert_eq!(json_type(&json!({})), "object");
    }

    #[test]
    fn pattern_source_is_kept() {
        let p = Pattern::Compiled(Regex::new("^a+$").unwrap());
        assert_eq!(p.as_str(), "^a+$");
        assert_eq!(Pattern::Deferred("(?=a)".into()).as_str(), "(?=a)");
    }
}
