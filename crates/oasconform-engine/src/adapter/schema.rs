//! Raw schema objects (any dialect) → canonical `Schema`

use std::collections::HashSet;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::{SpecError, pointer_escape};
use crate::model::SpecVersion;
use crate::schema::{
    AdditionalProperties, ArrayConstraints, Bound, NumericConstraints, ObjectConstraints, Pattern,
    Schema, SchemaKind, StringConstraints,
};

const OBJECT_KEYWORDS: [&str; 4] = [
    "properties",
    "additionalProperties",
    "minProperties",
    "maxProperties",
];
const ARRAY_KEYWORDS: [&str; 4] = ["items", "minItems", "maxItems", "uniqueItems"];
const STRING_KEYWORDS: [&str; 3] = ["minLength", "maxLength", "pattern"];
const NUMBER_KEYWORDS: [&str; 5] = [
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

const COMPONENT_PREFIXES: [&str; 2] = ["#/components/schemas/", "#/definitions/"];

/// Converts schema objects of one dialect into the canonical tree.
pub(crate) struct SchemaConverter {
    version: SpecVersion,
    components: HashSet<String>,
}

impl SchemaConverter {
    pub(crate) fn new(version: SpecVersion, components: HashSet<String>) -> Self {
        Self {
            version,
            components,
        }
    }

    /// Convert the schema at `location` (a JSON pointer used in errors).
    pub(crate) fn convert(&self, raw: &Value, location: &str) -> Result<Schema, SpecError> {
        match raw {
            Value::Bool(true) => Ok(Schema::default()),
            Value::Bool(false) => Ok(Schema::new(SchemaKind::Never)),
            Value::Object(obj) => self.convert_object(obj, location),
            _ => Err(invalid(location, "expected an object or a boolean")),
        }
    }

    fn convert_object(&self, obj: &Map<String, Value>, location: &str) -> Result<Schema, SpecError> {
        if let Some(reference) = obj.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| invalid(location, "`$ref` must be a string"))?;
            let kind = match self.component_name(reference) {
                Some(name) => SchemaKind::Named(name),
                None => SchemaKind::Unresolved(reference.to_string()),
            };
            let mut schema = Schema::new(kind);
            schema.nullable = self.nullable_flag(obj);
            schema.read_only = flag(obj, "readOnly");
            schema.write_only = flag(obj, "writeOnly");
            return Ok(schema);
        }

        let (types, null_in_type) = declared_types(obj, location)?;
        let base = match types.as_slice() {
            [] if null_in_type => SchemaKind::Null,
            [] => self.infer_kind(obj, location)?,
            [single] => self.kind_for(single, obj, location)?,
            several => SchemaKind::AnyOf(
                several
                    .iter()
                    .map(|t| self.kind_for(t, obj, location).map(Schema::new))
                    .collect::<Result<_, _>>()?,
            ),
        };

        let all_of = self.branches(obj, "allOf", location)?;
        let one_of = self.branches(obj, "oneOf", location)?;
        let any_of = self.branches(obj, "anyOf", location)?;
        let not = obj
            .get("not")
            .map(|n| self.convert(n, &format!("{location}/not")))
            .transpose()?;

        let kind = if all_of.is_none() && one_of.is_none() && any_of.is_none() && not.is_none() {
            base
        } else {
            let mut parts = Vec::new();
            if !matches!(base, SchemaKind::Any) {
                parts.push(Schema::new(base));
            }
            let explicit_all_of = all_of.is_some();
            parts.extend(all_of.unwrap_or_default());
            if let Some(branches) = one_of {
                parts.push(Schema::new(SchemaKind::OneOf(branches)));
            }
            if let Some(branches) = any_of {
                parts.push(Schema::new(SchemaKind::AnyOf(branches)));
            }
            if let Some(inner) = not {
                parts.push(Schema::new(SchemaKind::Not(Box::new(inner))));
            }
            if parts.len() == 1 && !explicit_all_of {
                parts.remove(0).kind
            } else {
                SchemaKind::AllOf(parts)
            }
        };

        let mut schema = Schema::new(kind);
        schema.nullable = null_in_type || self.nullable_flag(obj);
        schema.enumeration = enumeration(obj, location)?;
        schema.read_only = flag(obj, "readOnly");
        schema.write_only = flag(obj, "writeOnly");
        Ok(schema)
    }

    /// `nullable` (3.x) / `x-nullable` (Swagger 2 vendor extension).
    fn nullable_flag(&self, obj: &Map<String, Value>) -> bool {
        match self.version {
            SpecVersion::Swagger2 => flag(obj, "x-nullable"),
            SpecVersion::OpenApi30 | SpecVersion::OpenApi31 => {
                flag(obj, "nullable") || flag(obj, "x-nullable")
            }
        }
    }

    fn component_name(&self, reference: &str) -> Option<String> {
        let raw = COMPONENT_PREFIXES
            .iter()
            .find_map(|prefix| reference.strip_prefix(prefix))?;
        if raw.contains('/') {
            return None;
        }
        let name = percent_decode_str(raw)
            .decode_utf8_lossy()
            .replace("~1", "/")
            .replace("~0", "~");
        self.components.contains(&name).then_some(name)
    }

    fn kind_for(
        &self,
        type_name: &str,
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<SchemaKind, SpecError> {
        Ok(match type_name {
            "object" => SchemaKind::Object(self.object_constraints(obj, location)?),
            "array" => SchemaKind::Array(self.array_constraints(obj, location)?),
            "string" => SchemaKind::String(string_constraints(obj, location)?),
            "integer" => SchemaKind::Integer(numeric_constraints(obj, location)?),
            "number" => SchemaKind::Number(numeric_constraints(obj, location)?),
            "boolean" => SchemaKind::Boolean,
            "null" => SchemaKind::Null,
            "file" if self.version == SpecVersion::Swagger2 => SchemaKind::Any,
            other => return Err(invalid(location, &format!("unknown type `{other}`"))),
        })
    }

    /// Kind implied by keywords when `type` is absent.
    fn infer_kind(&self, obj: &Map<String, Value>, location: &str) -> Result<SchemaKind, SpecError> {
        let has = |keys: &[&str]| keys.iter().any(|k| obj.contains_key(*k));
        // boolean `required` belongs to the parent object (Swagger-style), not to this node
        let required_list = obj.get("required").is_some_and(Value::is_array);

        if has(&OBJECT_KEYWORDS) || required_list {
            self.kind_for("object", obj, location)
        } else if has(&ARRAY_KEYWORDS) {
            self.kind_for("array", obj, location)
        } else if has(&STRING_KEYWORDS) {
            self.kind_for("string", obj, location)
        } else if has(&NUMBER_KEYWORDS) {
            self.kind_for("number", obj, location)
        } else {
            Ok(SchemaKind::Any)
        }
    }

    fn branches(
        &self,
        obj: &Map<String, Value>,
        keyword: &str,
        location: &str,
    ) -> Result<Option<Vec<Schema>>, SpecError> {
        let Some(raw) = obj.get(keyword) else {
            return Ok(None);
        };
        let items = raw
            .as_array()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| invalid(location, &format!("`{keyword}` must be a non-empty array")))?;
        items
            .iter()
            .enumerate()
            .map(|(i, b)| self.convert(b, &format!("{location}/{keyword}/{i}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn object_constraints(
        &self,
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<ObjectConstraints, SpecError> {
        let mut c = ObjectConstraints::default();

        if let Some(props) = obj.get("properties") {
            let props = props
                .as_object()
                .ok_or_else(|| invalid(location, "`properties` must be an object"))?;
            for (name, raw) in props {
                let loc = format!("{location}/properties/{}", pointer_escape(name));
                if raw.get("required").and_then(Value::as_bool) == Some(true) {
                    warn!(location = %loc, "boolean `required` on a property; treating `{name}` as required");
                    c.required.push(name.clone());
                }
                c.properties.insert(name.clone(), self.convert(raw, &loc)?);
            }
        }

        match obj.get("required") {
            None | Some(Value::Bool(_)) => {}
            Some(Value::Array(names)) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| invalid(location, "`required` must list property names"))?;
                    if !c.required.iter().any(|r| r == name) {
                        c.required.push(name.to_string());
                    }
                }
            }
            Some(_) => return Err(invalid(location, "`required` must be an array")),
        }

        c.additional = match obj.get("additionalProperties") {
            None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
            Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
            Some(raw @ Value::Object(_)) => AdditionalProperties::Schema(Box::new(
                self.convert(raw, &format!("{location}/additionalProperties"))?,
            )),
            Some(_) => {
                return Err(invalid(
                    location,
                    "`additionalProperties` must be a boolean or a schema",
                ));
            }
        };
        c.min_properties = count(obj, "minProperties", location)?;
        c.max_properties = count(obj, "maxProperties", location)?;
        Ok(c)
    }

    fn array_constraints(
        &self,
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<ArrayConstraints, SpecError> {
        let items = match obj.get("items") {
            None => None,
            Some(Value::Array(_)) => {
                warn!(location = %location, "tuple-style `items` is not supported; items are not validated");
                None
            }
            Some(raw) => Some(Box::new(self.convert(raw, &format!("{location}/items"))?)),
        };
        Ok(ArrayConstraints {
            items,
            min_items: count(obj, "minItems", location)?,
            max_items: count(obj, "maxItems", location)?,
            unique_items: flag(obj, "uniqueItems"),
        })
    }
}

/// Declared `type`: non-null type names, and whether `null` was among them.
fn declared_types(obj: &Map<String, Value>, location: &str) -> Result<(Vec<String>, bool), SpecError> {
    let mut types = Vec::new();
    let mut null = false;
    let names: Vec<&Value> = match obj.get("type") {
        None => return Ok((types, null)),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };
    for name in names {
        let name = name
            .as_str()
            .ok_or_else(|| invalid(location, "`type` must be a string or an array of strings"))?;
        if name == "null" {
            null = true;
        } else if !types.iter().any(|t| t == name) {
            types.push(name.to_string());
        }
    }
    Ok((types, null))
}

fn string_constraints(obj: &Map<String, Value>, location: &str) -> Result<StringConstraints, SpecError> {
    let pattern = match obj.get("pattern") {
        None => None,
        Some(Value::String(source)) => Some(compile_pattern(source, location)?),
        Some(_) => return Err(invalid(location, "`pattern` must be a string")),
    };
    Ok(StringConstraints {
        min_length: count(obj, "minLength", location)?,
        max_length: count(obj, "maxLength", location)?,
        pattern,
        format: text(obj, "format"),
    })
}

/// Compile with `regex`; fall back to ECMA-262 checking for syntax it lacks.
fn compile_pattern(source: &str, location: &str) -> Result<Pattern, SpecError> {
    match Regex::new(source) {
        Ok(re) => Ok(Pattern::Compiled(re)),
        Err(err) => {
            if jsonschema::validator_for(&json!({ "pattern": source })).is_ok() {
                debug!(location = %location, pattern = %source, "pattern deferred to ECMA-262 matcher");
                Ok(Pattern::Deferred(source.to_string()))
            } else {
                Err(invalid(
                    location,
                    &format!("pattern `{source}` is not a valid regular expression: {err}"),
                ))
            }
        }
    }
}

fn numeric_constraints(obj: &Map<String, Value>, location: &str) -> Result<NumericConstraints, SpecError> {
    let minimum = bound(obj, "minimum", "exclusiveMinimum", location, |a, b| a > b)?;
    let maximum = bound(obj, "maximum", "exclusiveMaximum", location, |a, b| a < b)?;
    let multiple_of = number(obj, "multipleOf", location)?;
    if multiple_of.is_some_and(|m| m <= 0.0) {
        return Err(invalid(location, "`multipleOf` must be greater than 0"));
    }
    Ok(NumericConstraints {
        minimum,
        maximum,
        multiple_of,
        format: text(obj, "format"),
    })
}

/// Combine `minimum` with `exclusiveMinimum` (boolean in 2/3.0, number in 3.1).
///
/// When both are numbers the stricter one wins; `stricter(a, b)` says whether
/// inclusive `a` is stricter than exclusive `b`.
fn bound(
    obj: &Map<String, Value>,
    inclusive_key: &str,
    exclusive_key: &str,
    location: &str,
    stricter: impl Fn(f64, f64) -> bool,
) -> Result<Option<Bound>, SpecError> {
    let inclusive = number(obj, inclusive_key, location)?;
    Ok(match obj.get(exclusive_key) {
        None => inclusive.map(|value| Bound {
            value,
            exclusive: false,
        }),
        Some(Value::Bool(exclusive)) => inclusive.map(|value| Bound {
            value,
            exclusive: *exclusive,
        }),
        Some(Value::Number(n)) => {
            let exclusive = n.as_f64().unwrap_or_default();
            match inclusive {
                Some(value) if stricter(value, exclusive) => Some(Bound {
                    value,
                    exclusive: false,
                }),
                _ => Some(Bound {
                    value: exclusive,
                    exclusive: true,
                }),
            }
        }
        Some(_) => {
            return Err(invalid(
                location,
                &format!("`{exclusive_key}` must be a boolean or a number"),
            ));
        }
    })
}

fn enumeration(obj: &Map<String, Value>, location: &str) -> Result<Option<Vec<Value>>, SpecError> {
    if let Some(value) = obj.get("const") {
        return Ok(Some(vec![value.clone()]));
    }
    match obj.get("enum") {
        None => Ok(None),
        Some(Value::Array(values)) => Ok(Some(values.clone())),
        Some(_) => Err(invalid(location, "`enum` must be an array")),
    }
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn number(obj: &Map<String, Value>, key: &str, location: &str) -> Result<Option<f64>, SpecError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(location, &format!("`{key}` must be a number"))),
    }
}

fn count(obj: &Map<String, Value>, key: &str, location: &str) -> Result<Option<u64>, SpecError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| {
                v.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .map(Some)
            .ok_or_else(|| invalid(location, &format!("`{key}` must be a non-negative integer"))),
    }
}

fn invalid(location: &str, reason: &str) -> SpecError {
    SpecError::InvalidSchema {
        location: location.to_string(),
        reason: reason.to_string(),
    }
}
