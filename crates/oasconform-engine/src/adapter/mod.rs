//! Version adapter - Swagger 2.0 / OpenAPI 3.0 / OpenAPI 3.1 → canonical model
//!
//! Dialect differences (response `schema` + `produces` vs `content`,
//! `basePath` vs `servers`, `x-nullable` vs `nullable` vs type arrays, boolean
//! vs numeric exclusive bounds) are resolved here, once, so that nothing
//! downstream branches on the spec version.

mod schema;

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SpecError, pointer_escape};
use crate::model::{
    HeaderDef, MediaPattern, MediaTypeEntry, Method, Operation, PathItem, PathTemplate,
    ResponseDef, SpecDocument, SpecVersion, StatusSelector,
};
use schema::SchemaConverter;

/// Default media type for Swagger 2 responses when no `produces` is declared.
const SWAGGER_DEFAULT_PRODUCES: &str = "application/json";

/// Normalize a parsed (and dereferenced) spec document.
///
/// # Errors
///
/// Returns `SpecError` when the version is unsupported or the document
/// has a shape that cannot be normalized.
pub fn normalize(raw: &Value) -> Result<SpecDocument, SpecError> {
    let root = raw.as_object().ok_or(SpecError::NotAnObject)?;
    let version = detect_version(root)?;

    let components = component_schemas(root, version)?;
    let names: HashSet<String> = components.iter().map(|(name, _)| name.clone()).collect();
    let converter = SchemaConverter::new(version, names);

    let mut schemas = IndexMap::new();
    for (name, raw_schema) in components {
        let location = format!("{}{}", component_prefix(version), pointer_escape(&name));
        schemas.insert(name, converter.convert(raw_schema, &location)?);
    }

    let ctx = Context {
        version,
        converter: &converter,
        produces: media_list(root.get("produces")),
    };
    let paths = ctx.paths(root)?;
    let base_paths = base_paths(root, version);

    debug!(
        version = %version,
        paths = paths.len(),
        schemas = schemas.len(),
        base_paths = ?base_paths,
        "normalized spec"
    );

    Ok(SpecDocument {
        version,
        base_paths,
        paths,
        schemas,
    })
}

/// Detect the dialect from the `swagger` / `openapi` field.
///
/// # Errors
///
/// `UnsupportedVersion` for anything other than 2.x, 3.0.x or 3.1+.
pub fn detect_version(root: &Map<String, Value>) -> Result<SpecVersion, SpecError> {
    if let Some(v) = root.get("swagger") {
        let v = version_text(v);
        return if v == "2" || v.starts_with("2.") {
            Ok(SpecVersion::Swagger2)
        } else {
            Err(SpecError::UnsupportedVersion(v))
        };
    }
    if let Some(v) = root.get("openapi") {
        let v = version_text(v);
        return if v.starts_with("3.0") {
            Ok(SpecVersion::OpenApi30)
        } else if v.starts_with("3.") {
            Ok(SpecVersion::OpenApi31)
        } else {
            Err(SpecError::UnsupportedVersion(v))
        };
    }
    Err(SpecError::UnsupportedVersion(
        "missing `openapi` or `swagger` field".to_string(),
    ))
}

fn version_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        // unquoted YAML `swagger: 2.0`
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

const fn component_prefix(version: SpecVersion) -> &'static str {
    match version {
        SpecVersion::Swagger2 => "#/definitions/",
        SpecVersion::OpenApi30 | SpecVersion::OpenApi31 => "#/components/schemas/",
    }
}

fn component_schemas(
    root: &Map<String, Value>,
    version: SpecVersion,
) -> Result<Vec<(String, &Value)>, SpecError> {
    let table = match version {
        SpecVersion::Swagger2 => root.get("definitions"),
        SpecVersion::OpenApi30 | SpecVersion::OpenApi31 => root
            .get("components")
            .and_then(|c| c.get("schemas")),
    };
    match table {
        None => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
        Some(_) => Err(SpecError::InvalidShape {
            location: component_prefix(version).trim_end_matches('/').to_string(),
            what: "schema table",
            expected: "an object",
        }),
    }
}

/// Path prefixes every documented path is mounted under.
///
/// Swagger 2 uses `basePath`; OpenAPI 3 uses the path part of each
/// `servers[].url`, with `{variables}` replaced by their defaults.
fn base_paths(root: &Map<String, Value>, version: SpecVersion) -> Vec<String> {
    let mut bases: Vec<String> = Vec::new();
    match version {
        SpecVersion::Swagger2 => {
            if let Some(base) = root.get("basePath").and_then(Value::as_str) {
                bases.push(normalize_base(base));
            }
        }
        SpecVersion::OpenApi30 | SpecVersion::OpenApi31 => {
            let servers = root.get("servers").and_then(Value::as_array);
            for server in servers.into_iter().flatten() {
                let Some(url) = server.get("url").and_then(Value::as_str) else {
                    continue;
                };
                let url = substitute_variables(url, server.get("variables"));
                let base = normalize_base(url_path(&url));
                if !bases.contains(&base) {
                    bases.push(base);
                }
            }
        }
    }
    if bases.is_empty() {
        bases.push(String::new());
    }
    bases
}

fn substitute_variables(url: &str, variables: Option<&Value>) -> String {
    let mut url = url.to_string();
    if let Some(vars) = variables.and_then(Value::as_object) {
        for (name, var) in vars {
            if let Some(default) = var.get("default").and_then(Value::as_str) {
                url = url.replace(&format!("{{{name}}}"), default);
            }
        }
    }
    url
}

/// Path component of a server URL (absolute or relative).
fn url_path(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(idx) => {
            let after = &url[idx + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "",
            }
        }
        None => url,
    };
    rest.split(['?', '#']).next().unwrap_or_default()
}

/// `"/v1/"` → `"/v1"`, `"/"` and `""` → `""`.
fn normalize_base(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn media_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn expect_object<'v>(
    value: &'v Value,
    location: &str,
    what: &'static str,
) -> Result<&'v Map<String, Value>, SpecError> {
    value.as_object().ok_or_else(|| SpecError::InvalidShape {
        location: location.to_string(),
        what,
        expected: "an object",
    })
}

fn reject_reference(obj: &Map<String, Value>, location: &str) -> Result<(), SpecError> {
    match obj.get("$ref") {
        Some(reference) => Err(SpecError::UnresolvedReference {
            location: location.to_string(),
            reference: reference
                .as_str()
                .map_or_else(|| reference.to_string(), str::to_string),
        }),
        None => Ok(()),
    }
}

struct Context<'c> {
    version: SpecVersion,
    converter: &'c SchemaConverter,
    /// Document-level Swagger 2 `produces`
    produces: Vec<String>,
}

impl Context<'_> {
    fn paths(&self, root: &Map<String, Value>) -> Result<Vec<PathItem>, SpecError> {
        let Some(paths) = root.get("paths") else {
            return Ok(Vec::new());
        };
        let paths = expect_object(paths, "#/paths", "paths object")?;

        let mut items: Vec<PathItem> = Vec::with_capacity(paths.len());
        let mut shapes: IndexMap<String, String> = IndexMap::new();

        for (raw_template, raw_item) in paths {
            if raw_template.starts_with("x-") {
                continue;
            }
            let location = format!("#/paths/{}", pointer_escape(raw_template));
            let template =
                PathTemplate::parse(raw_template).map_err(|reason| SpecError::InvalidPathTemplate {
                    template: raw_template.clone(),
                    reason,
                })?;
            if let Some(first) = shapes.get(&template.shape()) {
                return Err(SpecError::DuplicateTemplate {
                    first: first.clone(),
                    second: raw_template.clone(),
                });
            }
            shapes.insert(template.shape(), raw_template.clone());

            let item = expect_object(raw_item, &location, "path item")?;
            reject_reference(item, &location)?;

            let mut operations = IndexMap::new();
            for (key, raw_op) in item {
                let Ok(method) = key.parse::<Method>() else {
                    continue;
                };
                let op_location = format!("{location}/{key}");
                let operation = self.operation(method, raw_template, raw_op, &op_location)?;
                operations.insert(method, operation);
            }
            items.push(PathItem {
                template,
                operations,
            });
        }
        Ok(items)
    }

    fn operation(
        &self,
        method: Method,
        path: &str,
        raw: &Value,
        location: &str,
    ) -> Result<Operation, SpecError> {
        let op = expect_object(raw, location, "operation")?;

        let produces = match op.get("produces") {
            Some(list) => media_list(Some(list)),
            None => self.produces.clone(),
        };

        let mut responses: Vec<ResponseDef> = Vec::new();
        if let Some(raw_responses) = op.get("responses") {
            let responses_location = format!("{location}/responses");
            let map = expect_object(raw_responses, &responses_location, "responses object")?;
            for (key, raw_response) in map {
                if key.starts_with("x-") {
                    continue;
                }
                let selector = StatusSelector::parse(key).ok_or_else(|| {
                    SpecError::InvalidStatusSelector {
                        location: responses_location.clone(),
                        selector: key.clone(),
                    }
                })?;
                if responses.iter().any(|r| r.selector == selector) {
                    return Err(SpecError::DuplicateStatusSelector {
                        location: responses_location.clone(),
                        selector: key.clone(),
                    });
                }
                let response_location = format!("{responses_location}/{}", pointer_escape(key));
                responses.push(self.response(selector, raw_response, &response_location, &produces)?);
            }
        }

        Ok(Operation {
            method,
            path: path.to_string(),
            responses,
        })
    }

    fn response(
        &self,
        selector: StatusSelector,
        raw: &Value,
        location: &str,
        produces: &[String],
    ) -> Result<ResponseDef, SpecError> {
        let obj = expect_object(raw, location, "response")?;
        reject_reference(obj, location)?;

        let content = match self.version {
            SpecVersion::Swagger2 => self.swagger_content(obj, location, produces)?,
            SpecVersion::OpenApi30 | SpecVersion::OpenApi31 => self.openapi_content(obj, location)?,
        };
        let headers = self.headers(obj, location)?;

        Ok(ResponseDef {
            selector,
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            content,
            headers,
        })
    }

    /// Swagger 2: one `schema` applies to every produced media type.
    fn swagger_content(
        &self,
        obj: &Map<String, Value>,
        location: &str,
        produces: &[String],
    ) -> Result<Vec<MediaTypeEntry>, SpecError> {
        let Some(raw_schema) = obj.get("schema") else {
            return Ok(Vec::new());
        };
        let schema = self
            .converter
            .convert(raw_schema, &format!("{location}/schema"))?;

        let declared: Vec<String> = if produces.is_empty() {
            vec![SWAGGER_DEFAULT_PRODUCES.to_string()]
        } else {
            produces.to_vec()
        };
        declared
            .into_iter()
            .map(|media_type| {
                let pattern = MediaPattern::parse(&media_type).ok_or_else(|| {
                    SpecError::InvalidMediaType {
                        location: location.to_string(),
                        media_type: media_type.clone(),
                    }
                })?;
                Ok(MediaTypeEntry {
                    pattern,
                    declared: media_type,
                    schema: Some(schema.clone()),
                })
            })
            .collect()
    }

    fn openapi_content(
        &self,
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<Vec<MediaTypeEntry>, SpecError> {
        let Some(raw_content) = obj.get("content") else {
            return Ok(Vec::new());
        };
        let content_location = format!("{location}/content");
        let map = expect_object(raw_content, &content_location, "content map")?;

        let mut entries = Vec::with_capacity(map.len());
        for (media_type, raw_entry) in map {
            let entry_location = format!("{content_location}/{}", pointer_escape(media_type));
            let pattern =
                MediaPattern::parse(media_type).ok_or_else(|| SpecError::InvalidMediaType {
                    location: content_location.clone(),
                    media_type: media_type.clone(),
                })?;
            let entry = expect_object(raw_entry, &entry_location, "media type object")?;
            let schema = entry
                .get("schema")
                .map(|s| self.converter.convert(s, &format!("{entry_location}/schema")))
                .transpose()?;
            entries.push(MediaTypeEntry {
                pattern,
                declared: media_type.clone(),
                schema,
            });
        }
        Ok(entries)
    }

    fn headers(&self, obj: &Map<String, Value>, location: &str) -> Result<Vec<HeaderDef>, SpecError> {
        let Some(raw_headers) = obj.get("headers") else {
            return Ok(Vec::new());
        };
        let headers_location = format!("{location}/headers");
        let map = expect_object(raw_headers, &headers_location, "headers map")?;

        let mut headers = Vec::with_capacity(map.len());
        for (name, raw_header) in map {
            // OpenAPI 3 ignores a Content-Type header definition
            if self.version != SpecVersion::Swagger2 && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            let header_location = format!("{headers_location}/{}", pointer_escape(name));
            let header = expect_object(raw_header, &header_location, "header")?;
            reject_reference(header, &header_location)?;

            let schema = match self.version {
                // Swagger 2 header objects are themselves schema-like
                SpecVersion::Swagger2 => Some(self.converter.convert(raw_header, &header_location)?),
                SpecVersion::OpenApi30 | SpecVersion::OpenApi31 => header
                    .get("schema")
                    .map(|s| self.converter.convert(s, &format!("{header_location}/schema")))
                    .transpose()?,
            };
            headers.push(HeaderDef {
                name: name.clone(),
                required: header.get("required").and_then(Value::as_bool).unwrap_or(false),
                schema,
            });
        }
        Ok(headers)
    }
}
