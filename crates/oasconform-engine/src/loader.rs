//! Spec loading: file → raw document → dereferenced document → `SpecDocument`

use std::path::Path;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::adapter::normalize;
use crate::error::LoadError;
use crate::model::SpecDocument;

/// Component schema tables. References into these stay in place and become
/// named schema nodes, which keeps recursive schemas finite.
const NAMED_SCHEMA_PREFIXES: [&str; 2] = ["#/components/schemas/", "#/definitions/"];

/// Read, parse, dereference and normalize a spec file.
///
/// # Errors
///
/// Returns `LoadError` if the file cannot be read or parsed, or the document
/// cannot be normalized.
pub fn load_spec(path: &Path) -> Result<SpecDocument, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = parse_document(path, &content)?;
    let doc = normalize(&dereference(&raw))?;
    debug!(path = %path.display(), "loaded spec");
    Ok(doc)
}

/// Parse a spec document as YAML or JSON.
///
/// The extension decides; without a known extension the content is sniffed.
///
/// # Errors
///
/// Returns `LoadError::Yaml` / `LoadError::Json` on syntax errors.
pub fn parse_document(path: &Path, content: &str) -> Result<Value, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "json" => Ok(serde_json::from_str(content)?),
        _ => {
            if content.trim_start().starts_with('{') {
                Ok(serde_json::from_str(content)?)
            } else {
                parse_yaml(content)
            }
        }
    }
}

fn parse_yaml(content: &str) -> Result<Value, LoadError> {
    serde_yml::from_str(content).map_err(|e| LoadError::Yaml(e.to_string()))
}

/// Inline every local `$ref` except references to named component schemas.
///
/// Cyclic and unresolvable references are left in place; the adapter reports
/// them with their location if they sit where a definition is required.
#[must_use]
pub fn dereference(root: &Value) -> Value {
    let mut stack = Vec::new();
    resolve(root, root, &mut stack)
}

fn resolve(node: &Value, root: &Value, stack: &mut Vec<String>) -> Value {
    match node {
        Value::Object(obj) => {
            if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                if let Some(resolved) = follow(reference, root, stack) {
                    return resolved;
                }
                return node.clone();
            }
            let resolved: Map<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), resolve(v, root, stack)))
                .collect();
            Value::Object(resolved)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, root, stack)).collect()),
        _ => node.clone(),
    }
}

fn follow(reference: &str, root: &Value, stack: &mut Vec<String>) -> Option<Value> {
    if is_named_schema(reference) {
        return None;
    }
    let Some(pointer) = reference.strip_prefix('#') else {
        warn!(reference = %reference, "external reference left unresolved");
        return None;
    };
    if stack.iter().any(|r| r == reference) {
        debug!(reference = %reference, "cyclic reference left in place");
        return None;
    }
    let pointer = percent_decode_str(pointer).decode_utf8_lossy();
    let Some(target) = root.pointer(&pointer) else {
        warn!(reference = %reference, "reference target not found");
        return None;
    };

    stack.push(reference.to_string());
    let resolved = resolve(target, root, stack);
    stack.pop();
    Some(resolved)
}

fn is_named_schema(reference: &str) -> bool {
    NAMED_SCHEMA_PREFIXES
        .iter()
        .filter_map(|prefix| reference.strip_prefix(prefix))
        .any(|name| !name.is_empty() && !name.contains('/'))
}
