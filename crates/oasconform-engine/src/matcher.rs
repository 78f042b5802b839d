//! PathMatcher - concrete request (method, path) → documented operation

use indexmap::IndexMap;
use tracing::debug;

use crate::model::{Method, Operation, PathItem, SpecDocument};

/// A request matched to a documented operation. Lives for one check.
#[derive(Debug, Clone)]
pub struct ResolvedRequest<'a> {
    pub method: Method,
    pub path_item: &'a PathItem,
    pub operation: &'a Operation,
    /// URL-decoded path parameter values by placeholder name
    pub path_params: IndexMap<String, String>,
}

impl ResolvedRequest<'_> {
    #[must_use]
    pub fn template(&self) -> &str {
        self.path_item.template.as_str()
    }
}

/// Why a request could not be matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    NoPath {
        path: String,
        documented_paths: Vec<String>,
        /// Declared base paths the request path was tried under (omitted when only the root)
        servers: Vec<String>,
    },
    NoMethod {
        method: String,
        path_template: String,
        documented_methods: Vec<String>,
    },
}

/// Match `method` + `path` against the documented templates.
///
/// `path` may be a full URL and may carry a query string or fragment; both
/// are ignored, as is a single trailing slash. Base paths (declared ones plus
/// `extra_base_paths`) are tried longest first; the first base under which any
/// template matches decides. Among matching templates the fewest placeholders
/// win, then declaration order. The method plays no part in choosing.
///
/// # Errors
///
/// `NoPath` when no template matches under any base path, `NoMethod` when the
/// chosen template does not document the method.
pub fn match_request<'a>(
    spec: &'a SpecDocument,
    method: &str,
    path: &str,
    extra_base_paths: &[String],
) -> Result<ResolvedRequest<'a>, MatchError> {
    let path = normalize_request_path(path);
    let method_parsed = method.parse::<Method>().ok();
    let bases = candidate_bases(spec, extra_base_paths);

    for base in &bases {
        let Some(relative) = strip_base(&path, base) else {
            continue;
        };

        let mut matches: Vec<(usize, &PathItem, IndexMap<String, String>)> = spec
            .paths
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.template.match_path(relative).map(|p| (i, item, p)))
            .collect();
        if matches.is_empty() {
            continue;
        }

        matches.sort_by_key(|(i, item, _)| (item.template.placeholder_count(), *i));
        let (_, item, path_params) = matches.swap_remove(0);

        let Some((method, operation)) =
            method_parsed.and_then(|m| item.operations.get(&m).map(|op| (m, op)))
        else {
            debug!(method = %method, template = item.template.as_str(), "method not documented");
            return Err(MatchError::NoMethod {
                method: method.to_ascii_uppercase(),
                path_template: item.template.as_str().to_string(),
                documented_methods: item.methods(),
            });
        };

        debug!(
            method = %method,
            path = %path,
            base = %base,
            template = item.template.as_str(),
            "matched request"
        );
        return Ok(ResolvedRequest {
            method,
            path_item: item,
            operation,
            path_params,
        });
    }

    debug!(path = %path, "no template matches");
    Err(MatchError::NoPath {
        path,
        documented_paths: spec.templates(),
        servers: bases.into_iter().filter(|b| !b.is_empty()).collect(),
    })
}

/// Strip scheme/authority, query, fragment and one trailing slash.
fn normalize_request_path(raw: &str) -> String {
    let without_origin = match raw.find("://") {
        Some(idx) => {
            let after = &raw[idx + 3..];
            after.find('/').map_or("", |slash| &after[slash..])
        }
        None => raw,
    };
    let path = without_origin
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();

    let mut path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Documented and extra base paths, longest first, deduplicated.
fn candidate_bases(spec: &SpecDocument, extra: &[String]) -> Vec<String> {
    let mut bases: Vec<String> = Vec::new();
    for base in spec.base_paths.iter().chain(extra) {
        let base = base.trim_end_matches('/');
        let base = if base.is_empty() || base.starts_with('/') {
            base.to_string()
        } else {
            format!("/{base}")
        };
        if !bases.contains(&base) {
            bases.push(base);
        }
    }
    // stable sort keeps declaration order among equal lengths
    bases.sort_by_key(|b| std::cmp::Reverse(b.len()));
    bases
}

/// Remove a segment-aligned base prefix; `None` if `base` does not prefix `path`.
fn strip_base<'p>(path: &'p str, base: &str) -> Option<&'p str> {
    if base.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(base)?;
    match rest {
        "" => Some("/"),
        r if r.starts_with('/') => Some(r),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::normalize;
    use serde_json::json;

    fn spec(paths: serde_json::Value) -> SpecDocument {
        normalize(&json!({"openapi": "3.0.0", "info": {"title": "t", "version": "1"}, "paths": paths}))
            .unwrap()
    }

    fn get() -> serde_json::Value {
        json!({"get": {"responses": {"200": {"description": "ok"}}}})
    }

    #[test]
    fn extracts_path_params() {
        let doc = spec(json!({"/items/{id}": get()}));
        let req = match_request(&doc, "GET", "/items/42", &[]).unwrap();
        assert_eq!(req.template(), "/items/{id}");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path_params["id"], "42");
    }

    #[test]
    fn literal_beats_placeholder_regardless_of_order() {
        let doc = spec(json!({"/users/{id}": get(), "/users/me": get()}));
        let req = match_request(&doc, "get", "/users/me", &[]).unwrap();
        assert_eq!(req.template(), "/users/me");
        let req = match_request(&doc, "get", "/users/7", &[]).unwrap();
        assert_eq!(req.template(), "/users/{id}");
    }

    #[test]
    fn ties_break_by_declaration_order() {
        let doc = spec(json!({"/a/{x}/c": get(), "/a/b/{y}": get()}));
        let req = match_request(&doc, "GET", "/a/b/c", &[]).unwrap();
        assert_eq!(req.template(), "/a/{x}/c");
    }

    #[test]
    fn ignores_query_fragment_and_trailing_slash() {
        let doc = spec(json!({"/items": get()}));
        for path in ["/items?page=2", "/items/", "/items#top", "http://localhost:3000/items?x=1"] {
            let req = match_request(&doc, "GET", path, &[]).unwrap();
            assert_eq!(req.template(), "/items", "path {path}");
        }
    }

    #[test]
    fn no_path_lists_documented_templates() {
        let doc = spec(json!({"/items": get(), "/users": get()}));
        let err = match_request(&doc, "GET", "/foo", &[]).unwrap_err();
        assert_eq!(
            err,
            MatchError::NoPath {
                path: "/foo".into(),
                documented_paths: vec!["/items".into(), "/users".into()],
                servers: vec![],
            }
        );
    }

    #[test]
    fn no_method_is_distinct_from_no_path() {
        let doc = spec(json!({"/items": get()}));
        let err = match_request(&doc, "delete", "/items", &[]).unwrap_err();
        assert_eq!(
            err,
            MatchError::NoMethod {
                method: "DELETE".into(),
                path_template: "/items".into(),
                documented_methods: vec!["GET".into()],
            }
        );
    }

    #[test]
    fn most_specific_template_decides_before_method() {
        let doc = spec(json!({
            "/users/me": {"delete": {"responses": {"204": {"description": ""}}}},
            "/users/{id}": get()
        }));
        let err = match_request(&doc, "GET", "/users/me", &[]).unwrap_err();
        assert_eq!(
            err,
            MatchError::NoMethod {
                method: "GET".into(),
                path_template: "/users/me".into(),
                documented_methods: vec!["DELETE".into()],
            }
        );
        assert!(match_request(&doc, "DELETE", "/users/me", &[]).is_ok());
    }

    #[test]
    fn template_with_trailing_slash() {
        let doc = spec(json!({"/items/": get()}));
        for path in ["/items/", "/items", "/items/?page=1"] {
            let req = match_request(&doc, "GET", path, &[]).unwrap();
            assert_eq!(req.template(), "/items/", "path {path}");
        }
    }

    #[test]
    fn unknown_method_reports_no_method() {
        let doc = spec(json!({"/items": get()}));
        let err = match_request(&doc, "FETCH", "/items", &[]).unwrap_err();
        assert!(matches!(err, MatchError::NoMethod { ref method, .. } if method == "FETCH"));
    }

    #[test]
    fn server_base_path_is_stripped() {
        let mut raw = json!({"openapi": "3.0.0", "info": {"title": "t", "version": "1"},
            "paths": {"/items": get(), "/": get()}});
        raw["servers"] = json!([{"url": "https://api.example.com/v1"}]);
        let doc = normalize(&raw).unwrap();

        let req = match_request(&doc, "GET", "/v1/items", &[]).unwrap();
        assert_eq!(req.template(), "/items");
        let req = match_request(&doc, "GET", "/v1", &[]).unwrap();
        assert_eq!(req.template(), "/");

        let err = match_request(&doc, "GET", "/items", &[]).unwrap_err();
        assert!(matches!(err, MatchError::NoPath { ref servers, .. } if servers == &["/v1"]));
        // base must align on a segment boundary
        assert!(match_request(&doc, "GET", "/v1items", &[]).is_err());
    }

    #[test]
    fn extra_base_paths() {
        let doc = spec(json!({"/items": get()}));
        let extra = vec!["/api/".to_string()];
        let req = match_request(&doc, "GET", "/api/items", &extra).unwrap();
        assert_eq!(req.template(), "/items");
        // root stays a candidate
        assert!(match_request(&doc, "GET", "/items", &extra).is_ok());
    }

    #[test]
    fn mixed_segment_template() {
        let doc = spec(json!({"/files/{name}.{ext}": get()}));
        let req = match_request(&doc, "GET", "/files/report.pdf", &[]).unwrap();
        assert_eq!(req.path_params["ext"], "pdf");
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize_request_path(""), "/");
        assert_eq!(normalize_request_path("/"), "/");
        assert_eq!(normalize_request_path("items"), "/items");
        assert_eq!(normalize_request_path("https://h.example"), "/");
        assert_eq!(normalize_request_path("/a//"), "/a/");
    }
}
