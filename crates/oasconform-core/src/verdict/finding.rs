//! What a forward conformance check found, before negation is applied

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Violation;

/// Outcome of checking one response against the spec.
///
/// Resolution failures (no path, method, status or media type) are kept apart
/// from body violations so a failing test can tell "wrong endpoint documented"
/// from "wrong body shape".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The response satisfies the resolved contract
    Conforms {
        /// What was satisfied, e.g. "the '200' response defined for GET /items/{id}"
        subject: String,
    },
    /// No documented path template matches the request path
    NoMatchingPath {
        path: String,
        documented_paths: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        servers: Vec<String>,
    },
    /// A path template matches but none documents the method
    NoMatchingMethod {
        method: String,
        path_template: String,
        documented_methods: Vec<String>,
    },
    /// Status code has no exact, range or `default` response
    UndocumentedStatus {
        status: u16,
        endpoint: String,
        documented: Vec<String>,
    },
    /// Content-Type matches none of the documented media types
    UnsupportedMediaType {
        content_type: String,
        subject: String,
        documented: Vec<String>,
    },
    /// No Content-Type header, but documented content and a non-empty body
    MissingContentType {
        subject: String,
        documented: Vec<String>,
    },
    /// Named schema lookup failed
    UnknownSchema {
        name: String,
        documented: Vec<String>,
    },
    /// Body or headers violate the resolved contract
    Violations {
        subject: String,
        violations: Vec<Violation>,
    },
    /// The spec itself is defective (unresolved reference, invalid schema node)
    SpecMalformed { reason: String },
}

/// Coarse classification of a finding - maps directly to exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Contract satisfied (exit 0)
    Conforms,
    /// Body or header violations (exit 1)
    Violations,
    /// Request could not be matched to a documented contract (exit 2)
    Resolution,
    /// The spec is broken, not the implementation (exit 3)
    SpecMalformed,
}

impl Category {
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Conforms => 0,
            Self::Violations => 1,
            Self::Resolution => 2,
            Self::SpecMalformed => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conforms => "conforms",
            Self::Violations => "violations",
            Self::Resolution => "resolution",
            Self::SpecMalformed => "spec_malformed",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Finding {
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Conforms { .. } => Category::Conforms,
            Self::Violations { .. } => Category::Violations,
            Self::SpecMalformed { .. } => Category::SpecMalformed,
            Self::NoMatchingPath { .. }
            | Self::NoMatchingMethod { .. }
            | Self::UndocumentedStatus { .. }
            | Self::UnsupportedMediaType { .. }
            | Self::MissingContentType { .. }
            | Self::UnknownSchema { .. } => Category::Resolution,
        }
    }

    #[must_use]
    pub const fn conforms(&self) -> bool {
        matches!(self, Self::Conforms { .. })
    }

    /// Violations carried by the finding (empty unless `Violations`).
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Violations { violations, .. } => violations,
            _ => &[],
        }
    }

    /// The contract the finding is about, when one was resolved.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::Conforms { subject }
            | Self::Violations { subject, .. }
            | Self::UnsupportedMediaType { subject, .. }
            | Self::MissingContentType { subject, .. } => Some(subject),
            _ => None,
        }
    }

    /// One-line description of a resolution or spec failure.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Conforms { subject } => format!("response satisfies {subject}"),
            Self::NoMatchingPath {
                path,
                documented_paths,
                servers,
            } => {
                let mut msg = format!(
                    "no path in the spec matches `{path}` (documented paths: {})",
                    join_or_none(documented_paths)
                );
                if !servers.is_empty() {
                    msg.push_str(&format!(" (servers: {})", servers.join(", ")));
                }
                msg
            }
            Self::NoMatchingMethod {
                method,
                path_template,
                documented_methods,
            } => format!(
                "path `{path_template}` is documented, but not for method {method} (documented methods: {})",
                join_or_none(documented_methods)
            ),
            Self::UndocumentedStatus {
                status,
                endpoint,
                documented,
            } => format!(
                "no response documented for status {status} on {endpoint} (documented responses: {})",
                join_or_none(documented)
            ),
            Self::UnsupportedMediaType {
                content_type,
                subject,
                documented,
            } => format!(
                "content type `{content_type}` is not documented for {subject} (documented media types: {})",
                join_or_none(documented)
            ),
            Self::MissingContentType {
                subject,
                documented,
            } => format!(
                "response has a body but no content-type header, while {subject} documents content ({})",
                join_or_none(documented)
            ),
            Self::UnknownSchema { name, documented } => format!(
                "no schema named `{name}` in the spec (documented schemas: {})",
                join_or_none(documented)
            ),
            Self::Violations { subject, violations } => format!(
                "response does not satisfy {subject} ({} violation{})",
                violations.len(),
                if violations.len() == 1 { "" } else { "s" }
            ),
            Self::SpecMalformed { reason } => format!("the spec is malformed: {reason}"),
        }
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn categories_map_to_exit_codes() {
        assert_eq!(Category::Conforms.exit_code(), 0);
        assert_eq!(Category::Violations.exit_code(), 1);
        assert_eq!(Category::Resolution.exit_code(), 2);
        assert_eq!(Category::SpecMalformed.exit_code(), 3);
    }

    #[test]
    fn resolution_failures_are_resolution_category() {
        let findings = [
            Finding::NoMatchingPath {
                path: "/foo".into(),
                documented_paths: vec![],
                servers: vec![],
            },
            Finding::NoMatchingMethod {
                method: "POST".into(),
                path_template: "/foo".into(),
                documented_methods: vec!["GET".into()],
            },
            Finding::UndocumentedStatus {
                status: 404,
                endpoint: "GET /foo".into(),
                documented: vec!["200".into()],
            },
            Finding::MissingContentType {
                subject: "x".into(),
                documented: vec![],
            },
        ];
        for f in &findings {
            assert_eq!(f.category(), Category::Resolution, "{f:?}");
            assert!(!f.conforms());
        }
    }

    #[test]
    fn undocumented_status_message() {
        let f = Finding::UndocumentedStatus {
            status: 404,
            endpoint: "GET /items/{id}".into(),
            documented: vec!["200".into()],
        };
        assert!(
            f.describe()
                .starts_with("no response documented for status 404")
        );
        assert!(f.describe().contains("documented responses: 200"));
    }

    #[test]
    fn no_matching_path_message() {
        let f = Finding::NoMatchingPath {
            path: "/foo".into(),
            documented_paths: vec!["/items/{id}".into()],
            servers: vec!["/v1".into()],
        };
        let msg = f.describe();
        assert!(msg.contains("no path in the spec matches `/foo`"));
        assert!(msg.contains("servers: /v1"));
    }

    #[test]
    fn violations_accessor() {
        let f = Finding::Violations {
            subject: "s".into(),
            violations: vec![Violation::new("body", "x", json!(1), "m")],
        };
        assert_eq!(f.violations().len(), 1);
        assert_eq!(f.subject(), Some("s"));
        assert!(Finding::SpecMalformed { reason: "r".into() }.violations().is_empty());
    }

    #[test]
    fn finding_serializes_with_kind_tag() {
        let f = Finding::SpecMalformed {
            reason: "unresolved reference".into(),
        };
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["kind"], "spec_malformed");
        let back: Finding = serde_json::from_value(v).unwrap();
        assert_eq!(back, f);
    }
}
