//! Verdict policy - applies negation to a finding and renders the diagnosis

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Category, Finding};

/// Final pass/fail status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// Complete result of one conformance check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Verdict {
    pub status: VerdictStatus,
    /// Whether the check asked that the response must NOT satisfy the spec
    pub negated: bool,
    /// What the forward check found
    pub finding: Finding,
    /// Payload shown when a negated check fails because the response conformed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<Value>,
}

impl Verdict {
    /// Judge a finding.
    ///
    /// Negation flips only the conforms/violations outcome. Resolution and
    /// spec failures fail in both directions: a response that cannot be
    /// matched to a contract never passes as "does not satisfy".
    ///
    /// `observed` is evaluated only when a negated check fails on a
    /// conforming response.
    #[must_use]
    pub fn judge(finding: Finding, negated: bool, observed: impl FnOnce() -> Value) -> Self {
        let status = match (finding.category(), negated) {
            (Category::Conforms, false) | (Category::Violations, true) => VerdictStatus::Pass,
            _ => VerdictStatus::Fail,
        };
        let observed = (negated && finding.conforms()).then(observed);
        Self {
            status,
            negated,
            finding,
            observed,
        }
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        self.finding.category()
    }

    /// Exit code for the CLI: 0 on pass, otherwise by category.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            return 0;
        }
        match self.category() {
            // negated check that conformed
            Category::Conforms => Category::Violations.exit_code(),
            other => other.exit_code(),
        }
    }

    /// Full multi-line diagnosis.
    #[must_use]
    pub fn message(&self) -> String {
        self.render(None)
    }

    /// Diagnosis with at most `limit` violations listed.
    #[must_use]
    pub fn render(&self, limit: Option<usize>) -> String {
        match (&self.finding, self.negated) {
            (Finding::Conforms { subject }, false) => format!("response satisfies {subject}"),
            (Finding::Conforms { subject }, true) => {
                let mut msg = format!("expected response not to satisfy {subject}, but it did");
                if let Some(observed) = &self.observed {
                    let shown = serde_json::to_string_pretty(observed)
                        .unwrap_or_else(|_| observed.to_string());
                    msg.push_str(&format!("\nreceived:\n{shown}"));
                }
                msg
            }
            (Finding::Violations { violations, .. }, negated) => {
                let mut msg = self.finding.describe();
                if negated {
                    msg.push_str(", as expected");
                }
                msg.push(':');
                let shown = limit.unwrap_or(violations.len()).min(violations.len());
                for v in &violations[..shown] {
                    msg.push('\n');
                    msg.push_str(&v.render());
                }
                if shown < violations.len() {
                    msg.push_str(&format!("\n  ... and {} more", violations.len() - shown));
                }
                msg
            }
            (finding, false) => finding.describe(),
            (finding, true) => format!(
                "{}\nnegation not applied: the response could not be checked against a contract",
                finding.describe()
            ),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Violation;
    use serde_json::json;

    fn conforms() -> Finding {
        Finding::Conforms {
            subject: "the '200' response defined for GET /items/{id}".into(),
        }
    }

    fn violations(n: usize) -> Finding {
        Finding::Violations {
            subject: "the '200' response defined for GET /items/{id}".into(),
            violations: (0..n)
                .map(|i| {
                    Violation::new(
                        format!("body/p{i}"),
                        format!("required property p{i}"),
                        json!({}),
                        format!("missing required property: p{i}"),
                    )
                })
                .collect(),
        }
    }

    fn not_found() -> Finding {
        Finding::NoMatchingPath {
            path: "/foo".into(),
            documented_paths: vec!["/items/{id}".into()],
            servers: vec![],
        }
    }

    #[test]
    fn forward_conforms_passes() {
        let v = Verdict::judge(conforms(), false, || json!(null));
        assert!(v.passed());
        assert_eq!(v.exit_code(), 0);
        assert!(v.observed.is_none());
    }

    #[test]
    fn forward_violations_fail() {
        let v = Verdict::judge(violations(1), false, || json!(null));
        assert!(!v.passed());
        assert_eq!(v.exit_code(), 1);
        assert!(v.message().contains("missing required property: p0"));
    }

    #[test]
    fn negated_conforms_fails_and_shows_body() {
        let v = Verdict::judge(conforms(), true, || json!({"body": {"name": "a"}}));
        assert!(!v.passed());
        assert_eq!(v.exit_code(), 1);
        let msg = v.message();
        assert!(msg.contains("expected response not to satisfy"));
        assert!(msg.contains("\"name\": \"a\""));
    }

    #[test]
    fn negated_violations_pass() {
        let v = Verdict::judge(violations(2), true, || panic!("not evaluated"));
        assert!(v.passed());
        assert!(v.message().contains("as expected"));
    }

    #[test]
    fn resolution_failure_fails_in_both_directions() {
        let forward = Verdict::judge(not_found(), false, || json!(null));
        let negated = Verdict::judge(not_found(), true, || json!(null));
        assert!(!forward.passed());
        assert!(!negated.passed());
        assert_eq!(negated.exit_code(), 2);
        assert!(
            negated
                .message()
                .contains("no path in the spec matches `/foo`")
        );
    }

    #[test]
    fn spec_malformed_fails_under_negation() {
        let f = Finding::SpecMalformed {
            reason: "unresolved reference `#/x`".into(),
        };
        let v = Verdict::judge(f, true, || json!(null));
        assert!(!v.passed());
        assert_eq!(v.exit_code(), 3);
    }

    #[test]
    fn render_caps_violation_list() {
        let v = Verdict::judge(violations(5), false, || json!(null));
        let msg = v.render(Some(2));
        assert!(msg.contains("p0"));
        assert!(msg.contains("p1"));
        assert!(!msg.contains("missing required property: p2"));
        assert!(msg.contains("... and 3 more"));
    }

    #[test]
    fn verdict_serialization_roundtrip() {
        let v = Verdict::judge(violations(1), false, || json!(null));
        let json = serde_json::to_string(&v).unwrap();
        let parsed: Verdict = serde_json::from_str(&json).unwrap();
        assert_eq!(v, parsed);
    }
}
