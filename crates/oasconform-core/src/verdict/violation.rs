//! A single located mismatch between a value and its schema

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest rendering of an actual value before it is truncated.
const MAX_ACTUAL_LEN: usize = 200;

/// One violation found while validating a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    /// Where in the response: `body`, `body/items/0/name`, `header/X-Rate-Limit`
    pub location: String,
    /// The constraint that was not met, e.g. `type string`, `required property name`
    pub expected: String,
    /// The offending value
    pub actual: Value,
    /// Human-readable message
    pub message: String,
}

impl Violation {
    #[must_use]
    pub fn new(
        location: impl Into<String>,
        expected: impl Into<String>,
        actual: Value,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            expected: expected.into(),
            actual,
            message: message.into(),
        }
    }

    /// Compact JSON of the actual value, truncated for display.
    #[must_use]
    pub fn actual_display(&self) -> String {
        let text = self.actual.to_string();
        if text.chars().count() <= MAX_ACTUAL_LEN {
            return text;
        }
        let mut short: String = text.chars().take(MAX_ACTUAL_LEN).collect();
        short.push_str("...");
        short
    }

    /// Multi-line rendering used in verdict messages.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "  - {}: {}\n      expected: {}\n      actual:   {}",
            self.location,
            self.message,
            self.expected,
            self.actual_display()
        )
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}
