//! Captured HTTP response as handed to the conformance engine
//!
//! The snapshot is client-agnostic: adapters for a particular HTTP client
//! fill in the status, headers, the decoded body (when structured) and the
//! raw text.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of an HTTP response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseSnapshot {
    /// Status code received
    pub status: u16,
    /// Response headers, looked up case-insensitively
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Decoded body when the payload is structured (JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Raw text of the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ResponseSnapshot {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Build a snapshot from raw text, decoding JSON when the content type says so.
    ///
    /// A JSON content type with text that does not parse keeps the text only;
    /// the engine then reports the body against the schema as a string.
    #[must_use]
    pub fn from_text(
        status: u16,
        headers: HashMap<String, String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let mut snapshot = Self {
            status,
            headers,
            body: None,
            text: None,
        };
        let structured = snapshot
            .content_type()
            .map(media_essence)
            .is_some_and(|essence| is_json_media(&essence));
        if structured && !text.is_empty() {
            snapshot.body = serde_json::from_str(&text).ok();
        }
        snapshot.text = Some(text);
        snapshot
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the response carries a payload at all.
    ///
    /// Raw text decides when present; otherwise any decoded body (including
    /// JSON `null`) counts as a payload.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        match &self.text {
            Some(text) => !text.is_empty(),
            None => self.body.is_some(),
        }
    }

    /// Structural value to validate against a JSON schema.
    ///
    /// Prefers the decoded body, then the text parsed as JSON, then the text
    /// itself as a JSON string.
    #[must_use]
    pub fn structured_payload(&self) -> Option<Value> {
        if let Some(body) = &self.body {
            return Some(body.clone());
        }
        let text = self.text.as_deref().filter(|t| !t.is_empty())?;
        Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
    }

    /// Whether the payload is textual: raw text, or a decoded JSON string.
    #[must_use]
    pub fn has_text_payload(&self) -> bool {
        self.text.is_some() || matches!(self.body, Some(Value::String(_)))
    }

    /// Body and text as shown in diagnostics.
    #[must_use]
    pub fn describe_payload(&self) -> Value {
        let mut map = serde_json::Map::new();
        if let Some(body) = &self.body {
            map.insert("body".to_string(), body.clone());
        }
        if let Some(text) = &self.text {
            map.insert("text".to_string(), Value::String(text.clone()));
        }
        Value::Object(map)
    }
}

/// Media type without parameters, lowercased: `"Application/JSON; charset=utf-8"` → `"application/json"`.
#[must_use]
pub fn media_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// `application/json` or any `+json` structured-syntax suffix.
#[must_use]
pub fn is_json_media(essence: &str) -> bool {
    match essence.split_once('/') {
        Some((_, subtype)) => subtype == "json" || subtype.ends_with("+json"),
        None => false,
    }
}
