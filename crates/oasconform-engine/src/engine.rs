//! ConformanceEngine - one response against the spec, end to end
//!
//! Pipeline: PathMatcher → ResponseDefinitionResolver → MediaTypeResolver →
//! SchemaValidator. The first resolution failure short-circuits with its own
//! finding kind; body and header violations are collected together.

use oasconform_core::snapshot::{is_json_media, media_essence};
use oasconform_core::{Config, Finding, ResponseSnapshot, Verdict, Violation};
use serde_json::{Number, Value};
use tracing::debug;

use crate::error::SchemaError;
use crate::matcher::{MatchError, match_request};
use crate::media::{self, MediaError, MediaResolution, Payload};
use crate::model::{HeaderDef, MediaPattern, Method, ResponseDef, SpecDocument};
use crate::responses;
use crate::schema::{Schema, SchemaKind};
use crate::validator::SchemaValidator;

/// Root label for body violation locations
const BODY: &str = "body";
/// Root label when validating a value against a named schema
const VALUE: &str = "value";

/// Knobs for a check run
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Assert `format` keywords
    pub validate_formats: bool,
    /// A media type documented without a schema rejects a non-empty body
    pub strict_schemaless_content: bool,
    /// Base paths accepted in addition to the documented servers
    pub extra_base_paths: Vec<String>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            validate_formats: true,
            strict_schemaless_content: true,
            extra_base_paths: Vec::new(),
        }
    }
}

impl From<&Config> for CheckOptions {
    fn from(config: &Config) -> Self {
        Self {
            validate_formats: config.validate_formats,
            strict_schemaless_content: config.strict_schemaless_content,
            extra_base_paths: config.servers.clone(),
        }
    }
}

/// Checks responses against one normalized spec.
///
/// Holds the spec by shared reference and never mutates it, so one engine
/// (or many) can check responses from several threads at once.
#[derive(Debug, Clone)]
pub struct ConformanceEngine<'a> {
    spec: &'a SpecDocument,
    options: CheckOptions,
}

impl<'a> ConformanceEngine<'a> {
    #[must_use]
    pub fn new(spec: &'a SpecDocument) -> Self {
        Self {
            spec,
            options: CheckOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn spec(&self) -> &'a SpecDocument {
        self.spec
    }

    #[must_use]
    pub const fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// The response must satisfy the documented contract.
    #[must_use]
    pub fn check(&self, method: &str, path: &str, response: &ResponseSnapshot) -> Verdict {
        self.judge(method, path, response, false)
    }

    /// The response must NOT satisfy the documented contract.
    ///
    /// Resolution still runs in full; a request that cannot be resolved fails
    /// here too, with the same reason as in [`Self::check`].
    #[must_use]
    pub fn check_not(&self, method: &str, path: &str, response: &ResponseSnapshot) -> Verdict {
        self.judge(method, path, response, true)
    }

    /// A value must satisfy the named component schema.
    #[must_use]
    pub fn check_schema(&self, name: &str, value: &Value) -> Verdict {
        Verdict::judge(self.evaluate_schema(name, value), false, || value.clone())
    }

    /// A value must NOT satisfy the named component schema.
    #[must_use]
    pub fn check_schema_not(&self, name: &str, value: &Value) -> Verdict {
        Verdict::judge(self.evaluate_schema(name, value), true, || value.clone())
    }

    fn judge(&self, method: &str, path: &str, response: &ResponseSnapshot, negated: bool) -> Verdict {
        let finding = self.evaluate(method, path, response);
        let verdict = Verdict::judge(finding, negated, || response.describe_payload());
        debug!(
            method,
            path,
            status = response.status,
            negated,
            category = %verdict.category(),
            passed = verdict.passed(),
            "checked response"
        );
        verdict
    }

    /// Forward check without negation or pass/fail judgement.
    #[must_use]
    pub fn evaluate(&self, method: &str, path: &str, response: &ResponseSnapshot) -> Finding {
        let request = match match_request(self.spec, method, path, &self.options.extra_base_paths) {
            Ok(request) => request,
            Err(MatchError::NoPath {
                path,
                documented_paths,
                servers,
            }) => {
                return Finding::NoMatchingPath {
                    path,
                    documented_paths,
                    servers,
                };
            }
            Err(MatchError::NoMethod {
                method,
                path_template,
                documented_methods,
            }) => {
                return Finding::NoMatchingMethod {
                    method,
                    path_template,
                    documented_methods,
                };
            }
        };

        let def = match responses::resolve(request.operation, response.status) {
            Ok(def) => def,
            Err(undocumented) => {
                return Finding::UndocumentedStatus {
                    status: undocumented.status,
                    endpoint: undocumented.endpoint,
                    documented: undocumented.documented,
                };
            }
        };
        let subject = format!(
            "the '{}' response defined for {}",
            def.selector,
            request.operation.endpoint()
        );

        // HEAD responses carry no body to check
        let media = if request.method == Method::Head {
            MediaResolution::NoContent
        } else {
            match media::resolve(def, response.content_type(), Payload::of(response)) {
                Ok(media) => media,
                Err(MediaError::Unsupported {
                    content_type,
                    documented,
                }) => {
                    return Finding::UnsupportedMediaType {
                        content_type,
                        subject,
                        documented,
                    };
                }
                Err(MediaError::Missing { documented }) => {
                    return Finding::MissingContentType {
                        subject,
                        documented,
                    };
                }
            }
        };

        let validator =
            SchemaValidator::new(&self.spec.schemas).with_formats(self.options.validate_formats);
        let outcome = self
            .body_violations(media, response, &validator)
            .and_then(|mut violations| {
                violations.extend(self.header_violations(def, response, &validator)?);
                Ok(violations)
            });
        conclude(subject, outcome)
    }

    /// Forward check of a value against a named component schema.
    #[must_use]
    pub fn evaluate_schema(&self, name: &str, value: &Value) -> Finding {
        let Some(schema) = self.spec.schema(name) else {
            return Finding::UnknownSchema {
                name: name.to_string(),
                documented: self.spec.schemas.keys().cloned().collect(),
            };
        };
        let validator =
            SchemaValidator::new(&self.spec.schemas).with_formats(self.options.validate_formats);
        conclude(
            format!("schema `{name}`"),
            validator.validate(value, schema, VALUE),
        )
    }

    fn body_violations(
        &self,
        media: MediaResolution<'_>,
        response: &ResponseSnapshot,
        validator: &SchemaValidator<'_>,
    ) -> Result<Vec<Violation>, SchemaError> {
        let MediaResolution::Matched { entry } = media else {
            return Ok(Vec::new());
        };

        let Some(schema) = &entry.schema else {
            if self.options.strict_schemaless_content && response.has_payload() {
                return Ok(vec![Violation::new(
                    BODY,
                    "no body",
                    response.describe_payload(),
                    format!(
                        "`{}` is documented without a schema, but the response has a body",
                        entry.declared
                    ),
                )]);
            }
            return Ok(Vec::new());
        };

        // without a Content-Type the entry was inferred from a decoded body
        let essence = match response.content_type().map(media_essence) {
            Some(essence) if !essence.is_empty() => essence,
            _ => match &entry.pattern {
                MediaPattern::Exact(declared) => declared.clone(),
                _ => "application/json".to_string(),
            },
        };
        if is_json_media(&essence) {
            return match response.structured_payload() {
                Some(payload) => validator.validate(&payload, schema, BODY),
                None if schema.accepts_anything() => Ok(Vec::new()),
                None => Ok(vec![Violation::new(
                    BODY,
                    format!("a body of type {}", schema.type_name()),
                    Value::Null,
                    "expected a response body but none was sent",
                )]),
            };
        }

        // non-JSON payloads are opaque; only their textual nature is checked
        if response.has_payload() && !response.has_text_payload() {
            return Ok(vec![Violation::new(
                BODY,
                "text",
                response.describe_payload(),
                format!("`{essence}` content must be sent as text"),
            )]);
        }
        Ok(Vec::new())
    }

    fn header_violations(
        &self,
        def: &ResponseDef,
        response: &ResponseSnapshot,
        validator: &SchemaValidator<'_>,
    ) -> Result<Vec<Violation>, SchemaError> {
        let mut out = Vec::new();
        for HeaderDef {
            name,
            required,
            schema,
        } in &def.headers
        {
            let location = format!("header/{name}");
            match (response.header(name), schema) {
                (None, _) if *required => out.push(Violation::new(
                    location,
                    format!("header {name}"),
                    Value::Null,
                    format!("missing required header: {name}"),
                )),
                (Some(raw), Some(schema)) => {
                    let value = self.coerce_header(raw, schema);
                    out.extend(validator.validate(&value, schema, &location)?);
                }
                _ => {}
            }
        }
        Ok(out)
    }

    /// Header values arrive as text; convert them by the schema's kind.
    fn coerce_header(&self, raw: &str, schema: &Schema) -> Value {
        let mut kind = &schema.kind;
        // follow a single named reference to find the primitive kind
        if let SchemaKind::Named(name) = kind {
            if let Some(target) = self.spec.schema(name) {
                kind = &target.kind;
            }
        }
        let text = raw.trim();
        match kind {
            SchemaKind::Integer(_) => text
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string())),
            SchemaKind::Number(_) => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or_else(|| Value::String(raw.to_string()), Value::Number),
            SchemaKind::Boolean => match text {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            _ => Value::String(raw.to_string()),
        }
    }
}

fn conclude(subject: String, outcome: Result<Vec<Violation>, SchemaError>) -> Finding {
    match outcome {
        Ok(violations) if violations.is_empty() => Finding::Conforms { subject },
        Ok(violations) => Finding::Violations {
            subject,
            violations,
        },
        Err(err) => Finding::SpecMalformed {
            reason: err.to_string(),
        },
    }
}
