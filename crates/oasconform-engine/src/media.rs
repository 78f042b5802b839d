//! MediaTypeResolver - response definition + Content-Type → media type entry

use oasconform_core::ResponseSnapshot;
use oasconform_core::snapshot::{is_json_media, media_essence};
use tracing::debug;

use crate::model::{MediaPattern, MediaTypeEntry, ResponseDef};

/// How the response's content type resolved against the definition.
#[derive(Debug, Clone, Copy)]
pub enum MediaResolution<'a> {
    /// The definition documents no content; nothing to check
    NoContent,
    /// No Content-Type and no payload; nothing to check
    Absent,
    /// Content-Type matched a documented media type
    Matched {
        entry: &'a MediaTypeEntry,
    },
}

/// What kind of payload the response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Empty,
    /// A decoded body (JSON value)
    Structured,
    /// Raw text with no decoded body
    Opaque,
}

impl Payload {
    #[must_use]
    pub fn of(response: &ResponseSnapshot) -> Self {
        if response.body.is_some() {
            Self::Structured
        } else if response.has_payload() {
            Self::Opaque
        } else {
            Self::Empty
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Content-Type matches no documented media type
    Unsupported {
        content_type: String,
        documented: Vec<String>,
    },
    /// Content is documented and an opaque payload was sent without a Content-Type
    Missing { documented: Vec<String> },
}

/// Resolve the media type entry governing the response body.
///
/// Parameters (`; charset=utf-8`) are ignored. Precedence: exact media type,
/// then `type/*`, then `*/*`, each in declaration order.
///
/// Without a Content-Type, a decoded body is checked against the first JSON
/// media type, or against the only documented one.
///
/// # Errors
///
/// `Unsupported` when nothing matches; `Missing` when content is documented
/// and a payload was sent without a Content-Type that no entry can be
/// inferred for.
pub fn resolve<'a>(
    def: &'a ResponseDef,
    content_type: Option<&str>,
    payload: Payload,
) -> Result<MediaResolution<'a>, MediaError> {
    if def.content.is_empty() {
        return Ok(MediaResolution::NoContent);
    }

    let essence = content_type.map(media_essence).filter(|e| !e.is_empty());
    let Some(essence) = essence else {
        return match payload {
            Payload::Empty => Ok(MediaResolution::Absent),
            Payload::Structured => match inferred(def) {
                Some(entry) => {
                    debug!(media_type = %entry.declared, "no content type; inferred media type");
                    Ok(MediaResolution::Matched { entry })
                }
                None => Err(MediaError::Missing {
                    documented: def.media_types(),
                }),
            },
            Payload::Opaque => Err(MediaError::Missing {
                documented: def.media_types(),
            }),
        };
    };

    let main_type = essence.split('/').next().unwrap_or_default();
    let exact = def
        .content
        .iter()
        .find(|e| matches!(&e.pattern, MediaPattern::Exact(m) if *m == essence));
    let wildcard = || {
        def.content
            .iter()
            .find(|e| matches!(&e.pattern, MediaPattern::TypeWildcard(t) if t == main_type))
    };
    let any = || {
        def.content
            .iter()
            .find(|e| matches!(e.pattern, MediaPattern::Any))
    };

    match exact.or_else(wildcard).or_else(any) {
        Some(entry) => {
            debug!(content_type = %essence, media_type = %entry.declared, "resolved media type");
            Ok(MediaResolution::Matched { entry })
        }
        None => Err(MediaError::Unsupported {
            content_type: essence,
            documented: def.media_types(),
        }),
    }
}

/// Entry for a decoded body sent without a Content-Type.
fn inferred(def: &ResponseDef) -> Option<&MediaTypeEntry> {
    let json = def
        .content
        .iter()
        .find(|e| matches!(&e.pattern, MediaPattern::Exact(m) if is_json_media(m)));
    match def.content.as_slice() {
        [only] => json.or(Some(only)),
        _ => json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusSelector;

    fn def(media_types: &[&str]) -> ResponseDef {
        ResponseDef {
            selector: StatusSelector::Exact(200),
            description: None,
            content: media_types
                .iter()
                .map(|m| MediaTypeEntry {
                    pattern: MediaPattern::parse(m).unwrap(),
                    declared: (*m).to_string(),
                    schema: None,
                })
                .collect(),
            headers: Vec::new(),
        }
    }

    fn declared(def: &ResponseDef, content_type: &str) -> Option<String> {
        match resolve(def, Some(content_type), Payload::Opaque) {
            Ok(MediaResolution::Matched { entry }) => Some(entry.declared.clone()),
            _ => None,
        }
    }

    #[test]
    fn exact_beats_wildcards_regardless_of_order() {
        let d = def(&["*/*", "text/*", "text/html"]);
        assert_eq!(declared(&d, "text/html; charset=utf-8").as_deref(), Some("text/html"));
        assert_eq!(declared(&d, "text/plain").as_deref(), Some("text/*"));
        assert_eq!(declared(&d, "image/png").as_deref(), Some("*/*"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let d = def(&["application/json"]);
        assert_eq!(
            declared(&d, "Application/JSON;charset=UTF-8").as_deref(),
            Some("application/json")
        );
    }

    #[test]
    fn unsupported_lists_documented() {
        let d = def(&["application/json", "application/xml"]);
        let err = resolve(&d, Some("text/html"), Payload::Opaque).unwrap_err();
        assert_eq!(
            err,
            MediaError::Unsupported {
                content_type: "text/html".into(),
                documented: vec!["application/json".into(), "application/xml".into()],
            }
        );
    }

    #[test]
    fn absent_content_type() {
        let d = def(&["application/json"]);
        assert!(matches!(resolve(&d, None, Payload::Empty), Ok(MediaResolution::Absent)));
        assert!(matches!(resolve(&d, Some(""), Payload::Empty), Ok(MediaResolution::Absent)));
        assert!(matches!(resolve(&d, None, Payload::Opaque), Err(MediaError::Missing { .. })));
    }

    #[test]
    fn decoded_body_without_content_type_uses_json_entry() {
        let d = def(&["text/plain", "application/problem+json", "application/json"]);
        match resolve(&d, None, Payload::Structured) {
            Ok(MediaResolution::Matched { entry }) => {
                assert_eq!(entry.declared, "application/problem+json");
            }
            other => panic!("unexpected resolution: {other:?}"),
        }

        let only = def(&["text/*"]);
        assert!(matches!(
            resolve(&only, None, Payload::Structured),
            Ok(MediaResolution::Matched { .. })
        ));

        let ambiguous = def(&["text/plain", "application/xml"]);
        assert!(matches!(
            resolve(&ambiguous, None, Payload::Structured),
            Err(MediaError::Missing { .. })
        ));
    }

    #[test]
    fn no_documented_content() {
        let d = def(&[]);
        assert!(matches!(
            resolve(&d, Some("text/html"), Payload::Opaque),
            Ok(MediaResolution::NoContent)
        ));
        assert!(matches!(resolve(&d, None, Payload::Structured), Ok(MediaResolution::NoContent)));
    }
}
