//! Canonical spec model - what the matcher and resolvers operate on
//!
//! Built once by the adapter and never mutated afterwards, so one
//! `SpecDocument` can be shared by any number of concurrent checks.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::schema::Schema;

/// Dialect of the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecVersion {
    /// Swagger / OpenAPI 2.0
    Swagger2,
    /// OpenAPI 3.0.x
    OpenApi30,
    /// OpenAPI 3.1 and later
    OpenApi31,
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swagger2 => write!(f, "OpenAPI 2.0"),
            Self::OpenApi30 => write!(f, "OpenAPI 3.0"),
            Self::OpenApi31 => write!(f, "OpenAPI 3.1"),
        }
    }
}

/// Normalized, immutable spec document
#[derive(Debug, Clone)]
pub struct SpecDocument {
    pub version: SpecVersion,
    /// Path prefixes from `basePath` / `servers`; `""` is the root
    pub base_paths: Vec<String>,
    /// Path items in declaration order
    pub paths: Vec<PathItem>,
    /// Named component schemas (`components/schemas` or `definitions`)
    pub schemas: IndexMap<String, Schema>,
}

impl SpecDocument {
    /// Documented path templates, in declaration order.
    #[must_use]
    pub fn templates(&self) -> Vec<String> {
        self.paths
            .iter()
            .map(|p| p.template.as_str().to_string())
            .collect()
    }

    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Every operation, in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.paths.iter().flat_map(|p| p.operations.values())
    }
}

#[derive(Debug, Clone)]
pub struct PathItem {
    pub template: PathTemplate,
    pub operations: IndexMap<Method, Operation>,
}

impl PathItem {
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.operations.keys().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub method: Method,
    /// Raw path template the operation belongs to
    pub path: String,
    /// Response definitions in declaration order
    pub responses: Vec<ResponseDef>,
}

impl Operation {
    /// Operation label: "GET /items/{id}"
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Documented selectors, in declaration order.
    #[must_use]
    pub fn selectors(&self) -> Vec<String> {
        self.responses.iter().map(|r| r.selector.to_string()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ResponseDef {
    pub selector: StatusSelector,
    pub description: Option<String>,
    /// Media type entries in declaration order; empty = no content documented
    pub content: Vec<MediaTypeEntry>,
    pub headers: Vec<HeaderDef>,
}

impl ResponseDef {
    /// Media types as written in the spec.
    #[must_use]
    pub fn media_types(&self) -> Vec<String> {
        self.content.iter().map(|e| e.declared.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct MediaTypeEntry {
    pub pattern: MediaPattern,
    /// Media type key as written in the spec
    pub declared: String,
    /// `None` for entries documented without a schema
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone)]
pub struct HeaderDef {
    pub name: String,
    pub required: bool,
    pub schema: Option<Schema>,
}

/// HTTP method of a documented operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    pub const ALL: [Self; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    /// Lowercase key used in path item objects
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTTP method `{0}`")]
pub struct ParseMethodError(pub String);

impl FromStr for Method {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseMethodError(s.to_string()))
    }
}

/// Key of a response definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusSelector {
    /// `"404"`
    Exact(u16),
    /// `"4XX"`, holding the leading digit
    Range(u8),
    /// `"default"`
    Default,
}

impl StatusSelector {
    /// Parse a response key. Returns `None` for anything that is not an
    /// exact code (100–599), a range (`1XX`–`5XX`, either case) or `default`.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if key == "default" {
            return Some(Self::Default);
        }
        let bytes = key.as_bytes();
        if bytes.len() != 3 || !(b'1'..=b'5').contains(&bytes[0]) {
            return None;
        }
        if bytes[1..].eq_ignore_ascii_case(b"XX") {
            return Some(Self::Range(bytes[0] - b'0'));
        }
        key.parse::<u16>().ok().map(Self::Exact)
    }

    #[must_use]
    pub const fn matches(self, status: u16) -> bool {
        match self {
            Self::Exact(code) => code == status,
            Self::Range(digit) => status / 100 == digit as u16,
            Self::Default => true,
        }
    }
}

impl fmt::Display for StatusSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(code) => write!(f, "{code}"),
            Self::Range(digit) => write!(f, "{digit}XX"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Media type key of a response content map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPattern {
    /// `application/json` (stored as lowercase essence)
    Exact(String),
    /// `text/*`, holding the type
    TypeWildcard(String),
    /// `*/*`
    Any,
}

impl MediaPattern {
    /// Parse a media type key, ignoring parameters. `None` if it is not `type/subtype`.
    #[must_use]
    pub fn parse(declared: &str) -> Option<Self> {
        let essence = oasconform_core::snapshot::media_essence(declared);
        let (ty, subtype) = essence.split_once('/')?;
        if ty.is_empty() || subtype.is_empty() {
            return None;
        }
        Some(match (ty, subtype) {
            ("*", "*") => Self::Any,
            ("*", _) => return None,
            (ty, "*") => Self::TypeWildcard(ty.to_string()),
            _ => Self::Exact(essence.clone()),
        })
    }
}

/// A path template split into segments, parsed once at normalization.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    placeholders: usize,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Param(String),
    /// Literals and placeholders sharing one segment: `{name}.{ext}`
    Mixed { regex: Regex, names: Vec<String> },
}

impl PathTemplate {
    /// Parse a template such as `/users/{id}`.
    ///
    /// One trailing slash is dropped (`/items/` matches like `/items`), the
    /// same way request paths are normalized; the root stays `/`.
    ///
    /// # Errors
    ///
    /// Returns a reason when braces are unbalanced, a placeholder is empty,
    /// or a placeholder name repeats.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut seen: Vec<String> = Vec::new();

        let trimmed = match raw.strip_suffix('/') {
            Some(rest) if !rest.is_empty() => rest,
            _ => raw,
        };
        for part in split_segments(trimmed) {
            let pieces = split_placeholders(part)?;
            for piece in &pieces {
                if let Piece::Param(name) = piece {
                    if seen.contains(name) {
                        return Err(format!("placeholder `{{{name}}}` appears more than once"));
                    }
                    seen.push(name.clone());
                }
            }
            segments.push(match pieces.as_slice() {
                [] => Segment::Literal(String::new()),
                [Piece::Literal(lit)] => Segment::Literal(lit.clone()),
                [Piece::Param(name)] => Segment::Param(name.clone()),
                _ => mixed_segment(&pieces)?,
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            placeholders: seen.len(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of placeholders; fewer means more specific.
    #[must_use]
    pub const fn placeholder_count(&self) -> usize {
        self.placeholders
    }

    /// Shape used to detect equivalent templates (`/a/{x}` vs `/a/{y}`).
    #[must_use]
    pub fn shape(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => lit.clone(),
                Segment::Param(_) => "{}".to_string(),
                Segment::Mixed { regex, .. } => regex.as_str().to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Match a concrete path (already stripped of query and base path).
    ///
    /// Returns the URL-decoded placeholder values on success.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<IndexMap<String, String>> {
        let concrete: Vec<&str> = split_segments(path).collect();
        if concrete.len() != self.segments.len() {
            return None;
        }

        let mut params = IndexMap::new();
        for (segment, raw) in self.segments.iter().zip(concrete) {
            let decoded = percent_decode_str(raw).decode_utf8_lossy();
            match segment {
                Segment::Literal(lit) => {
                    if lit != raw && *lit != decoded {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if decoded.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), decoded.into_owned());
                }
                Segment::Mixed { regex, names } => {
                    let caps = regex.captures(&decoded)?;
                    for (i, name) in names.iter().enumerate() {
                        let value = caps.get(i + 1)?.as_str();
                        params.insert(name.clone(), value.to_string());
                    }
                }
            }
        }
        Some(params)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

enum Piece {
    Literal(String),
    Param(String),
}

fn split_placeholders(segment: &str) -> Result<Vec<Piece>, String> {
    let mut pieces = Vec::new();
    let mut rest = segment;
    while let Some(open) = rest.find('{') {
        if rest[..open].contains('}') {
            return Err(format!("unbalanced `}}` in segment `{segment}`"));
        }
        if open > 0 {
            pieces.push(Piece::Literal(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed `{{` in segment `{segment}`"))?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(format!("invalid placeholder in segment `{segment}`"));
        }
        pieces.push(Piece::Param(name.to_string()));
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(format!("unbalanced `}}` in segment `{segment}`"));
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest.to_string()));
    }
    Ok(pieces)
}

fn mixed_segment(pieces: &[Piece]) -> Result<Segment, String> {
    let mut pattern = String::from("^");
    let mut names = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Literal(lit) => pattern.push_str(&regex::escape(lit)),
            Piece::Param(name) => {
                pattern.push_str("(.+?)");
                names.push(name.clone());
            }
        }
    }
    pattern.push('$');
    let regex = Regex::new(&pattern).map_err(|e| e.to_string())?;
    Ok(Segment::Mixed { regex, names })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_in_template_is_ignored() {
        let template = PathTemplate::parse("/items/").unwrap();
        assert_eq!(template.as_str(), "/items/");
        assert!(template.match_path("/items").is_some());
        assert_eq!(template.shape(), PathTemplate::parse("/items").unwrap().shape());

        let root = PathTemplate::parse("/").unwrap();
        assert!(root.match_path("/").is_some());
        assert!(root.match_path("/items").is_none());
    }

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert!("FETCH".parse::<Method>().is_err());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn status_selector_parse() {
        assert_eq!(StatusSelector::parse("200"), Some(StatusSelector::Exact(200)));
        assert_eq!(StatusSelector::parse("2XX"), Some(StatusSelector::Range(2)));
        assert_eq!(StatusSelector::parse("4xx"), Some(StatusSelector::Range(4)));
        assert_eq!(StatusSelector::parse("default"), Some(StatusSelector::Default));
        assert_eq!(StatusSelector::parse("600"), None);
        assert_eq!(StatusSelector::parse("2X0"), None);
        assert_eq!(StatusSelector::parse("ok"), None);
    }

    #[test]
    fn status_selector_matches() {
        assert!(StatusSelector::Exact(201).matches(201));
        assert!(!StatusSelector::Exact(201).matches(200));
        assert!(StatusSelector::Range(4).matches(418));
        assert!(!StatusSelector::Range(4).matches(500));
        assert!(StatusSelector::Default.matches(599));
        assert_eq!(StatusSelector::Range(5).to_string(), "5XX");
    }

    #[test]
    fn media_pattern_parse() {
        assert_eq!(
            MediaPattern::parse("application/json; charset=utf-8"),
            Some(MediaPattern::Exact("application/json".into()))
        );
        assert_eq!(
            MediaPattern::parse("text/*"),
            Some(MediaPattern::TypeWildcard("text".into()))
        );
        assert_eq!(MediaPattern::parse("*/*"), Some(MediaPattern::Any));
        assert_eq!(MediaPattern::parse("json"), None);
        assert_eq!(MediaPattern::parse("*/json"), None);
    }

    #[test]
    fn template_literal_and_param() {
        let t = PathTemplate::parse("/users/{id}").unwrap();
        assert_eq!(t.placeholder_count(), 1);
        let params = t.match_path("/users/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(t.match_path("/users").is_none());
        assert!(t.match_path("/users/42/posts").is_none());
        assert!(t.match_path("/accounts/42").is_none());
    }

    #[test]
    fn template_param_rejects_empty_segment() {
        let t = PathTemplate::parse("/users/{id}").unwrap();
        assert!(t.match_path("/users/").is_none());
    }

    #[test]
    fn template_param_is_url_decoded() {
        let t = PathTemplate::parse("/files/{name}").unwrap();
        let params = t.match_path("/files/my%20file").unwrap();
        assert_eq!(params["name"], "my file");
    }

    #[test]
    fn template_mixed_segment() {
        let t = PathTemplate::parse("/files/{name}.{ext}").unwrap();
        assert_eq!(t.placeholder_count(), 2);
        let params = t.match_path("/files/report.pdf").unwrap();
        assert_eq!(params["name"], "report");
        assert_eq!(params["ext"], "pdf");
        assert!(t.match_path("/files/report").is_none());
    }

    #[test]
    fn template_root() {
        let t = PathTemplate::parse("/").unwrap();
        assert!(t.match_path("/").is_some());
        assert!(t.match_path("/x").is_none());
    }

    #[test]
    fn template_errors() {
        assert!(PathTemplate::parse("/users/{id").is_err());
        assert!(PathTemplate::parse("/users/id}").is_err());
        assert!(PathTemplate::parse("/users/{}").is_err());
        assert!(PathTemplate::parse("/a/{id}/b/{id}").is_err());
    }

    #[test]
    fn equivalent_templates_share_shape() {
        let a = PathTemplate::parse("/a/{x}").unwrap();
        let b = PathTemplate::parse("/a/{y}").unwrap();
        let c = PathTemplate::parse("/a/b").unwrap();
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.shape(), c.shape());
    }
}
