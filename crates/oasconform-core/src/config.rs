//! Project configuration for conformance checks

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI spec path (local file)
    #[serde(default = "default_spec")]
    pub spec: PathBuf,

    /// Assert `format` keywords (email, uuid, date-time, ...)
    #[serde(default = "default_true")]
    pub validate_formats: bool,

    /// A media type documented without a schema rejects a non-empty body
    #[serde(default = "default_true")]
    pub strict_schemaless_content: bool,

    /// Cap on violations listed in terminal output
    #[serde(default)]
    pub max_reported_violations: Option<usize>,

    /// Extra base paths accepted in front of documented path templates
    #[serde(default)]
    pub servers: Vec<String>,
}

fn default_spec() -> PathBuf {
    PathBuf::from("openapi.yaml")
}

const fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: default_spec(),
            validate_formats: true,
            strict_schemaless_content: true,
            max_reported_violations: None,
            servers: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.oasconform.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be read or parsed
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load the first config candidate found in `dir`, or defaults.
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be read or parsed
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let candidates = [".oasconform.toml", ".oasconform.json", "oasconform.toml"];

        for name in candidates {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# oasconform configuration

# OpenAPI spec (local file path, YAML or JSON, version 2 or 3)
spec = "openapi.yaml"

# Assert string formats (email, uuid, date-time, ...)
validate_formats = true

# A media type documented without a schema rejects a non-empty body
strict_schemaless_content = true

# Cap on violations listed in terminal output
# max_reported_violations = 20

# Extra base paths accepted in front of documented paths
# (in addition to basePath / servers declared in the spec)
# servers = ["/api"]
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {reason}", path = .0.display(), reason = .1)]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
