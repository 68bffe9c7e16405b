//! Generator configuration.
//!
//! Loaded once per run and passed explicitly into discovery and generation. Every section has
//! defaults, so an empty file (or no file at all) is a valid configuration.
//!
//! ```yaml
//! info:
//!   title: Task API
//!   version: 2.1.0
//! discovery:
//!   routes:
//!     include_patterns: ["api/*"]
//!     exclude_patterns: ["api/internal/*"]
//!   models:
//!     directories: [src/models]
//! security_schemes:
//!   bearer: { type: http, scheme: bearer, bearerFormat: JWT }
//! security:
//!   - bearer: []
//! ```

use crate::error::{Error, Result};
use crate::openapi_builder::{
    Info, Parameter, Response, SecurityRequirement, SecurityScheme, Server, Tag,
};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub info: Info,
    pub servers: Vec<Server>,
    pub discovery: DiscoveryConfig,
    pub generation: GenerationConfig,
    #[serde(alias = "securitySchemes", deserialize_with = "deserialize_schemes")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
    pub security: Vec<SecurityRequirement>,
    pub parameters: IndexMap<String, Parameter>,
    pub responses: IndexMap<String, Response>,
    pub tags: Vec<Tag>,
    pub paths: PathsConfig,
    /// Directory relative paths resolve against; set by [`Config::with_project_root`].
    #[serde(skip)]
    pub project_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Root of the analyzed crate's sources
    pub source_root: PathBuf,
    /// Module path the source root maps to
    pub root_namespace: String,
    pub routes: RouteDiscoveryConfig,
    pub models: ModelDiscoveryConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("src"),
            root_namespace: "crate".to_string(),
            routes: RouteDiscoveryConfig::default(),
            models: ModelDiscoveryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteDiscoveryConfig {
    /// URI globs a route must match; empty means "contains the api prefix segment"
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub api_prefix: String,
    /// When non-empty, only routes with at least one of these middleware are kept
    pub middleware_filters: Vec<String>,
}

impl Default for RouteDiscoveryConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            api_prefix: "api".to_string(),
            middleware_filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelDiscoveryConfig {
    pub directories: Vec<PathBuf>,
    /// Qualified or short names of models to leave out
    pub exclude_classes: Vec<String>,
}

impl Default for ModelDiscoveryConfig {
    fn default() -> Self {
        Self {
            directories: vec![PathBuf::from("src/models")],
            exclude_classes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Keep fields listed in a model's `hidden` list
    pub include_hidden_fields: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub json_route_path: String,
    pub yaml_route_path: String,
    pub ui_route: String,
    pub output_directory: Option<PathBuf>,
    pub output_filename: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            json_route_path: "/openapi.json".to_string(),
            yaml_route_path: "/openapi.yaml".to_string(),
            ui_route: "/api-docs".to_string(),
            output_directory: None,
            output_filename: "openapi".to_string(),
        }
    }
}

/// Converts each security scheme on its own; a malformed entry is dropped instead of failing
/// the whole file.
fn deserialize_schemes<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, SecurityScheme>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<String, Value>::deserialize(deserializer)?;
    let mut schemes = IndexMap::with_capacity(raw.len());
    for (name, value) in raw {
        match serde_json::from_value::<SecurityScheme>(value) {
            Ok(scheme) => {
                schemes.insert(name, scheme);
            }
            Err(e) => warn!("Dropping security scheme `{}`: {}", name, e),
        }
    }
    Ok(schemes)
}

impl PathsConfig {
    /// URIs the generator itself serves, without leading slash.
    pub fn reserved_uris(&self) -> Vec<String> {
        [&self.json_route_path, &self.yaml_route_path, &self.ui_route]
            .iter()
            .map(|uri| uri.trim_start_matches('/').to_string())
            .filter(|uri| !uri.is_empty())
            .collect()
    }
}

impl Config {
    /// Loads a configuration file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else if content.trim().is_empty() {
            Ok(Config::default())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };

        let config = config.map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Resolves a configured path against the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.project_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn source_root(&self) -> PathBuf {
        self.resolve_path(&self.discovery.source_root)
    }

    pub fn model_directories(&self) -> Vec<PathBuf> {
        self.discovery
            .models
            .directories
            .iter()
            .map(|dir| self.resolve_path(dir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.info.title, "API");
        assert_eq!(config.info.version, "1.0.0");
        assert_eq!(config.discovery.routes.api_prefix, "api");
        assert!(config.discovery.routes.include_patterns.is_empty());
        assert_eq!(config.discovery.models.directories, vec![PathBuf::from("src/models")]);
        assert!(!config.generation.include_hidden_fields);
        assert_eq!(
            config.paths.reserved_uris(),
            vec!["openapi.json", "openapi.yaml", "api-docs"]
        );
    }

    #[test]
    fn test_yaml_partial_sections_keep_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("openapi.yaml");
        fs::write(
            &path,
            r#"
info:
  title: Task API
discovery:
  routes:
    exclude_patterns: ["api/internal/*"]
security_schemes:
  bearer:
    type: http
    scheme: bearer
    bearerFormat: JWT
security:
  - bearer: []
tags:
  - name: Tasks
    description: Task management
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.info.title, "Task API");
        assert_eq!(config.info.version, "1.0.0");
        assert_eq!(config.discovery.routes.api_prefix, "api");
        assert_eq!(config.discovery.routes.exclude_patterns, vec!["api/internal/*"]);
        assert_eq!(
            config.security_schemes["bearer"].bearer_format.as_deref(),
            Some("JWT")
        );
        assert_eq!(config.security.len(), 1);
        assert_eq!(config.tags[0].name, "Tasks");
    }

    #[test]
    fn test_json_config_and_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("openapi.json");
        fs::write(&path, r#"{"generation": {"include_hidden_fields": true}}"#).unwrap();
        assert!(Config::from_file(&path).unwrap().generation.include_hidden_fields);

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::from_file(&path), Err(Error::Config { .. })));

        let missing = temp_dir.path().join("missing.yaml");
        assert!(matches!(Config::from_file(&missing), Err(Error::Io(_))));
    }

    #[test]
    fn test_malformed_security_scheme_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("openapi.yaml");
        fs::write(
            &path,
            r#"
info:
  title: Task API
security_schemes:
  bearer: { type: http, scheme: bearer }
  broken: { type: oauth2, flows: nope }
security:
  - bearer: []
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        let names: Vec<_> = config.security_schemes.keys().cloned().collect();
        assert_eq!(names, vec!["bearer"]);
        assert_eq!(config.info.title, "Task API");
        assert_eq!(config.security.len(), 1);
    }

    #[test]
    fn test_paths_resolve_against_project_root() {
        let config = Config::default().with_project_root("/srv/app");
        assert_eq!(config.source_root(), PathBuf::from("/srv/app/src"));
        assert_eq!(
            config.model_directories(),
            vec![PathBuf::from("/srv/app/src/models")]
        );
        assert_eq!(
            config.resolve_path(Path::new("/abs/models")),
            PathBuf::from("/abs/models")
        );
    }
}
