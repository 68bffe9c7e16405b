use super::{HandlerAction, HostRoute, HttpMethod, RouteTable};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Routes read from a manifest file.
///
/// ```yaml
/// routes:
///   - method: GET
///     uri: /api/tasks/{task}
///     action: TaskController@show
///     name: tasks.show
///     middleware: [api, "auth:bearer"]
///     where: { task: '[0-9]+' }
///   - methods: [PUT, PATCH]
///     uri: /api/tasks/{task}
///     action: [TaskController, update]
/// ```
///
/// A route without `action` stands for a closure and is dropped by discovery.
#[derive(Debug, Clone)]
pub struct ManifestRouteTable {
    routes: Vec<HostRoute>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Wrapped { routes: Vec<ManifestRoute> },
    List(Vec<ManifestRoute>),
}

#[derive(Deserialize)]
struct ManifestRoute {
    #[serde(default)]
    method: Option<HttpMethod>,
    #[serde(default)]
    methods: Vec<HttpMethod>,
    #[serde(alias = "path")]
    uri: String,
    #[serde(default)]
    action: Option<RawAction>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    middleware: Vec<String>,
    #[serde(default, rename = "where", alias = "wheres")]
    wheres: IndexMap<String, String>,
    #[serde(default)]
    parameters: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAction {
    Text(String),
    Pair(String, String),
}

impl From<RawAction> for HandlerAction {
    fn from(raw: RawAction) -> Self {
        match raw {
            RawAction::Text(text) => HandlerAction::Reference(text),
            RawAction::Pair(owner, method) => HandlerAction::Pair(owner, method),
        }
    }
}

impl ManifestRouteTable {
    /// Loads a manifest; the format follows the extension (`.json`, else YAML).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let table = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };
        let table = table.map_err(|e| match e {
            Error::Manifest { message, .. } => Error::Manifest {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        info!("Loaded {} routes from {}", table.routes.len(), path.display());
        Ok(table)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: ManifestFile = serde_yaml::from_str(content).map_err(|e| Error::Manifest {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Self::from_manifest(file)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ManifestFile = serde_json::from_str(content).map_err(|e| Error::Manifest {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Self::from_manifest(file)
    }

    fn from_manifest(file: ManifestFile) -> Result<Self> {
        let entries = match file {
            ManifestFile::Wrapped { routes } => routes,
            ManifestFile::List(routes) => routes,
        };

        let mut routes = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut methods = entry.methods;
            if let Some(method) = entry.method {
                methods.insert(0, method);
            }
            if methods.is_empty() {
                return Err(Error::Manifest {
                    path: PathBuf::new(),
                    message: format!("route {} declares no method", entry.uri),
                });
            }
            debug!("Manifest route {:?} {}", methods, entry.uri);
            routes.push(HostRoute {
                methods,
                uri: entry.uri,
                action: entry.action.map(HandlerAction::from),
                name: entry.name,
                middleware: entry.middleware,
                wheres: entry.wheres,
                compiled_parameters: entry.parameters,
            });
        }

        Ok(Self { routes })
    }
}

impl RouteTable for ManifestRouteTable {
    fn routes(&self) -> Vec<HostRoute> {
        self.routes.clone()
    }
}
