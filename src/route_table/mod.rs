//! Host route table collaborators.
//!
//! Route discovery only needs an enumerable collection of endpoints. Each table knows how to
//! produce that collection from one kind of host setup:
//!
//! - [`StaticRouteTable`]: routes registered explicitly by host code
//! - [`manifest::ManifestRouteTable`]: a YAML or JSON route manifest
//! - [`axum::AxumRouteTable`]: `Router` chains found statically in axum sources
//!
//! # Example
//!
//! ```
//! use openapi_from_annotations::route_table::{HandlerAction, HostRoute, HttpMethod, RouteTable, StaticRouteTable};
//!
//! let mut table = StaticRouteTable::new();
//! table.register(
//!     HostRoute::new(vec![HttpMethod::Get], "/api/tasks")
//!         .with_action(HandlerAction::Reference("TaskController@index".to_string())),
//! );
//! assert_eq!(table.routes().len(), 1);
//! ```

pub mod axum;
pub mod manifest;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Enumerates the endpoints of a host application.
pub trait RouteTable {
    fn routes(&self) -> Vec<HostRoute>;
}

/// HTTP methods a route can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    /// Lowercase name, as used for path item keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }

    /// Whether requests with this method usually carry a body.
    pub fn is_mutating(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            "head" => Ok(HttpMethod::Head),
            "options" => Ok(HttpMethod::Options),
            other => Err(format!("unknown HTTP method `{}`", other)),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// What a route dispatches to, in the shapes host frameworks use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerAction {
    /// `"TaskController@index"` or a type-only `"InvokableController"`
    Reference(String),
    /// `[TaskController, "index"]`, also used for `tasks::index` paths
    Pair(String, String),
    /// A bare function name, located through the source index
    Function(String),
}

/// One endpoint as the host route table describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRoute {
    pub methods: Vec<HttpMethod>,
    pub uri: String,
    /// `None` for closures and other actions without a named handler
    pub action: Option<HandlerAction>,
    pub name: Option<String>,
    pub middleware: Vec<String>,
    /// parameter name -> constraint pattern
    pub wheres: IndexMap<String, String>,
    /// Parameter names from the compiled route pattern, when the host exposes them
    pub compiled_parameters: Option<Vec<String>>,
}

impl HostRoute {
    pub fn new(methods: Vec<HttpMethod>, uri: impl Into<String>) -> Self {
        Self {
            methods,
            uri: uri.into(),
            action: None,
            name: None,
            middleware: Vec::new(),
            wheres: IndexMap::new(),
            compiled_parameters: None,
        }
    }

    pub fn with_action(mut self, action: HandlerAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_middleware(mut self, middleware: impl Into<String>) -> Self {
        self.middleware.push(middleware.into());
        self
    }

    pub fn with_where(mut self, parameter: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.wheres.insert(parameter.into(), pattern.into());
        self
    }
}

/// Routes registered explicitly by host code at startup.
#[derive(Debug, Default, Clone)]
pub struct StaticRouteTable {
    routes: Vec<HostRoute>,
}

impl StaticRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, route: HostRoute) -> &mut Self {
        self.routes.push(route);
        self
    }
}

impl RouteTable for StaticRouteTable {
    fn routes(&self) -> Vec<HostRoute> {
        self.routes.clone()
    }
}

impl From<Vec<HostRoute>> for StaticRouteTable {
    fn from(routes: Vec<HostRoute>) -> Self {
        Self { routes }
    }
}
