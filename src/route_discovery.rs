use crate::annotation::{Annotation, AnnotationExtractor};
use crate::config::{Config, RouteDiscoveryConfig};
use crate::parser::AstParser;
use crate::route_table::{HandlerAction, HostRoute, HttpMethod, RouteTable};
use crate::type_resolver::TypeResolver;
use indexmap::IndexMap;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Handler types under this path belong to the generator itself.
pub const RESERVED_NAMESPACE: &str = "openapi_from_annotations::";

/// Method used for type-only actions.
pub const INVOKE_METHOD: &str = "invoke";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([^}?]+)\??\}").expect("placeholder pattern is valid")
});

static STATIC_ASSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\.(js|css|map|png|jpe?g|gif|svg|ico|webp|bmp|woff2?|ttf|eot|otf|pdf|docx?|xlsx?|pptx?|txt|csv|xml|zip|gz|tar|mp3|mp4|webm)$",
    )
    .expect("asset pattern is valid")
});

/// The type and method a route dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    /// Qualified path when the type is known to the source index, else as written
    pub type_name: String,
    pub method: String,
}

/// One documented endpoint for one HTTP method.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub method: HttpMethod,
    pub uri: String,
    /// Path parameter names in URI order
    pub parameters: Vec<String>,
    /// parameter name -> constraint pattern
    pub wheres: IndexMap<String, String>,
    pub middleware: Vec<String>,
    pub handler: Option<Handler>,
    pub name: Option<String>,
    pub method_annotations: Vec<Annotation>,
    pub type_annotations: Vec<Annotation>,
}

impl RouteDescriptor {
    /// A bare descriptor, for host code assembling routes by hand.
    pub fn new(method: HttpMethod, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self {
            method,
            parameters: placeholder_names(&uri),
            uri,
            wheres: IndexMap::new(),
            middleware: Vec::new(),
            handler: None,
            name: None,
            method_annotations: Vec::new(),
            type_annotations: Vec::new(),
        }
    }

    pub fn with_handler(mut self, type_name: impl Into<String>, method: impl Into<String>) -> Self {
        self.handler = Some(Handler {
            type_name: type_name.into(),
            method: method.into(),
        });
        self
    }

    /// URI with a single leading slash, as used for path keys.
    pub fn path(&self) -> String {
        format!("/{}", self.uri.trim_start_matches('/'))
    }
}

/// Turns the host route table into route descriptors.
pub struct RouteDiscovery<'a> {
    table: &'a dyn RouteTable,
    config: &'a Config,
}

impl<'a> RouteDiscovery<'a> {
    pub fn new(table: &'a dyn RouteTable, config: &'a Config) -> Self {
        Self { table, config }
    }

    /// Indexes the configured source root and discovers routes against it.
    pub fn discover(&self) -> Vec<RouteDescriptor> {
        let root = self.config.source_root();
        let files = match AstParser::parse_dir(&root, &self.config.discovery.root_namespace) {
            Ok(set) => {
                for warning in &set.warnings {
                    debug!("{}", warning);
                }
                set.files
            }
            Err(e) => {
                warn!("Failed to index sources under {}: {:#}", root.display(), e);
                Vec::new()
            }
        };
        self.discover_with(&TypeResolver::new(&files))
    }

    pub fn discover_with(&self, resolver: &TypeResolver) -> Vec<RouteDescriptor> {
        let filters = RouteFilters::new(&self.config.discovery.routes, self.config);
        let mut type_annotations: HashMap<String, Vec<Annotation>> = HashMap::new();
        let mut descriptors = Vec::new();

        let routes = self.table.routes();
        info!("Discovering routes among {} host routes", routes.len());

        for route in routes {
            let Some(handler) = resolve_handler(&route, resolver) else {
                debug!("Skipping {}: no named handler", route.uri);
                continue;
            };
            if !filters.accepts(&route, &handler) {
                continue;
            }

            let owner = resolver.find(&handler.type_name);
            let handler = Handler {
                type_name: owner
                    .map(|entry| entry.qualified_name.clone())
                    .unwrap_or(handler.type_name),
                method: handler.method,
            };
            if owner.is_none() {
                debug!("Handler type {} is not in the source index", handler.type_name);
            }

            let type_annotations = type_annotations
                .entry(handler.type_name.clone())
                .or_insert_with(|| match owner {
                    Some(entry) => AnnotationExtractor::extract_attributes(
                        &entry.attrs,
                        &format!("type {}", entry.qualified_name),
                    ),
                    None => Vec::new(),
                })
                .clone();
            let method_annotations = owner
                .and_then(|entry| entry.find_method(&handler.method))
                .map(|method| {
                    AnnotationExtractor::extract_attributes(
                        &method.attrs,
                        &format!("method {}::{}", handler.type_name, method.name),
                    )
                })
                .unwrap_or_default();

            let parameters = route
                .compiled_parameters
                .clone()
                .unwrap_or_else(|| placeholder_names(&route.uri));

            let has_get = route.methods.contains(&HttpMethod::Get);
            for method in &route.methods {
                if *method == HttpMethod::Head && has_get {
                    continue;
                }
                debug!("Discovered route {} {} -> {}::{}", method, route.uri, handler.type_name, handler.method);
                descriptors.push(RouteDescriptor {
                    method: *method,
                    uri: route.uri.clone(),
                    parameters: parameters.clone(),
                    wheres: route.wheres.clone(),
                    middleware: route.middleware.clone(),
                    handler: Some(handler.clone()),
                    name: route.name.clone(),
                    method_annotations: method_annotations.clone(),
                    type_annotations: type_annotations.clone(),
                });
            }
        }

        info!("Discovered {} documented routes", descriptors.len());
        descriptors
    }
}

fn resolve_handler(route: &HostRoute, resolver: &TypeResolver) -> Option<Handler> {
    let handler = |type_name: &str, method: &str| Handler {
        type_name: type_name.trim().to_string(),
        method: method.trim().to_string(),
    };
    match route.action.as_ref()? {
        HandlerAction::Reference(reference) => match reference.split_once('@') {
            Some((type_name, method)) if !type_name.is_empty() && !method.is_empty() => {
                Some(handler(type_name, method))
            }
            Some(_) => None,
            None if reference.trim().is_empty() => None,
            None => Some(handler(reference, INVOKE_METHOD)),
        },
        HandlerAction::Pair(type_name, method) if !type_name.is_empty() && !method.is_empty() => {
            Some(handler(type_name, method))
        }
        HandlerAction::Pair(..) => None,
        HandlerAction::Function(name) => resolver
            .find_function(name)
            .map(|(owner, method)| handler(&owner.qualified_name, &method.name)),
    }
}

/// `{task}` and `{task?}` placeholder names in URI order.
pub fn placeholder_names(uri: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(uri)
        .map(|c| c[1].trim().to_string())
        .collect()
}

/// Translates a shell-style glob (`*`, `?`) into an anchored regex.
fn glob_to_regex(glob: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    for c in glob.trim_start_matches('/').chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Ignoring invalid route pattern {}: {}", glob, e);
            None
        }
    }
}

struct RouteFilters<'a> {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    api_prefix: &'a str,
    middleware: &'a [String],
    reserved_uris: Vec<String>,
}

impl<'a> RouteFilters<'a> {
    fn new(routes: &'a RouteDiscoveryConfig, config: &Config) -> Self {
        Self {
            include: routes.include_patterns.iter().filter_map(|g| glob_to_regex(g)).collect(),
            exclude: routes.exclude_patterns.iter().filter_map(|g| glob_to_regex(g)).collect(),
            api_prefix: routes.api_prefix.trim_matches('/'),
            middleware: &routes.middleware_filters,
            reserved_uris: config.paths.reserved_uris(),
        }
    }

    fn accepts(&self, route: &HostRoute, handler: &Handler) -> bool {
        let uri = route.uri.trim_start_matches('/');

        if handler.type_name.starts_with(RESERVED_NAMESPACE)
            || self.reserved_uris.iter().any(|reserved| reserved == uri)
        {
            debug!("Skipping {}: served by the generator", route.uri);
            return false;
        }
        if self.exclude.iter().any(|glob| glob.is_match(uri)) {
            debug!("Skipping {}: excluded by pattern", route.uri);
            return false;
        }
        if STATIC_ASSET.is_match(uri) {
            debug!("Skipping {}: static asset", route.uri);
            return false;
        }

        let included = if self.include.is_empty() {
            !self.api_prefix.is_empty() && uri.split('/').any(|segment| segment == self.api_prefix)
        } else {
            self.include.iter().any(|glob| glob.is_match(uri))
        };
        if !included {
            debug!("Skipping {}: not an API route", route.uri);
            return false;
        }

        if !self.middleware.is_empty()
            && !route.middleware.iter().any(|m| self.middleware.contains(m))
        {
            debug!("Skipping {}: middleware filter", route.uri);
            return false;
        }
        true
    }
}
