use crate::route_table::HttpMethod;
use crate::schema_generator::SchemaFragment;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Version of the OpenAPI format the generated documents declare.
pub const OPENAPI_VERSION: &str = "3.0.3";

/// One security requirement set: scheme name -> scopes. All schemes in a set apply together;
/// the sets of a list are alternatives.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// uri -> method -> operation
    #[serde(default)]
    pub paths: IndexMap<String, IndexMap<String, Operation>>,
    #[serde(default)]
    pub components: Components,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl OpenApiDocument {
    pub fn operation(&self, uri: &str, method: HttpMethod) -> Option<&Operation> {
        self.paths.get(uri)?.get(method.as_str())
    }

    /// Number of operations across all paths.
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(IndexMap::len).sum()
    }
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            contact: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Server {
    pub fn default_server() -> Self {
        Self {
            url: "http://localhost".to_string(),
            description: Some("Default Server".to_string()),
        }
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
}

/// The location where a parameter value is extracted from in an HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl FromStr for ParameterLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "path" => Ok(ParameterLocation::Path),
            "cookie" => Ok(ParameterLocation::Cookie),
            other => Err(format!("unknown parameter location `{}`", other)),
        }
    }
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<IndexMap<String, Value>>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaFragment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<IndexMap<String, Value>>,
}

impl MediaType {
    pub fn with_schema(schema: SchemaFragment) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }
}

/// OpenAPI Response object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, Header>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

impl Response {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// A response with a single `application/json` body.
    pub fn json(description: impl Into<String>, schema: SchemaFragment) -> Self {
        let mut response = Self::new(description);
        response
            .content
            .insert("application/json".to_string(), MediaType::with_schema(schema));
        response
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaFragment>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Components {
    pub schemas: IndexMap<String, SchemaFragment>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub security_schemes: IndexMap<String, SecurityScheme>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub responses: IndexMap<String, Response>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "external_docs")]
    pub external_docs: Option<ExternalDocs>,
}

impl Tag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            external_docs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalDocs {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI Security Scheme object, as declared in configuration.
///
/// Every field is optional on input so that an incomplete declaration can be reported and
/// dropped instead of failing the whole configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scheme_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", alias = "location", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(alias = "bearer_format", skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flows: Option<IndexMap<String, Value>>,
    #[serde(alias = "open_id_connect_url", skip_serializing_if = "Option::is_none")]
    pub open_id_connect_url: Option<String>,
}

impl SecurityScheme {
    /// Checks the fields each scheme type requires.
    pub fn validate(&self) -> Result<(), String> {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        match self.scheme_type.as_deref() {
            Some("apiKey") => {
                if !present(&self.name) {
                    return Err("apiKey scheme requires `name`".to_string());
                }
                match self.location.as_deref() {
                    Some("query" | "header" | "cookie") => Ok(()),
                    _ => Err("apiKey scheme requires `in` (query, header or cookie)".to_string()),
                }
            }
            Some("http") if present(&self.scheme) => Ok(()),
            Some("http") => Err("http scheme requires `scheme`".to_string()),
            Some("oauth2") if self.flows.as_ref().is_some_and(|f| !f.is_empty()) => Ok(()),
            Some("oauth2") => Err("oauth2 scheme requires at least one flow".to_string()),
            Some("openIdConnect") if present(&self.open_id_connect_url) => Ok(()),
            Some("openIdConnect") => {
                Err("openIdConnect scheme requires `openIdConnectUrl`".to_string())
            }
            Some(other) => Err(format!("unknown security scheme type `{}`", other)),
            None => Err("security scheme requires `type`".to_string()),
        }
    }
}

/// Keeps only the schemes of each requirement set that exist; sets left empty are dropped.
pub fn prune_requirements(
    requirements: &[SecurityRequirement],
    schemes: &IndexMap<String, SecurityScheme>,
) -> Vec<SecurityRequirement> {
    requirements
        .iter()
        .filter_map(|requirement| {
            let kept: SecurityRequirement = requirement
                .iter()
                .filter(|(name, _)| {
                    let known = schemes.contains_key(*name);
                    if !known {
                        warn!("Dropping security requirement on unknown scheme `{}`", name);
                    }
                    known
                })
                .map(|(name, scopes)| (name.clone(), scopes.clone()))
                .collect();
            (!kept.is_empty()).then_some(kept)
        })
        .collect()
}

/// OpenAPI document builder
pub struct OpenApiBuilder {
    info: Info,
    servers: Vec<Server>,
    paths: IndexMap<String, IndexMap<String, Operation>>,
    components: Components,
    security: Vec<SecurityRequirement>,
    tags: Vec<Tag>,
}

impl OpenApiBuilder {
    pub fn new(info: Info) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info,
            servers: Vec::new(),
            paths: IndexMap::new(),
            components: Components::default(),
            security: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_servers(mut self, servers: Vec<Server>) -> Self {
        self.servers = servers;
        self
    }

    /// Adds an operation; a later operation for the same uri and method replaces the earlier.
    pub fn add_operation(&mut self, uri: &str, method: HttpMethod, operation: Operation) {
        debug!("Adding operation: {} {}", method, uri);
        let previous = self
            .paths
            .entry(uri.to_string())
            .or_default()
            .insert(method.as_str().to_string(), operation);
        if previous.is_some() {
            debug!("Operation {} {} declared twice, keeping the last", method, uri);
        }
    }

    /// Adds a component schema; the first schema registered under a name is kept.
    pub fn add_schema(&mut self, name: impl Into<String>, schema: SchemaFragment) {
        let name = name.into();
        if self.components.schemas.contains_key(&name) {
            warn!("Schema `{}` is already defined, ignoring the later definition", name);
            return;
        }
        self.components.schemas.insert(name, schema);
    }

    pub fn add_security_scheme(&mut self, name: impl Into<String>, scheme: SecurityScheme) {
        self.components.security_schemes.insert(name.into(), scheme);
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: Parameter) {
        self.components.parameters.insert(name.into(), parameter);
    }

    pub fn add_response(&mut self, name: impl Into<String>, response: Response) {
        self.components.responses.insert(name.into(), response);
    }

    pub fn security_schemes(&self) -> &IndexMap<String, SecurityScheme> {
        &self.components.security_schemes
    }

    pub fn set_security(&mut self, security: Vec<SecurityRequirement>) {
        self.security = security;
    }

    /// Adds a tag unless one with the same name exists. The first occurrence keeps its
    /// description and external docs; they are only filled in when it had none.
    pub fn add_tag(&mut self, tag: Tag) {
        match self.tags.iter_mut().find(|t| t.name == tag.name) {
            Some(existing) => {
                if existing.description.is_none() {
                    existing.description = tag.description;
                }
                if existing.external_docs.is_none() {
                    existing.external_docs = tag.external_docs;
                }
            }
            None => self.tags.push(tag),
        }
    }

    /// Build the final OpenAPI document
    pub fn build(self) -> OpenApiDocument {
        debug!(
            "Building OpenAPI document with {} paths and {} schemas",
            self.paths.len(),
            self.components.schemas.len()
        );

        let servers = if self.servers.is_empty() {
            vec![Server::default_server()]
        } else {
            self.servers
        };

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info,
            servers,
            paths: self.paths,
            components: self.components,
            security: self.security,
            tags: self.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_generator::Schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn operation_with_default() -> Operation {
        let mut operation = Operation::default();
        operation
            .responses
            .insert("default".to_string(), Response::new("Unexpected error"));
        operation
    }

    #[test]
    fn test_new_builder_defaults() {
        let document = OpenApiBuilder::new(Info::default()).build();

        assert_eq!(document.openapi, "3.0.3");
        assert_eq!(document.info.title, "API");
        assert_eq!(document.info.version, "1.0.0");
        assert_eq!(document.servers, vec![Server::default_server()]);
        assert!(document.paths.is_empty());

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["components"], json!({"schemas": {}}));
        assert!(value.get("tags").is_none());
        assert!(value.get("security").is_none());
    }

    #[test]
    fn test_operations_grouped_by_path() {
        let mut builder = OpenApiBuilder::new(Info::default());
        builder.add_operation("/api/tasks", HttpMethod::Get, operation_with_default());
        builder.add_operation("/api/tasks", HttpMethod::Post, operation_with_default());
        builder.add_operation("/api/tasks/{task}", HttpMethod::Delete, operation_with_default());

        let document = builder.build();
        assert_eq!(document.paths.len(), 2);
        assert_eq!(document.operation_count(), 3);
        let methods: Vec<_> = document.paths["/api/tasks"].keys().cloned().collect();
        assert_eq!(methods, vec!["get", "post"]);
        assert!(document
            .operation("/api/tasks/{task}", HttpMethod::Delete)
            .is_some());
    }

    #[test]
    fn test_schema_name_collision_keeps_first() {
        let mut builder = OpenApiBuilder::new(Info::default());
        builder.add_schema("Task", Schema::typed("object").into());
        builder.add_schema("Task", Schema::typed("string").into());

        let document = builder.build();
        assert_eq!(document.components.schemas.len(), 1);
        assert_eq!(
            serde_json::to_value(&document.components.schemas["Task"]).unwrap(),
            json!({"type": "object"})
        );
    }

    #[test]
    fn test_tag_deduplication_keeps_first_description() {
        let mut builder = OpenApiBuilder::new(Info::default());
        builder.add_tag(Tag {
            description: Some("Task management".to_string()),
            ..Tag::named("Tasks")
        });
        builder.add_tag(Tag {
            description: Some("Other description".to_string()),
            ..Tag::named("Tasks")
        });
        builder.add_tag(Tag::named("Users"));
        builder.add_tag(Tag {
            description: Some("User accounts".to_string()),
            ..Tag::named("Users")
        });

        let document = builder.build();
        assert_eq!(document.tags.len(), 2);
        assert_eq!(document.tags[0].description.as_deref(), Some("Task management"));
        assert_eq!(document.tags[1].description.as_deref(), Some("User accounts"));
    }

    #[test]
    fn test_security_scheme_validation() {
        let scheme = |value: Value| serde_json::from_value::<SecurityScheme>(value).unwrap();

        assert!(scheme(json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}))
            .validate()
            .is_ok());
        assert!(scheme(json!({"type": "http"})).validate().is_err());
        assert!(scheme(json!({"type": "apiKey", "name": "X-API-KEY", "in": "header"}))
            .validate()
            .is_ok());
        assert!(scheme(json!({"type": "apiKey", "name": "X-API-KEY"})).validate().is_err());
        assert!(scheme(json!({"type": "apiKey", "in": "body", "name": "k"})).validate().is_err());
        assert!(scheme(json!({
            "type": "oauth2",
            "flows": {"password": {"tokenUrl": "/oauth/token", "scopes": {}}}
        }))
        .validate()
        .is_ok());
        assert!(scheme(json!({"type": "oauth2", "flows": {}})).validate().is_err());
        assert!(scheme(json!({"type": "openIdConnect"})).validate().is_err());
        assert!(scheme(json!({
            "type": "openIdConnect",
            "open_id_connect_url": "https://example.com/.well-known/openid-configuration"
        }))
        .validate()
        .is_ok());
        assert!(scheme(json!({"type": "mutualTLS"})).validate().is_err());
        assert!(scheme(json!({})).validate().is_err());
    }

    #[test]
    fn test_prune_requirements() {
        let mut schemes = IndexMap::new();
        schemes.insert("bearer".to_string(), SecurityScheme::default());

        let requirements: Vec<SecurityRequirement> = serde_json::from_value(json!([
            {"bearer": []},
            {"passport": ["read"]},
            {"bearer": [], "apiKey": []}
        ]))
        .unwrap();

        let pruned = prune_requirements(&requirements, &schemes);
        assert_eq!(
            serde_json::to_value(&pruned).unwrap(),
            json!([{"bearer": []}, {"bearer": []}])
        );
    }

    #[test]
    fn test_response_and_parameter_serialization() {
        let response = Response::json(
            "Task found",
            SchemaFragment::reference("#/components/schemas/Task"),
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "description": "Task found",
                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Task"}}}
            })
        );

        let parameter = Parameter {
            name: "task".to_string(),
            location: ParameterLocation::Path,
            description: None,
            required: true,
            deprecated: None,
            schema: Some(Schema::typed("integer").into()),
            example: None,
            examples: None,
        };
        assert_eq!(
            serde_json::to_value(&parameter).unwrap(),
            json!({"name": "task", "in": "path", "required": true, "schema": {"type": "integer"}})
        );
        assert_eq!("Header".parse::<ParameterLocation>(), Ok(ParameterLocation::Header));
        assert!("body".parse::<ParameterLocation>().is_err());
    }
}
