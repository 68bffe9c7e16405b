//! Per-route operation assembly.
//!
//! An operation starts from what the handler declares explicitly and is then completed step by
//! step from naming conventions. Every step only fills what is still missing, so an explicit
//! `#[operation(summary = "..")]` always survives.

use crate::annotation::{
    AnnotationsExt, MediaTypeDecl, ParameterDecl, RequestBodyDecl, ResponseDecl, SecurityDecl,
};
use crate::model_discovery::ModelDescriptor;
use crate::naming::{capitalize, lower_words, pluralize, resource_tag, resource_words, same_identifier};
use crate::openapi_builder::{
    prune_requirements, ExternalDocs, Header, MediaType, Operation, Parameter, ParameterLocation,
    RequestBody, Response, SecurityRequirement, SecurityScheme, Tag,
};
use crate::route_discovery::{RouteDescriptor, INVOKE_METHOD};
use crate::route_table::HttpMethod;
use crate::schema_generator::{dedup, Schema, SchemaFragment, SchemaGenerator};
use indexmap::IndexMap;
use log::debug;
use serde_json::json;

const JSON: &str = "application/json";

/// Conventional meaning of a handler method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    List,
    Show,
    Create,
    Update,
    Delete,
    Other(String),
}

impl Verb {
    /// Classifies a handler method; type-only handlers use the HTTP method instead.
    pub fn classify(method: &str, http_method: HttpMethod) -> Self {
        let method = if method == INVOKE_METHOD {
            http_method.as_str()
        } else {
            method
        };
        match method {
            "index" | "list" => Verb::List,
            "show" | "get" => Verb::Show,
            "store" | "create" => Verb::Create,
            "update" => Verb::Update,
            "destroy" | "delete" => Verb::Delete,
            other => Verb::Other(other.to_string()),
        }
    }
}

/// Facts about the route shared by the fill steps.
struct RouteFacts<'r> {
    route: &'r RouteDescriptor,
    verb: Option<Verb>,
    /// Singular resource words, e.g. `user profile`
    resource: Option<String>,
    model: Option<&'r ModelDescriptor>,
}

/// Builds one operation object per route descriptor.
pub struct OperationBuilder<'a> {
    schemas: &'a SchemaGenerator<'a>,
    models: &'a [ModelDescriptor],
    security_schemes: &'a IndexMap<String, SecurityScheme>,
}

impl<'a> OperationBuilder<'a> {
    pub fn new(
        schemas: &'a SchemaGenerator<'a>,
        models: &'a [ModelDescriptor],
        security_schemes: &'a IndexMap<String, SecurityScheme>,
    ) -> Self {
        Self {
            schemas,
            models,
            security_schemes,
        }
    }

    /// A hidden handler method or handler type keeps the route out of the document.
    pub fn is_hidden(route: &RouteDescriptor) -> bool {
        route.method_annotations.is_hidden() || route.type_annotations.is_hidden()
    }

    /// Tag objects a route contributes, in declaration order.
    pub fn route_tags(route: &RouteDescriptor) -> Vec<Tag> {
        if Self::is_hidden(route) {
            return Vec::new();
        }

        let groups = route
            .type_annotations
            .api_groups()
            .into_iter()
            .chain(route.method_annotations.api_groups())
            .map(|group| Tag {
                name: group.name.clone(),
                description: group.description.clone(),
                external_docs: group.external_docs.as_ref().map(|url| ExternalDocs {
                    url: url.clone(),
                    description: None,
                }),
            });

        let declared = route
            .method_annotations
            .operation()
            .and_then(|op| op.tags.clone())
            .unwrap_or_default()
            .into_iter()
            .map(Tag::named);

        groups.chain(declared).collect()
    }

    /// Assembles the operation, or `None` for hidden routes.
    pub fn build(&self, route: &RouteDescriptor) -> Option<Operation> {
        if Self::is_hidden(route) {
            debug!("Skipping hidden route {} {}", route.method, route.uri);
            return None;
        }

        let facts = self.facts(route);
        let mut operation = Operation::default();

        self.apply_declaration(&mut operation, &facts);
        self.fill_tags(&mut operation, &facts);
        self.fill_identity(&mut operation, &facts);
        self.fill_parameters(&mut operation, &facts);
        self.fill_request_body(&mut operation, &facts);
        self.fill_responses(&mut operation, &facts);
        self.fill_security(&mut operation, &facts);

        Some(operation)
    }

    fn facts<'r>(&self, route: &'r RouteDescriptor) -> RouteFacts<'r>
    where
        'a: 'r,
    {
        let verb = route
            .handler
            .as_ref()
            .map(|h| Verb::classify(&h.method, route.method));
        let resource = route
            .handler
            .as_ref()
            .map(|h| resource_words(&h.type_name))
            .filter(|r| !r.is_empty());
        let model = resource.as_deref().and_then(|resource| {
            self.models
                .iter()
                .find(|model| same_identifier(&model.name, resource))
        });

        RouteFacts {
            route,
            verb,
            resource,
            model,
        }
    }

    /// Copies what `#[operation(..)]` declares.
    fn apply_declaration(&self, operation: &mut Operation, facts: &RouteFacts) {
        let Some(decl) = facts.route.method_annotations.operation() else {
            return;
        };
        operation.summary = decl.summary.clone().filter(|s| !s.is_empty());
        operation.description = decl.description.clone().filter(|s| !s.is_empty());
        operation.operation_id = decl.operation_id.clone().filter(|s| !s.is_empty());
        if decl.deprecated == Some(true) {
            operation.deprecated = Some(true);
        }
        operation.security = decl.security.clone().filter(|s| !s.is_empty());
    }

    /// Group names followed by declared tags; the resource name when there are none.
    fn fill_tags(&self, operation: &mut Operation, facts: &RouteFacts) {
        let route = facts.route;
        let declared = route
            .method_annotations
            .operation()
            .and_then(|op| op.tags.clone())
            .unwrap_or_default();
        let names = route
            .type_annotations
            .api_groups()
            .into_iter()
            .chain(route.method_annotations.api_groups())
            .map(|group| group.name.clone())
            .chain(declared);
        operation.tags = dedup(names);

        if operation.tags.is_empty() {
            if let Some(handler) = &route.handler {
                let tag = resource_tag(&handler.type_name);
                if !tag.is_empty() {
                    operation.tags.push(tag);
                }
            }
        }
    }

    fn fill_identity(&self, operation: &mut Operation, facts: &RouteFacts) {
        let route = facts.route;
        if operation.operation_id.is_none() {
            operation.operation_id = Some(match &route.name {
                Some(name) => name.clone(),
                None => operation_id_for(route.method, &route.path()),
            });
        }

        if operation.summary.is_some() && operation.description.is_some() {
            return;
        }
        let (summary, description) = match (&facts.verb, &facts.resource) {
            (Some(verb), Some(resource)) => describe(verb, resource),
            _ => {
                let path = route.path();
                (
                    format!("{} {}", capitalize(route.method.as_str()), path),
                    format!("Endpoint for {}", path),
                )
            }
        };
        if operation.summary.is_none() {
            operation.summary = Some(summary);
        }
        if operation.description.is_none() {
            operation.description = Some(description);
        }
    }

    /// Declared parameters, then path parameters and list query parameters not declared.
    fn fill_parameters(&self, operation: &mut Operation, facts: &RouteFacts) {
        let route = facts.route;
        operation.parameters = route
            .method_annotations
            .parameters()
            .into_iter()
            .map(|decl| self.parameter_from_decl(decl))
            .collect();

        let mut discovered = Vec::new();
        for name in &route.parameters {
            let schema = path_parameter_schema(route.wheres.get(name).map(String::as_str));
            discovered.push(Parameter {
                name: name.clone(),
                location: ParameterLocation::Path,
                description: Some(format!("The {} parameter", name.replace('_', " "))),
                required: true,
                deprecated: None,
                schema: Some(SchemaFragment::inline(schema)),
                example: None,
                examples: None,
            });
        }
        if facts.verb == Some(Verb::List) {
            discovered.extend(pagination_parameters());
        }

        for parameter in discovered {
            let declared = operation
                .parameters
                .iter()
                .any(|p| p.name == parameter.name && p.location == parameter.location);
            if !declared {
                operation.parameters.push(parameter);
            }
        }
    }

    fn parameter_from_decl(&self, decl: &ParameterDecl) -> Parameter {
        Parameter {
            name: decl.name.clone(),
            location: decl.location,
            description: decl.description.clone(),
            required: decl
                .required
                .unwrap_or(decl.location == ParameterLocation::Path),
            deprecated: decl.deprecated,
            schema: decl
                .schema
                .as_ref()
                .map(|schema| self.schemas.build_schema_decl(schema)),
            example: decl.example.clone(),
            examples: decl.examples.clone(),
        }
    }

    fn fill_request_body(&self, operation: &mut Operation, facts: &RouteFacts) {
        if let Some(decl) = facts.route.method_annotations.request_body() {
            operation.request_body = Some(self.request_body_from_decl(decl));
            return;
        }

        let method = facts.route.method;
        if !matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch) {
            return;
        }
        let Some(resource) = &facts.resource else {
            return;
        };

        let schema = match facts.model {
            Some(model) => self.model_reference(model),
            None => {
                let label = capitalize(resource);
                let mut properties = IndexMap::new();
                properties.insert(
                    "name".to_string(),
                    Schema::typed("string")
                        .with_description(format!("{} name", label))
                        .into(),
                );
                properties.insert(
                    "description".to_string(),
                    Schema::typed("string")
                        .with_description(format!("{} description", label))
                        .into(),
                );
                SchemaFragment::inline(Schema::object(properties))
            }
        };

        let (description, required) = match (&facts.verb, method) {
            (Some(Verb::Update), _) => (format!("Update an existing {}", resource), false),
            (Some(Verb::Create), _) | (_, HttpMethod::Post) => {
                (format!("Create a new {}", resource), true)
            }
            _ => (format!("{} information", capitalize(resource)), true),
        };

        let mut content = IndexMap::new();
        content.insert(JSON.to_string(), MediaType::with_schema(schema));
        operation.request_body = Some(RequestBody {
            description: Some(description),
            required,
            content,
        });
    }

    fn request_body_from_decl(&self, decl: &RequestBodyDecl) -> RequestBody {
        let content = if !decl.content.is_empty() {
            self.content_from_decls(&decl.content)
        } else if let Some(fragment) = decl.reference.as_deref().and_then(|r| self.schemas.reference(r)) {
            IndexMap::from([(JSON.to_string(), MediaType::with_schema(fragment))])
        } else if !decl.properties.is_empty() {
            let schema = self.schemas.build_object(&decl.properties);
            IndexMap::from([(JSON.to_string(), MediaType::with_schema(schema))])
        } else {
            IndexMap::new()
        };

        RequestBody {
            description: decl.description.clone(),
            required: decl.required.unwrap_or(true),
            content,
        }
    }

    fn content_from_decls(&self, decls: &[MediaTypeDecl]) -> IndexMap<String, MediaType> {
        decls
            .iter()
            .map(|decl| {
                let media_type = MediaType {
                    schema: decl
                        .schema
                        .as_ref()
                        .map(|schema| self.schemas.build_schema_decl(schema)),
                    example: decl.example.clone(),
                    examples: decl.examples.clone(),
                };
                (decl.media_type.clone(), media_type)
            })
            .collect()
    }

    fn response_from_decl(&self, decl: &ResponseDecl) -> Response {
        let description = decl
            .description
            .clone()
            .unwrap_or_else(|| format!("Response {}", decl.status));
        let mut response = Response::new(description);

        if !decl.content.is_empty() {
            response.content = self.content_from_decls(&decl.content);
        } else if let Some(fragment) = decl.reference.as_deref().and_then(|r| self.schemas.reference(r)) {
            response.content.insert(JSON.to_string(), MediaType::with_schema(fragment));
        } else if !decl.properties.is_empty() {
            let schema = self.schemas.build_object(&decl.properties);
            response.content.insert(JSON.to_string(), MediaType::with_schema(schema));
        }

        response.headers = decl
            .headers
            .iter()
            .map(|(name, description)| {
                let header = Header {
                    description: Some(description.clone()),
                    schema: Some(Schema::typed("string").into()),
                };
                (name.clone(), header)
            })
            .collect();
        response
    }

    fn fill_responses(&self, operation: &mut Operation, facts: &RouteFacts) {
        let declared = facts.route.method_annotations.responses();
        if !declared.is_empty() {
            for decl in declared {
                operation
                    .responses
                    .insert(decl.status.clone(), self.response_from_decl(decl));
            }
            return;
        }
        operation.responses = self.synthesize_responses(facts);
    }

    fn synthesize_responses(&self, facts: &RouteFacts) -> IndexMap<String, Response> {
        let route = facts.route;
        let resource = facts.resource.as_ref().map(|name| match facts.model {
            Some(model) => self.model_reference(model),
            None => generic_resource_schema(name),
        });
        let object = || SchemaFragment::inline(Schema::typed("object"));

        let mut responses = IndexMap::new();
        match route.method {
            HttpMethod::Get if facts.verb == Some(Verb::List) => {
                let items = resource.unwrap_or_else(object);
                responses.insert(
                    "200".to_string(),
                    Response::json("A paginated list of resources", paginated_schema(items)),
                );
            }
            HttpMethod::Get if route.uri.contains('{') => {
                responses.insert(
                    "200".to_string(),
                    Response::json("The requested resource", resource.unwrap_or_else(object)),
                );
                responses.insert("404".to_string(), not_found());
            }
            HttpMethod::Get => {
                responses.insert("200".to_string(), Response::json("Successful response", object()));
            }
            HttpMethod::Post => {
                let created = resource.unwrap_or_else(|| {
                    SchemaFragment::inline(Schema::object(IndexMap::from([
                        ("id".to_string(), Schema::typed("integer").with_example(json!(1)).into()),
                        ("created_at".to_string(), Schema::formatted("string", "date-time").into()),
                        ("updated_at".to_string(), Schema::formatted("string", "date-time").into()),
                    ])))
                });
                responses.insert(
                    "201".to_string(),
                    Response::json("Resource created successfully", created),
                );
                responses.insert("422".to_string(), validation_error());
            }
            HttpMethod::Put | HttpMethod::Patch => {
                let updated = resource.unwrap_or_else(|| {
                    SchemaFragment::inline(Schema::object(IndexMap::from([
                        ("id".to_string(), Schema::typed("integer").with_example(json!(1)).into()),
                        ("updated_at".to_string(), Schema::formatted("string", "date-time").into()),
                    ])))
                });
                responses.insert(
                    "200".to_string(),
                    Response::json("Resource updated successfully", updated),
                );
                responses.insert("404".to_string(), not_found());
                responses.insert("422".to_string(), validation_error());
            }
            HttpMethod::Delete => {
                responses.insert("204".to_string(), Response::new("Resource deleted successfully"));
                responses.insert("404".to_string(), not_found());
            }
            HttpMethod::Head | HttpMethod::Options => {}
        }

        responses.insert(
            "default".to_string(),
            Response::json(
                "Unexpected error",
                message_schema("An unexpected error occurred"),
            ),
        );
        responses
    }

    /// Operation annotation, then method, then handler type, then `auth:<scheme>` middleware.
    fn fill_security(&self, operation: &mut Operation, facts: &RouteFacts) {
        let route = facts.route;
        let from_decls = |decls: Vec<&SecurityDecl>| -> Option<Vec<SecurityRequirement>> {
            let requirements: Vec<_> = decls.into_iter().map(|d| d.requirement.clone()).collect();
            (!requirements.is_empty()).then_some(requirements)
        };

        let requirements = operation
            .security
            .take()
            .or_else(|| from_decls(route.method_annotations.security()))
            .or_else(|| from_decls(route.type_annotations.security()))
            .or_else(|| {
                let from_middleware: Vec<SecurityRequirement> = route
                    .middleware
                    .iter()
                    .filter_map(|m| m.strip_prefix("auth:"))
                    .flat_map(|schemes| schemes.split(','))
                    .map(str::trim)
                    .filter(|scheme| self.security_schemes.contains_key(*scheme))
                    .map(|scheme| SecurityRequirement::from([(scheme.to_string(), Vec::new())]))
                    .collect();
                (!from_middleware.is_empty()).then_some(from_middleware)
            });

        if let Some(requirements) = requirements {
            let pruned = prune_requirements(&requirements, self.security_schemes);
            operation.security = (!pruned.is_empty()).then_some(pruned);
        }
    }

    fn model_reference(&self, model: &ModelDescriptor) -> SchemaFragment {
        self.schemas
            .reference(&model.identifier)
            .unwrap_or_else(|| SchemaFragment::inline(Schema::typed("object")))
    }
}

/// `get` + `/api/tasks/{task}` -> `get_api_tasks_task`
pub fn operation_id_for(method: HttpMethod, path: &str) -> String {
    let sanitized: String = path
        .replace('/', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    format!("{}{}", method.as_str(), sanitized)
}

fn describe(verb: &Verb, resource: &str) -> (String, String) {
    match verb {
        Verb::List => (
            format!("List all {}", pluralize(resource)),
            format!("Returns a list of {} resources.", resource),
        ),
        Verb::Show => (
            format!("Get a specific {}", resource),
            format!("Returns a specific {} resource.", resource),
        ),
        Verb::Create => (
            format!("Create a new {}", resource),
            format!("Creates a new {} resource.", resource),
        ),
        Verb::Update => (
            format!("Update a {}", resource),
            format!("Updates an existing {} resource.", resource),
        ),
        Verb::Delete => (
            format!("Delete a {}", resource),
            format!("Deletes a {} resource.", resource),
        ),
        Verb::Other(method) => {
            let words = lower_words(method);
            (
                format!("{} {}", capitalize(&words), resource),
                format!("Endpoint for {} operation on {} resource.", words, resource),
            )
        }
    }
}

/// Schema of a path parameter from its route constraint.
fn path_parameter_schema(pattern: Option<&str>) -> Schema {
    match pattern {
        None => Schema::typed("string"),
        Some(r"\d+" | "[0-9]+" | r"\d*" | "[0-9]*") => Schema::typed("integer"),
        Some(p) if p.to_lowercase().contains("uuid") => Schema::formatted("string", "uuid"),
        Some(p) => Schema {
            pattern: Some(p.to_string()),
            ..Schema::typed("string")
        },
    }
}

fn pagination_parameters() -> Vec<Parameter> {
    let query = |name: &str, description: &str, schema: Schema| Parameter {
        name: name.to_string(),
        location: ParameterLocation::Query,
        description: Some(description.to_string()),
        required: false,
        deprecated: None,
        schema: Some(schema.into()),
        example: None,
        examples: None,
    };

    vec![
        query(
            "page",
            "Page number for pagination",
            Schema {
                default: Some(json!(1)),
                ..Schema::typed("integer")
            },
        ),
        query(
            "per_page",
            "Number of items per page",
            Schema {
                default: Some(json!(15)),
                ..Schema::typed("integer")
            },
        ),
        query("sort_by", "Field to sort by", Schema::typed("string")),
        query(
            "sort_direction",
            "Direction to sort (asc or desc)",
            Schema {
                enum_values: Some(vec![json!("asc"), json!("desc")]),
                default: Some(json!("asc")),
                ..Schema::typed("string")
            },
        ),
    ]
}

fn message_schema(example: &str) -> SchemaFragment {
    SchemaFragment::inline(Schema::object(IndexMap::from([(
        "message".to_string(),
        Schema::typed("string").with_example(json!(example)).into(),
    )])))
}

fn not_found() -> Response {
    Response::json("Resource not found", message_schema("Resource not found"))
}

fn validation_error() -> Response {
    let mut schema = Schema::object(IndexMap::from([(
        "message".to_string(),
        Schema::typed("string")
            .with_example(json!("The given data was invalid."))
            .into(),
    )]));
    schema.properties.insert(
        "errors".to_string(),
        Schema::typed("object")
            .with_example(json!({"name": ["The name field is required."]}))
            .into(),
    );
    Response::json("Validation error", schema.into())
}

fn paginated_schema(items: SchemaFragment) -> SchemaFragment {
    let uri = || -> SchemaFragment { Schema::formatted("string", "uri").into() };
    let nullable_uri = || -> SchemaFragment {
        Schema {
            nullable: Some(true),
            ..Schema::formatted("string", "uri")
        }
        .into()
    };
    let integer = |example: i64| -> SchemaFragment {
        Schema::typed("integer").with_example(json!(example)).into()
    };

    let links = Schema::object(IndexMap::from([
        ("first".to_string(), uri()),
        ("last".to_string(), uri()),
        ("prev".to_string(), nullable_uri()),
        ("next".to_string(), nullable_uri()),
    ]));
    let meta = Schema::object(IndexMap::from([
        ("current_page".to_string(), integer(1)),
        ("from".to_string(), integer(1)),
        ("last_page".to_string(), integer(5)),
        ("path".to_string(), uri()),
        ("per_page".to_string(), integer(15)),
        ("to".to_string(), integer(15)),
        ("total".to_string(), integer(75)),
    ]));

    SchemaFragment::inline(Schema::object(IndexMap::from([
        ("data".to_string(), Schema::array_of(items).into()),
        ("links".to_string(), links.into()),
        ("meta".to_string(), meta.into()),
    ])))
}

/// Stand-in resource shape when no model matches the handler.
fn generic_resource_schema(resource: &str) -> SchemaFragment {
    SchemaFragment::inline(Schema::object(IndexMap::from([
        ("id".to_string(), Schema::typed("integer").with_example(json!(1)).into()),
        (
            "name".to_string(),
            Schema::typed("string")
                .with_example(json!(format!("{} name", capitalize(resource))))
                .into(),
        ),
        (
            "description".to_string(),
            Schema::typed("string")
                .with_example(json!(format!("Description of the {}", resource)))
                .into(),
        ),
        ("created_at".to_string(), Schema::formatted("string", "date-time").into()),
        ("updated_at".to_string(), Schema::formatted("string", "date-time").into()),
    ])))
}
