//! Document orchestration: discovery, schemas, operations, components and tags.

use crate::config::Config;
use crate::model_discovery::{ModelDescriptor, ModelDiscovery};
use crate::openapi_builder::{prune_requirements, OpenApiBuilder, OpenApiDocument};
use crate::operation::OperationBuilder;
use crate::reference::ReferenceResolver;
use crate::route_discovery::{RouteDescriptor, RouteDiscovery};
use crate::route_table::RouteTable;
use crate::schema_generator::SchemaGenerator;
use log::{debug, info, warn};

/// Produces a fresh document from the current routes and models on every call.
pub struct DocumentGenerator<'a> {
    config: &'a Config,
    routes: &'a dyn RouteTable,
}

impl<'a> DocumentGenerator<'a> {
    pub fn new(config: &'a Config, routes: &'a dyn RouteTable) -> Self {
        Self { config, routes }
    }

    pub fn generate(&self) -> OpenApiDocument {
        info!("Discovering routes...");
        let routes = RouteDiscovery::new(self.routes, self.config).discover();
        info!("Discovered {} routes", routes.len());

        info!("Discovering models...");
        let models = ModelDiscovery::new(self.config).discover(&self.config.model_directories());

        self.generate_from(&routes, &models)
    }

    /// Assembles the document from already discovered routes and models.
    pub fn generate_from(
        &self,
        routes: &[RouteDescriptor],
        models: &[ModelDescriptor],
    ) -> OpenApiDocument {
        let config = self.config;

        let mut info = config.info.clone();
        if info.contact.as_ref().is_some_and(|c| c.is_empty()) {
            info.contact = None;
        }
        let mut builder = OpenApiBuilder::new(info).with_servers(config.servers.clone());

        let resolver = ReferenceResolver::new(models.iter().map(|m| m.identifier.as_str()));
        let schemas = SchemaGenerator::new(&resolver);

        info!("Building schemas for {} models", models.len());
        for model in models {
            builder.add_schema(model.name.clone(), schemas.build_model(model));
        }

        for (name, scheme) in &config.security_schemes {
            match scheme.validate() {
                Ok(()) => builder.add_security_scheme(name.clone(), scheme.clone()),
                Err(reason) => warn!("Dropping security scheme `{}`: {}", name, reason),
            }
        }

        for (name, parameter) in &config.parameters {
            let mut parameter = parameter.clone();
            parameter.schema = parameter.schema.map(|s| resolver.resolve_fragment(s));
            builder.add_parameter(name.clone(), parameter);
        }

        for (name, response) in &config.responses {
            let mut response = response.clone();
            for media_type in response.content.values_mut() {
                media_type.schema = media_type.schema.take().map(|s| resolver.resolve_fragment(s));
            }
            for header in response.headers.values_mut() {
                header.schema = header.schema.take().map(|s| resolver.resolve_fragment(s));
            }
            builder.add_response(name.clone(), response);
        }

        let security_schemes = builder.security_schemes().clone();
        builder.set_security(prune_requirements(&config.security, &security_schemes));

        info!("Building operations for {} routes", routes.len());
        let operations = OperationBuilder::new(&schemas, models, &security_schemes);
        for route in routes {
            let Some(operation) = operations.build(route) else {
                continue;
            };
            for tag in OperationBuilder::route_tags(route) {
                builder.add_tag(tag);
            }
            builder.add_operation(&route.path(), route.method, operation);
        }

        for tag in &config.tags {
            builder.add_tag(tag.clone());
        }

        let document = builder.build();
        debug!(
            "Generated document with {} paths, {} operations and {} tags",
            document.paths.len(),
            document.operation_count(),
            document.tags.len()
        );
        document
    }
}
