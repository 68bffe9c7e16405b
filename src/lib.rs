//! OpenAPI 3.0 documents from annotated Rust web projects.
//!
//! Routes come from a host route table (a manifest file or the project's axum routers);
//! handler and model annotations written as attributes refine what is inferred from names,
//! field types and casts. Nothing has to be registered by hand: every generation walks the
//! current sources and produces a fresh document.
//!
//! # Architecture
//!
//! 1. [`route_table`] - Host routes from a manifest or from `Router` chains
//! 2. [`route_discovery`] - Filters routes and binds them to handler types and methods
//! 3. [`model_discovery`] - Finds model structs and their fields, casts and visibility
//! 4. [`annotation`] - Reads `#[operation]`, `#[schema]`, `#[response]`... into typed declarations
//! 5. [`schema_generator`] - Builds schemas from casts, field types and annotations
//! 6. [`reference`] - Qualified type names to `#/components/schemas/...` pointers
//! 7. [`operation`] - One operation per route, declared data first, inference second
//! 8. [`generator`] - Assembles paths, components and tags into an [`openapi_builder::OpenApiDocument`]
//! 9. [`serializer`] - JSON/YAML output and atomic artifact writes
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_annotations::{
//!     config::Config,
//!     generator::DocumentGenerator,
//!     route_table::manifest::ManifestRouteTable,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let config = Config::from_file(Path::new("./my-api/openapi.yaml"))
//!     .unwrap()
//!     .with_project_root("./my-api");
//! let routes = ManifestRouteTable::from_file(Path::new("./my-api/routes.yaml")).unwrap();
//!
//! let document = DocumentGenerator::new(&config, &routes).generate();
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! For command-line usage, see the [`cli`] module.

pub mod annotation;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod model_discovery;
pub mod naming;
pub mod openapi_builder;
pub mod operation;
pub mod parser;
pub mod reference;
pub mod route_discovery;
pub mod route_table;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
