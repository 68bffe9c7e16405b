use crate::annotation::{Annotation, AnnotationError, AnnotationExtractor, AnnotationsExt, ArgList};
use crate::config::Config;
use crate::naming::{pluralize, short_name, snake_case};
use crate::parser::{AstParser, ParsedFile};
use crate::type_resolver::{cast_hint_for_type, unwrap_option, SerdeFieldOptions, TypeEntry, TypeResolver};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use syn::Attribute;

/// One known field of a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelField {
    pub annotations: Vec<Annotation>,
    pub nullable: bool,
    /// Last path segment of the declared Rust type, e.g. `NaiveDate` for `Option<NaiveDate>`
    pub rust_type: Option<String>,
}

/// A persistent model and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    /// Qualified path, e.g. `crate::models::task::Task`
    pub identifier: String,
    /// Short name, used as the component schema name
    pub name: String,
    pub table: String,
    /// Every known field in documentation order
    pub fields: IndexMap<String, ModelField>,
    /// field -> cast hint, declared or inferred from the field type
    pub casts: IndexMap<String, String>,
    pub fillable: Vec<String>,
    pub hidden: Vec<String>,
    pub annotations: Vec<Annotation>,
}

impl ModelDescriptor {
    pub fn cast_for(&self, field: &str) -> Option<&str> {
        self.casts.get(field).map(String::as_str)
    }
}

/// Persistence metadata declared with `#[model(..)]`.
#[derive(Debug, Default)]
struct ModelMeta {
    table: Option<String>,
    fillable: Vec<String>,
    hidden: Vec<String>,
    casts: IndexMap<String, String>,
}

impl ModelMeta {
    /// Each `#[model]` attribute is applied as a whole or not at all.
    fn from_attrs(attrs: &[Attribute], model: &str) -> Self {
        let mut meta = ModelMeta::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("model")) {
            match Self::parse(attr) {
                Ok(parsed) => meta.merge(parsed),
                Err(e) => warn!("Ignoring malformed #[model] on {}: {}", model, e),
            }
        }
        meta
    }

    fn parse(attr: &Attribute) -> Result<Self, AnnotationError> {
        let mut meta = ModelMeta::default();
        let args = ArgList::from_attribute(attr)?;
        for arg in args.iter() {
            match arg.name.as_str() {
                "table" => meta.table = Some(arg.as_string()?),
                "fillable" => meta.fillable.extend(arg.as_string_list()?),
                "hidden" => meta.hidden.extend(arg.as_string_list()?),
                "casts" => {
                    for cast in arg.as_list()?.iter() {
                        meta.casts.insert(cast.name.clone(), cast.as_string()?);
                    }
                }
                _ => return Err(AnnotationError::UnknownArgument(arg.display_name())),
            }
        }
        Ok(meta)
    }

    fn merge(&mut self, other: ModelMeta) {
        if other.table.is_some() {
            self.table = other.table;
        }
        self.fillable.extend(other.fillable);
        self.hidden.extend(other.hidden);
        self.casts.extend(other.casts);
    }
}

/// Finds model structs in the configured directories.
pub struct ModelDiscovery<'a> {
    config: &'a Config,
}

impl<'a> ModelDiscovery<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Scans every directory recursively. Missing directories are skipped.
    pub fn discover(&self, directories: &[PathBuf]) -> Vec<ModelDescriptor> {
        let mut files = Vec::new();
        for directory in directories {
            let namespace = self.namespace_for(directory);
            match AstParser::parse_dir(directory, &namespace) {
                Ok(set) => {
                    for warning in &set.warnings {
                        debug!("{}", warning);
                    }
                    files.extend(set.files);
                }
                Err(e) => warn!("Failed to scan {}: {:#}", directory.display(), e),
            }
        }

        let models = self.discover_in(&files);
        info!("Discovered {} models", models.len());
        models
    }

    /// Models among already parsed files.
    pub fn discover_in(&self, files: &[ParsedFile]) -> Vec<ModelDescriptor> {
        let resolver = TypeResolver::new(files);
        let exclude = &self.config.discovery.models.exclude_classes;

        resolver
            .structs()
            .filter(|entry| {
                if !is_model(entry) {
                    return false;
                }
                if !entry.is_concrete() {
                    debug!("Skipping generic model candidate {}", entry.qualified_name);
                    return false;
                }
                let excluded = exclude.iter().any(|name| {
                    let name = name.trim_start_matches("::");
                    name == entry.qualified_name
                        || name == entry.name
                        || entry.qualified_name.ends_with(&format!("::{}", name))
                });
                if excluded {
                    debug!("Skipping excluded model {}", entry.qualified_name);
                }
                !excluded
            })
            .map(|entry| self.analyze(entry))
            .collect()
    }

    /// Module path a model directory maps to, relative to the source root.
    fn namespace_for(&self, directory: &Path) -> String {
        let namespace = self.config.discovery.root_namespace.clone();
        let source_root = self.config.source_root();
        match directory.strip_prefix(&source_root) {
            Ok(relative) => relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .fold(namespace, |acc, segment| {
                    format!("{}::{}", acc, segment.replace('-', "_"))
                }),
            Err(_) => namespace,
        }
    }

    fn analyze(&self, entry: &TypeEntry) -> ModelDescriptor {
        let meta = ModelMeta::from_attrs(&entry.attrs, &entry.qualified_name);
        let annotations = AnnotationExtractor::extract_attributes(
            &entry.attrs,
            &format!("model {}", entry.qualified_name),
        );

        let mut fields: IndexMap<String, ModelField> = IndexMap::new();
        let mut casts = meta.casts.clone();
        let mut always_hidden = Vec::new();

        if let Some(item) = &entry.item {
            for field in item.fields.iter() {
                let Some(ident) = &field.ident else {
                    continue;
                };
                let serde = SerdeFieldOptions::from_attrs(&field.attrs);
                if serde.skip {
                    continue;
                }
                let name = serde.rename.unwrap_or_else(|| ident.to_string());
                let field_annotations = AnnotationExtractor::extract(field);
                if field_annotations.is_hidden() {
                    always_hidden.push(name);
                    continue;
                }

                let (nullable, inner) = unwrap_option(&field.ty);
                if !casts.contains_key(&name) {
                    if let Some(hint) = cast_hint_for_type(&field.ty) {
                        casts.insert(name.clone(), hint.to_string());
                    }
                }
                fields.insert(
                    name,
                    ModelField {
                        annotations: field_annotations,
                        nullable,
                        rust_type: type_name(inner),
                    },
                );
            }
        }

        for name in meta.fillable.iter().chain(meta.casts.keys()) {
            fields.entry(name.clone()).or_default();
        }

        for property in annotations.properties() {
            let Some(name) = property.name.clone() else {
                continue;
            };
            let field = fields.entry(name).or_insert_with(|| ModelField {
                nullable: property.attrs.nullable.unwrap_or(false),
                ..ModelField::default()
            });
            if field.annotations.property().is_none() {
                field.annotations.push(Annotation::Property(property.clone()));
            }
        }

        fields.retain(|name, _| {
            let listed = meta.hidden.contains(name) && !self.config.generation.include_hidden_fields;
            !listed && !always_hidden.contains(name)
        });

        let mut hidden = meta.hidden;
        hidden.extend(always_hidden);

        let table = meta
            .table
            .unwrap_or_else(|| pluralize(&snake_case(&entry.name)));

        debug!(
            "Model {} (table {}) with {} fields",
            entry.qualified_name,
            table,
            fields.len()
        );

        ModelDescriptor {
            identifier: entry.qualified_name.clone(),
            name: short_name(&entry.qualified_name).to_string(),
            table,
            fields,
            casts,
            fillable: meta.fillable,
            hidden,
            annotations,
        }
    }
}

/// A struct is a model when it carries `#[model]`, derives `Model` or implements `Model`.
fn is_model(entry: &TypeEntry) -> bool {
    entry.implements("Model")
        || entry.attrs.iter().any(|attr| {
            if attr.path().is_ident("model") {
                return true;
            }
            if !attr.path().is_ident("derive") {
                return false;
            }
            let mut derives_model = false;
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.segments.last().is_some_and(|s| s.ident == "Model") {
                    derives_model = true;
                }
                Ok(())
            });
            derives_model
        })
}

fn type_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string()),
        syn::Type::Reference(reference) => type_name(&reference.elem),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const TASK: &str = r#"
        use chrono::NaiveDate;

        #[derive(Debug, Serialize, Model)]
        #[model(table = "todo_tasks", fillable = ["title", "status", "priority"], hidden = ["secret"], casts(status = "string", metadata = "array"))]
        #[schema(description = "A unit of work")]
        #[property(name = "progress", type = "integer", nullable)]
        pub struct Task {
            pub id: u64,
            pub title: String,
            pub status: String,
            pub due_date: Option<NaiveDate>,
            #[serde(rename = "isDone")]
            pub done: bool,
            #[serde(skip)]
            pub cache: Vec<u8>,
            #[hidden]
            pub password_hash: String,
            pub secret: String,
        }
    "#;

    fn discover(sources: &[(&str, &str)], config: &Config) -> Vec<ModelDescriptor> {
        let files: Vec<ParsedFile> = sources
            .iter()
            .map(|(module, code)| ParsedFile::from_source(module, code).unwrap())
            .collect();
        ModelDiscovery::new(config).discover_in(&files)
    }

    #[test]
    fn test_model_metadata_and_field_order() {
        let models = discover(&[("crate::models::task", TASK)], &Config::default());
        assert_eq!(models.len(), 1);
        let task = &models[0];

        assert_eq!(task.identifier, "crate::models::task::Task");
        assert_eq!(task.name, "Task");
        assert_eq!(task.table, "todo_tasks");
        assert_eq!(task.fillable, vec!["title", "status", "priority"]);

        let names: Vec<_> = task.fields.keys().cloned().collect();
        assert_eq!(
            names,
            vec!["id", "title", "status", "due_date", "isDone", "priority", "metadata", "progress"]
        );
        assert!(task.fields["due_date"].nullable);
        assert_eq!(task.fields["due_date"].rust_type.as_deref(), Some("NaiveDate"));
        assert!(task.fields["progress"].nullable);
        assert!(task.fields["progress"].annotations.property().is_some());
        assert_eq!(task.annotations.schema().unwrap().attrs.description.as_deref(), Some("A unit of work"));
    }

    #[test]
    fn test_casts_declared_then_inferred() {
        let models = discover(&[("crate::models::task", TASK)], &Config::default());
        let task = &models[0];
        assert_eq!(task.cast_for("status"), Some("string"));
        assert_eq!(task.cast_for("metadata"), Some("array"));
        assert_eq!(task.cast_for("id"), Some("integer"));
        assert_eq!(task.cast_for("due_date"), Some("date"));
        assert_eq!(task.cast_for("isDone"), Some("boolean"));
        assert_eq!(task.cast_for("priority"), None);
    }

    #[test]
    fn test_hidden_fields() {
        let models = discover(&[("crate::models::task", TASK)], &Config::default());
        assert!(!models[0].fields.contains_key("secret"));
        assert!(!models[0].fields.contains_key("password_hash"));
        assert!(!models[0].fields.contains_key("cache"));

        let mut config = Config::default();
        config.generation.include_hidden_fields = true;
        let models = discover(&[("crate::models::task", TASK)], &config);
        assert!(models[0].fields.contains_key("secret"));
        assert!(!models[0].fields.contains_key("password_hash"));
    }

    #[test]
    fn test_model_detection() {
        let sources = [
            (
                "crate::models",
                r#"
                pub struct Plain { pub id: u64 }

                pub struct UserProfile { pub id: u64 }
                impl Model for UserProfile {}

                #[model]
                pub struct Page<T> { pub items: Vec<T> }

                #[derive(orm::Model)]
                pub struct AuditLog { pub id: u64 }
                "#,
            ),
        ];
        let models = discover(&sources, &Config::default());
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["UserProfile", "AuditLog"]);
        assert_eq!(models[0].table, "user_profiles");

        let mut config = Config::default();
        config.discovery.models.exclude_classes = vec!["models::AuditLog".to_string()];
        let models = discover(&sources, &config);
        assert_eq!(models.len(), 1);
    }

    #[test]
    fn test_malformed_model_attribute_keeps_model() {
        let models = discover(
            &[("crate::models", r#"#[model(table = 12)] pub struct Tag { pub name: String }"#)],
            &Config::default(),
        );
        assert_eq!(models[0].table, "tags");
        assert_eq!(models[0].fields.len(), 1);
    }

    #[test]
    fn test_malformed_model_attribute_is_skipped_whole() {
        let models = discover(
            &[(
                "crate::models",
                r#"
                #[model(table = "archived_tags", fillable = 3)]
                #[model(hidden = ["secret"])]
                pub struct Tag { pub name: String, pub secret: String }
                "#,
            )],
            &Config::default(),
        );
        assert_eq!(models[0].table, "tags");
        assert!(models[0].fillable.is_empty());
        assert_eq!(models[0].hidden, vec!["secret"]);
    }

    #[test]
    fn test_discover_directories() {
        let temp_dir = TempDir::new().unwrap();
        let models_dir = temp_dir.path().join("src/models");
        fs::create_dir_all(&models_dir).unwrap();
        fs::write(models_dir.join("task.rs"), TASK).unwrap();
        fs::write(models_dir.join("helpers.rs"), "pub fn helper() {}").unwrap();

        let config = Config::default().with_project_root(temp_dir.path());
        let discovery = ModelDiscovery::new(&config);
        let mut directories = config.model_directories();
        directories.push(temp_dir.path().join("src/missing"));

        let models = discovery.discover(&directories);
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].identifier, "crate::models::task::Task");
    }
}
