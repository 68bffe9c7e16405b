use crate::annotation::{
    AnnotationsExt, ItemsDecl, PropertyDecl, RelationshipDecl, SchemaAttrs, SchemaDecl,
};
use crate::model_discovery::{ModelDescriptor, ModelField};
use crate::reference::ReferenceResolver;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A schema usage site: either a pure reference or an inline schema.
///
/// A reference never carries sibling keywords; it serializes to exactly `{"$ref": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaFragment {
    Ref(Reference),
    Inline(Box<Schema>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub pointer: String,
}

impl SchemaFragment {
    pub fn reference(pointer: impl Into<String>) -> Self {
        SchemaFragment::Ref(Reference {
            pointer: pointer.into(),
        })
    }

    pub fn inline(schema: Schema) -> Self {
        SchemaFragment::Inline(Box::new(schema))
    }

    pub fn as_inline(&self) -> Option<&Schema> {
        match self {
            SchemaFragment::Inline(schema) => Some(schema),
            SchemaFragment::Ref(_) => None,
        }
    }

    pub fn pointer(&self) -> Option<&str> {
        match self {
            SchemaFragment::Ref(r) => Some(&r.pointer),
            SchemaFragment::Inline(_) => None,
        }
    }

    fn is_array_or_object(&self) -> bool {
        matches!(
            self.as_inline().and_then(|s| s.schema_type.as_deref()),
            Some("array" | "object")
        )
    }
}

impl From<Schema> for SchemaFragment {
    fn from(schema: Schema) -> Self {
        SchemaFragment::inline(schema)
    }
}

/// OpenAPI Schema Object (the subset this generator emits).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaFragment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<SchemaFragment>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Schema {
    pub fn typed(schema_type: &str) -> Self {
        Schema {
            schema_type: Some(schema_type.to_string()),
            ..Schema::default()
        }
    }

    pub fn formatted(schema_type: &str, format: &str) -> Self {
        Schema {
            format: Some(format.to_string()),
            ..Schema::typed(schema_type)
        }
    }

    pub fn array_of(items: impl Into<SchemaFragment>) -> Self {
        Schema {
            items: Some(items.into()),
            ..Schema::typed("array")
        }
    }

    pub fn object(properties: IndexMap<String, SchemaFragment>) -> Self {
        Schema {
            properties,
            ..Schema::typed("object")
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Copies every keyword `attrs` sets explicitly. The reference keyword is handled by callers.
    fn overlay(&mut self, attrs: &SchemaAttrs) {
        macro_rules! set {
            ($($field:ident),*) => {
                $( if let Some(value) = &attrs.$field { self.$field = Some(value.clone()); } )*
            };
        }
        set!(
            schema_type, format, description, default, example, examples, nullable,
            enum_values, min_length, max_length, minimum, maximum, pattern, read_only, write_only
        );
    }
}

/// Schema family of a persistence cast hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastFamily {
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Date,
    DateTime,
    String,
}

impl CastFamily {
    /// `decimal:2` and `encrypted:array` reduce to their base cast before matching.
    pub fn of(cast: &str) -> Self {
        let lower = cast.trim().to_lowercase();
        let base = lower.strip_prefix("encrypted:").unwrap_or(&lower);
        let base = base.split(':').next().unwrap_or(base).trim();
        match base {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "mediumint" => {
                CastFamily::Integer
            }
            "real" | "float" | "double" | "decimal" => CastFamily::Number,
            "bool" | "boolean" => CastFamily::Boolean,
            "array" | "json" | "jsonb" | "collection" | "set" => CastFamily::Array,
            "object" => CastFamily::Object,
            "date" | "immutable_date" => CastFamily::Date,
            "datetime" | "immutable_datetime" | "custom_datetime" | "timestamp" => {
                CastFamily::DateTime
            }
            _ => CastFamily::String,
        }
    }

    pub fn schema(self) -> Schema {
        match self {
            CastFamily::Integer => Schema::typed("integer"),
            CastFamily::Number => Schema::formatted("number", "float"),
            CastFamily::Boolean => Schema::typed("boolean"),
            // element type is unknown
            CastFamily::Array => Schema::array_of(Schema::typed("string")),
            CastFamily::Object => Schema::typed("object"),
            CastFamily::Date => Schema::formatted("string", "date"),
            CastFamily::DateTime => Schema::formatted("string", "date-time"),
            CastFamily::String => Schema::typed("string"),
        }
    }
}

/// Schema implied by a cast hint; no hint means `string`.
pub fn infer_from_cast(cast: Option<&str>) -> Schema {
    cast.map(CastFamily::of).unwrap_or(CastFamily::String).schema()
}

/// Returns the forced schema for conventional field names.
fn name_override(name: &str) -> Option<Schema> {
    if name == "id" {
        return Some(Schema {
            read_only: Some(true),
            ..Schema::formatted("integer", "int64").with_description("Unique identifier")
        });
    }
    if name == "created_at" || name == "updated_at" {
        return Some(Schema {
            read_only: Some(true),
            ..Schema::formatted("string", "date-time")
        });
    }
    if let Some(relation) = name.strip_suffix("_id").filter(|r| !r.is_empty()) {
        let description = format!(
            "Foreign key referencing the {} resource",
            relation.replace('_', " ")
        );
        return Some(Schema::formatted("integer", "int64").with_description(description));
    }
    if name.ends_with("_at") {
        return Some(Schema::formatted("string", "date-time"));
    }
    None
}

/// Converts model descriptors and property declarations into schema fragments.
pub struct SchemaGenerator<'a> {
    resolver: &'a ReferenceResolver,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(resolver: &'a ReferenceResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        self.resolver
    }

    /// Builds the component schema of one model: an object with one property per known field.
    pub fn build_model(&self, model: &ModelDescriptor) -> SchemaFragment {
        let decl = model.annotations.schema();

        if let Some(reference) = decl.and_then(|d| d.attrs.reference.as_deref()) {
            if let Some(fragment) = self.reference(reference) {
                return fragment;
            }
        }

        let mut properties = IndexMap::new();
        let mut inferred_required = Vec::new();
        for (name, field) in &model.fields {
            let (fragment, required) = self.build_field(name, field, model.cast_for(name));
            if required {
                inferred_required.push(name.clone());
            }
            properties.insert(name.clone(), fragment);
        }

        let required = match decl.and_then(|d| d.required.as_ref()) {
            Some(explicit) if !explicit.is_empty() => dedup(explicit.iter().cloned()),
            _ => dedup(inferred_required),
        };

        let mut schema = Schema {
            title: Some(model.name.clone()),
            description: Some(format!("{} model", model.name)),
            properties,
            required,
            ..Schema::typed("object")
        };
        if let Some(decl) = decl {
            schema.overlay(&decl.attrs);
            if decl.title.is_some() {
                schema.title = decl.title.clone();
            }
        }

        debug!(
            "Built schema for model {} with {} properties",
            model.name,
            schema.properties.len()
        );
        SchemaFragment::inline(schema)
    }

    /// Builds one model field and reports whether it belongs in the required list.
    pub fn build_field(
        &self,
        name: &str,
        field: &ModelField,
        cast: Option<&str>,
    ) -> (SchemaFragment, bool) {
        let decl = field.annotations.property();
        let nullable = decl
            .and_then(|d| d.attrs.nullable)
            .unwrap_or(field.nullable);
        let explicit_required = decl.and_then(|d| d.required);

        if let Some(fragment) = decl
            .and_then(|d| d.attrs.reference.as_deref())
            .and_then(|r| self.reference(r))
        {
            return (fragment, explicit_required.unwrap_or(!nullable));
        }

        if let Some(relationship) = field.annotations.relationship() {
            let fragment = self.build_relationship(relationship);
            let nullable = relationship.nullable.unwrap_or(nullable);
            let required = explicit_required
                .unwrap_or(!nullable && !fragment.is_array_or_object());
            return (fragment, required);
        }

        let schema = match decl {
            Some(decl) => {
                let mut schema = match decl.attrs.schema_type {
                    Some(_) => Schema::default(),
                    None => infer_from_cast(cast),
                };
                schema.overlay(&decl.attrs);
                let items = decl.items.as_deref().or(field.annotations.items());
                self.shape_nested(&mut schema, items, &decl.properties, Some("string"));
                apply_name_override(name, &mut schema);
                SchemaFragment::inline(schema)
            }
            None => {
                let mut schema = infer_from_cast(cast);
                apply_name_override(name, &mut schema);
                if let Some(items) = field.annotations.items() {
                    if schema.schema_type.as_deref() == Some("array") {
                        schema.items = Some(self.build_items(items));
                    }
                }
                if field.nullable {
                    schema.nullable = Some(true);
                }
                SchemaFragment::inline(schema)
            }
        };

        let required = explicit_required.unwrap_or(!nullable && !schema.is_array_or_object());
        (schema, required)
    }

    /// Builds a standalone property declaration.
    pub fn build_property(&self, decl: &PropertyDecl) -> SchemaFragment {
        if let Some(fragment) = decl
            .attrs
            .reference
            .as_deref()
            .and_then(|r| self.reference(r))
        {
            return fragment;
        }
        self.apply_property(Schema::default(), decl, None)
    }

    pub fn build_items(&self, decl: &ItemsDecl) -> SchemaFragment {
        if let Some(fragment) = decl
            .attrs
            .reference
            .as_deref()
            .and_then(|r| self.reference(r))
        {
            return fragment;
        }
        let mut schema = Schema::default();
        schema.overlay(&decl.attrs);
        self.shape_nested(&mut schema, decl.items.as_deref(), &decl.properties, None);
        SchemaFragment::inline(schema)
    }

    /// Inline schema for a `schema(..)` / `schema = Type` argument.
    pub fn build_schema_decl(&self, decl: &SchemaDecl) -> SchemaFragment {
        if let Some(fragment) = decl
            .attrs
            .reference
            .as_deref()
            .and_then(|r| self.reference(r))
        {
            return fragment;
        }
        let mut schema = Schema::default();
        schema.overlay(&decl.attrs);
        schema.title = decl.title.clone();
        self.shape_nested(&mut schema, decl.items.as_deref(), &decl.properties, None);
        if let Some(required) = &decl.required {
            schema.required = dedup(required.iter().cloned());
        }
        SchemaFragment::inline(schema)
    }

    /// Inline object schema for a list of property declarations.
    pub fn build_object(&self, properties: &[PropertyDecl]) -> SchemaFragment {
        let mut schema = Schema::typed("object");
        self.shape_nested(&mut schema, None, properties, None);
        SchemaFragment::inline(schema)
    }

    pub fn reference(&self, reference: &str) -> Option<SchemaFragment> {
        self.resolver
            .resolve(Some(reference))
            .map(SchemaFragment::reference)
    }

    fn build_relationship(&self, decl: &RelationshipDecl) -> SchemaFragment {
        let target = self
            .reference(&decl.related)
            .unwrap_or_else(|| SchemaFragment::inline(Schema::typed("object")));
        let mut schema = if decl.kind.is_many() {
            Schema::array_of(target)
        } else {
            return target;
        };
        schema.description = decl.description.clone();
        SchemaFragment::inline(schema)
    }

    fn apply_property(
        &self,
        mut schema: Schema,
        decl: &PropertyDecl,
        field_items: Option<&ItemsDecl>,
    ) -> SchemaFragment {
        schema.overlay(&decl.attrs);
        let items = decl.items.as_deref().or(field_items);
        self.shape_nested(&mut schema, items, &decl.properties, Some("string"));
        SchemaFragment::inline(schema)
    }

    /// Fills `items` and `properties`, defaulting the type from what is present.
    fn shape_nested(
        &self,
        schema: &mut Schema,
        items: Option<&ItemsDecl>,
        properties: &[PropertyDecl],
        fallback_type: Option<&str>,
    ) {
        if schema.schema_type.is_none() {
            schema.schema_type = if items.is_some() {
                Some("array".to_string())
            } else if !properties.is_empty() {
                Some("object".to_string())
            } else {
                fallback_type.map(str::to_string)
            };
        }

        match schema.schema_type.as_deref() {
            Some("array") => {
                if let Some(items) = items {
                    schema.items = Some(self.build_items(items));
                } else if schema.items.is_none() {
                    schema.items = Some(SchemaFragment::inline(Schema::typed("string")));
                }
            }
            Some("object") if !properties.is_empty() => {
                let mut required = Vec::new();
                for property in properties {
                    let Some(name) = property.name.clone() else {
                        continue;
                    };
                    let fragment = self.build_property(property);
                    let nullable = property.attrs.nullable.unwrap_or(false);
                    if property
                        .required
                        .unwrap_or(!nullable && !fragment.is_array_or_object())
                    {
                        required.push(name.clone());
                    }
                    schema.properties.insert(name, fragment);
                }
                schema.required = dedup(required);
            }
            _ => {}
        }
    }
}

/// Applies the naming conventions for `id`, timestamps and foreign keys.
///
/// Type and format are forced whatever the field declared; a declared description is kept.
fn apply_name_override(name: &str, schema: &mut Schema) {
    let Some(forced) = name_override(name) else {
        return;
    };
    if forced.schema_type != schema.schema_type {
        schema.items = None;
        schema.properties.clear();
    }
    schema.schema_type = forced.schema_type;
    schema.format = forced.format;
    if forced.read_only.is_some() {
        schema.read_only = forced.read_only;
    }
    if forced.description.is_some() && schema.description.is_none() {
        schema.description = forced.description;
    }
}

/// Order-preserving deduplication.
pub fn dedup<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, ArgList};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn annotation(name: &str, tokens: &str) -> Annotation {
        let args: ArgList = syn::parse_str(tokens).unwrap();
        Annotation::from_args(name, &args).unwrap()
    }

    fn field(annotations: Vec<Annotation>, nullable: bool) -> ModelField {
        ModelField {
            annotations,
            nullable,
            rust_type: None,
        }
    }

    fn model(fields: Vec<(&str, ModelField)>, casts: Vec<(&str, &str)>) -> ModelDescriptor {
        ModelDescriptor {
            identifier: "crate::models::Task".to_string(),
            name: "Task".to_string(),
            table: "tasks".to_string(),
            fields: fields
                .into_iter()
                .map(|(n, f)| (n.to_string(), f))
                .collect(),
            casts: casts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fillable: Vec::new(),
            hidden: Vec::new(),
            annotations: Vec::new(),
        }
    }

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(["crate::models::Task", "crate::models::User"])
    }

    fn to_json(fragment: &SchemaFragment) -> Value {
        serde_json::to_value(fragment).unwrap()
    }

    #[test]
    fn test_cast_families() {
        assert_eq!(CastFamily::of("integer"), CastFamily::Integer);
        assert_eq!(CastFamily::of("decimal:2"), CastFamily::Number);
        assert_eq!(CastFamily::of("encrypted:array"), CastFamily::Array);
        assert_eq!(CastFamily::of("encrypted"), CastFamily::String);
        assert_eq!(CastFamily::of("datetime:Y-m-d"), CastFamily::DateTime);
        assert_eq!(CastFamily::of("immutable_date"), CastFamily::Date);
        assert_eq!(CastFamily::of("Boolean"), CastFamily::Boolean);
        assert_eq!(CastFamily::of("hashed"), CastFamily::String);
        assert_eq!(infer_from_cast(None), Schema::typed("string"));
        assert_eq!(
            infer_from_cast(Some("float")).format.as_deref(),
            Some("float")
        );
    }

    #[test]
    fn test_unannotated_model_from_casts() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let task = model(
            vec![
                ("id", field(vec![], false)),
                ("title", field(vec![], false)),
                ("status", field(vec![], false)),
                ("due_date", field(vec![], true)),
            ],
            vec![("id", "integer"), ("title", "string"), ("status", "string"), ("due_date", "date")],
        );

        let schema = to_json(&generator.build_model(&task));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["title"], "Task");
        assert_eq!(schema["properties"]["id"]["type"], "integer");
        assert_eq!(schema["properties"]["id"]["format"], "int64");
        assert_eq!(schema["properties"]["id"]["readOnly"], true);
        assert_eq!(schema["properties"]["due_date"]["type"], "string");
        assert_eq!(schema["properties"]["due_date"]["format"], "date");
        assert_eq!(schema["required"], json!(["id", "title", "status"]));
    }

    #[test]
    fn test_non_nullable_date_is_required() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let task = model(vec![("due_date", field(vec![], false))], vec![("due_date", "date")]);
        let schema = to_json(&generator.build_model(&task));
        assert_eq!(
            schema["properties"]["due_date"],
            json!({"type": "string", "format": "date"})
        );
        assert_eq!(schema["required"], json!(["due_date"]));
    }

    #[test]
    fn test_name_overrides() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let task = model(
            vec![
                ("user_id", field(vec![], false)),
                ("created_at", field(vec![], false)),
                ("published_at", field(vec![], true)),
            ],
            vec![("user_id", "string")],
        );
        let schema = to_json(&generator.build_model(&task));
        assert_eq!(
            schema["properties"]["user_id"],
            json!({
                "type": "integer",
                "format": "int64",
                "description": "Foreign key referencing the user resource"
            })
        );
        assert_eq!(
            schema["properties"]["created_at"],
            json!({"type": "string", "format": "date-time", "readOnly": true})
        );
        assert_eq!(schema["properties"]["published_at"]["format"], "date-time");
        assert_eq!(schema["properties"]["published_at"]["nullable"], true);
    }

    #[test]
    fn test_explicit_reference_stays_pure() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let owner = field(
            vec![annotation("property", r#"ref = User, description = "ignored", nullable"#)],
            false,
        );
        let (fragment, required) = generator.build_field("owner", &owner, None);
        assert_eq!(to_json(&fragment), json!({"$ref": "#/components/schemas/User"}));
        assert!(!required);
    }

    #[test]
    fn test_property_decl_overlays_cast() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let status = field(
            vec![annotation(
                "property",
                r#"enum = ["todo", "done"], default = "todo", description = "Workflow state""#,
            )],
            false,
        );
        let (fragment, required) = generator.build_field("status", &status, Some("string"));
        assert_eq!(
            to_json(&fragment),
            json!({
                "type": "string",
                "description": "Workflow state",
                "enum": ["todo", "done"],
                "default": "todo"
            })
        );
        assert!(required);
    }

    #[test]
    fn test_name_override_forces_declared_type() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);

        let owner = field(vec![annotation("property", r#"type = "string""#)], false);
        let (fragment, _) = generator.build_field("owner_id", &owner, None);
        let schema = to_json(&fragment);
        assert_eq!(schema["type"], "integer");
        assert_eq!(schema["format"], "int64");
        assert_eq!(schema["description"], "Foreign key referencing the owner resource");

        let id = field(
            vec![annotation("property", r#"type = "integer", read_only = false"#)],
            false,
        );
        let (fragment, _) = generator.build_field("id", &id, None);
        let schema = to_json(&fragment);
        assert_eq!(schema["type"], "integer");
        assert_eq!(schema["format"], "int64");
        assert_eq!(schema["readOnly"], true);

        let archived = field(
            vec![annotation("property", r#"type = "integer", description = "Archive stamp""#)],
            false,
        );
        let (fragment, _) = generator.build_field("archived_at", &archived, None);
        let schema = to_json(&fragment);
        assert_eq!(schema["type"], "string");
        assert_eq!(schema["format"], "date-time");
        assert_eq!(schema["description"], "Archive stamp");
    }

    #[test]
    fn test_array_property_with_items() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let tags = field(
            vec![annotation("property", r#"type = "array", items(ref = Task)"#)],
            false,
        );
        let (fragment, required) = generator.build_field("related", &tags, None);
        assert_eq!(
            to_json(&fragment),
            json!({"type": "array", "items": {"$ref": "#/components/schemas/Task"}})
        );
        assert!(!required);

        let labels = field(vec![annotation("property", r#"type = "array""#)], false);
        let (fragment, _) = generator.build_field("labels", &labels, None);
        assert_eq!(to_json(&fragment)["items"], json!({"type": "string"}));
    }

    #[test]
    fn test_field_level_items_annotation() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let scores = field(
            vec![annotation("items", r#"type = "integer", minimum = 0"#)],
            false,
        );
        let (fragment, _) = generator.build_field("scores", &scores, Some("json"));
        assert_eq!(
            to_json(&fragment),
            json!({"type": "array", "items": {"type": "integer", "minimum": 0}})
        );
    }

    #[test]
    fn test_nested_object_property() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let decl = match annotation(
            "property",
            r#"properties(street(type = "string"), zip(type = "string", nullable))"#,
        ) {
            Annotation::Property(p) => p,
            _ => unreachable!(),
        };
        let schema = to_json(&generator.build_property(&decl));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["zip"]["nullable"], true);
        assert_eq!(schema["required"], json!(["street"]));
    }

    #[test]
    fn test_relationships() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let owner = field(vec![annotation("relationship", "belongs_to, related = User")], true);
        let (fragment, required) = generator.build_field("owner", &owner, None);
        assert_eq!(to_json(&fragment), json!({"$ref": "#/components/schemas/User"}));
        assert!(!required);

        let subtasks = field(
            vec![annotation("relationship", "has_many, related = crate::models::Task")],
            false,
        );
        let (fragment, required) = generator.build_field("subtasks", &subtasks, None);
        assert_eq!(
            to_json(&fragment),
            json!({"type": "array", "items": {"$ref": "#/components/schemas/Task"}})
        );
        assert!(!required);
    }

    #[test]
    fn test_explicit_required_list_wins_and_is_deduplicated() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let mut task = model(
            vec![("id", field(vec![], false)), ("title", field(vec![], false))],
            vec![],
        );
        task.annotations = vec![annotation(
            "schema",
            r#"title = "TaskResource", description = "A task", required = ["title", "title"]"#,
        )];
        let first = to_json(&generator.build_model(&task));
        let second = to_json(&generator.build_model(&task));
        assert_eq!(first["required"], json!(["title"]));
        assert_eq!(first["title"], "TaskResource");
        assert_eq!(first["description"], "A task");
        assert_eq!(first, second);
    }

    #[test]
    fn test_explicit_field_required_flag() {
        let resolver = resolver();
        let generator = SchemaGenerator::new(&resolver);
        let notes = field(vec![annotation("property", "required = false")], false);
        let (_, required) = generator.build_field("notes", &notes, None);
        assert!(!required);
    }
}
