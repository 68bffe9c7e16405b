//! The fixed annotation vocabulary.
//!
//! Annotations are ordinary Rust attributes placed on handler types, handler methods, models and
//! model fields. They are read statically; the host crate only needs them to be accepted by the
//! compiler (an inert attribute macro crate or `#[cfg_attr(doc, ..)]` both work).
//!
//! Every declaration keeps optional fields as `Option` so that "not provided" stays distinct
//! from "provided as false/empty".

pub mod args;
pub mod extractor;

pub use args::{Arg, ArgList, ArgValue};
pub use extractor::{Annotated, AnnotationExtractor};

use crate::openapi_builder::{ParameterLocation, SecurityRequirement};
use indexmap::IndexMap;
use serde_json::{Number, Value};
use syn::Attribute;
use thiserror::Error;

/// Why a single annotation could not be constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationError {
    #[error("malformed arguments: {0}")]
    Syntax(String),
    #[error("unknown argument `{0}`")]
    UnknownArgument(String),
    #[error("argument `{name}` expects {expected}")]
    InvalidValue { name: String, expected: &'static str },
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    #[error("{0}")]
    Invalid(String),
}

fn unknown(arg: &Arg) -> AnnotationError {
    AnnotationError::UnknownArgument(arg.display_name())
}

/// Schema keywords shared by `schema`, `property` and `items`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaAttrs {
    pub schema_type: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub default: Option<Value>,
    pub example: Option<Value>,
    pub examples: Option<Vec<Value>>,
    pub nullable: Option<bool>,
    pub enum_values: Option<Vec<Value>>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub pattern: Option<String>,
    pub read_only: Option<bool>,
    pub write_only: Option<bool>,
}

impl SchemaAttrs {
    /// Applies one argument. Returns `false` when the argument is not a schema keyword.
    fn apply(&mut self, arg: &Arg) -> Result<bool, AnnotationError> {
        match arg.name.as_str() {
            "type" => self.schema_type = Some(arg.as_string()?),
            "format" => self.format = Some(arg.as_string()?),
            "description" => self.description = Some(arg.as_string()?),
            "ref" | "reference" => self.reference = Some(arg.as_string()?),
            "default" => self.default = Some(arg.as_json()),
            "example" => self.example = Some(arg.as_json()),
            "examples" => self.examples = Some(arg.as_json_list()?),
            "nullable" => self.nullable = Some(arg.as_bool()?),
            "enum" => self.enum_values = Some(arg.as_json_list()?),
            "min_length" | "minLength" => self.min_length = Some(arg.as_u64()?),
            "max_length" | "maxLength" => self.max_length = Some(arg.as_u64()?),
            "minimum" => self.minimum = Some(arg.as_number()?),
            "maximum" => self.maximum = Some(arg.as_number()?),
            "pattern" => self.pattern = Some(arg.as_string()?),
            "read_only" | "readOnly" => self.read_only = Some(arg.as_bool()?),
            "write_only" | "writeOnly" => self.write_only = Some(arg.as_bool()?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// `properties(title(type = "string"), property(name = "done", type = "boolean"))`
fn parse_properties(arg: &Arg) -> Result<Vec<PropertyDecl>, AnnotationError> {
    arg.as_list()?
        .iter()
        .map(|entry| {
            let nested = entry.as_list()?;
            let mut property = PropertyDecl::from_args(nested)?;
            if entry.name != "property" {
                property.name = Some(entry.name.clone());
            }
            if property.name.is_none() {
                return Err(AnnotationError::MissingArgument("name"));
            }
            Ok(property)
        })
        .collect()
}

/// `schema = Task` is a reference, `schema(type = "integer")` an inline schema.
fn parse_schema_value(arg: &Arg) -> Result<SchemaDecl, AnnotationError> {
    match &arg.value {
        ArgValue::List(list) => SchemaDecl::from_args(list),
        _ => Ok(SchemaDecl {
            attrs: SchemaAttrs {
                reference: Some(arg.as_string()?),
                ..SchemaAttrs::default()
            },
            ..SchemaDecl::default()
        }),
    }
}

fn parse_media_types(arg: &Arg) -> Result<Vec<MediaTypeDecl>, AnnotationError> {
    arg.as_list()?
        .iter()
        .map(|entry| match entry.name.as_str() {
            "media_type" => MediaTypeDecl::from_args(entry.as_list()?),
            _ => Err(unknown(entry)),
        })
        .collect()
}

fn parse_examples(arg: &Arg) -> Result<IndexMap<String, Value>, AnnotationError> {
    Ok(arg.as_json_map()?.into_iter().collect())
}

/// Type-level schema declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDecl {
    pub title: Option<String>,
    pub attrs: SchemaAttrs,
    pub required: Option<Vec<String>>,
    pub properties: Vec<PropertyDecl>,
    pub items: Option<Box<ItemsDecl>>,
}

impl SchemaDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut decl = SchemaDecl::default();
        for arg in args.iter() {
            if decl.attrs.apply(arg)? {
                continue;
            }
            match arg.name.as_str() {
                "title" => decl.title = Some(arg.as_string()?),
                "required" => decl.required = Some(arg.as_string_list()?),
                "properties" => decl.properties.extend(parse_properties(arg)?),
                "items" => decl.items = Some(Box::new(ItemsDecl::from_args(arg.as_list()?)?)),
                _ => return Err(unknown(arg)),
            }
        }
        Ok(decl)
    }
}

/// One property. On a field the name comes from the field; on a type `name` is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDecl {
    pub name: Option<String>,
    pub attrs: SchemaAttrs,
    pub required: Option<bool>,
    pub items: Option<Box<ItemsDecl>>,
    pub properties: Vec<PropertyDecl>,
}

impl PropertyDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut decl = PropertyDecl::default();
        for arg in args.iter() {
            if decl.attrs.apply(arg)? {
                continue;
            }
            match arg.name.as_str() {
                "name" | "property" => decl.name = Some(arg.as_string()?),
                "required" => decl.required = Some(arg.as_bool()?),
                "items" => decl.items = Some(Box::new(ItemsDecl::from_args(arg.as_list()?)?)),
                "properties" => decl.properties.extend(parse_properties(arg)?),
                _ => return Err(unknown(arg)),
            }
        }
        Ok(decl)
    }
}

/// Element shape of an array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsDecl {
    pub attrs: SchemaAttrs,
    pub items: Option<Box<ItemsDecl>>,
    pub properties: Vec<PropertyDecl>,
}

impl ItemsDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut decl = ItemsDecl::default();
        for arg in args.iter() {
            if decl.attrs.apply(arg)? {
                continue;
            }
            match arg.name.as_str() {
                "items" => decl.items = Some(Box::new(ItemsDecl::from_args(arg.as_list()?)?)),
                "properties" => decl.properties.extend(parse_properties(arg)?),
                _ => return Err(unknown(arg)),
            }
        }
        Ok(decl)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationDecl {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub deprecated: Option<bool>,
    /// Alternatives; each `security(..)` argument adds one requirement set.
    pub security: Option<Vec<SecurityRequirement>>,
}

impl OperationDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut decl = OperationDecl::default();
        for arg in args.iter() {
            match arg.name.as_str() {
                "summary" => decl.summary = Some(arg.as_string()?),
                "description" => decl.description = Some(arg.as_string()?),
                "operation_id" | "operationId" | "id" => {
                    decl.operation_id = Some(arg.as_string()?)
                }
                "tags" | "tag" => decl.tags = Some(arg.as_string_list()?),
                "deprecated" => decl.deprecated = Some(arg.as_bool()?),
                "security" => decl
                    .security
                    .get_or_insert_with(Vec::new)
                    .push(SecurityDecl::from_args(arg.as_list()?)?.requirement),
                _ => return Err(unknown(arg)),
            }
        }
        Ok(decl)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub location: ParameterLocation,
    pub description: Option<String>,
    pub required: Option<bool>,
    pub deprecated: Option<bool>,
    pub schema: Option<SchemaDecl>,
    pub example: Option<Value>,
    pub examples: Option<IndexMap<String, Value>>,
}

impl ParameterDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut name = None;
        let mut location = None;
        let mut decl = ParameterDecl {
            name: String::new(),
            location: ParameterLocation::Query,
            description: None,
            required: None,
            deprecated: None,
            schema: None,
            example: None,
            examples: None,
        };
        let mut shortcut = SchemaAttrs::default();

        for arg in args.iter() {
            match arg.name.as_str() {
                "" | "name" => name = Some(arg.as_string()?),
                "in" | "location" => {
                    let raw = arg.as_string()?;
                    location = Some(raw.parse::<ParameterLocation>().map_err(|_| {
                        AnnotationError::InvalidValue {
                            name: arg.display_name(),
                            expected: "one of query, header, path, cookie",
                        }
                    })?);
                }
                "description" => decl.description = Some(arg.as_string()?),
                "required" => decl.required = Some(arg.as_bool()?),
                "deprecated" => decl.deprecated = Some(arg.as_bool()?),
                "schema" => decl.schema = Some(parse_schema_value(arg)?),
                "example" => decl.example = Some(arg.as_json()),
                "examples" => decl.examples = Some(parse_examples(arg)?),
                "type" | "format" | "enum" | "minimum" | "maximum" | "default" | "pattern" => {
                    shortcut.apply(arg)?;
                }
                _ => return Err(unknown(arg)),
            }
        }

        decl.name = name.ok_or(AnnotationError::MissingArgument("name"))?;
        decl.location = location.ok_or(AnnotationError::MissingArgument("in"))?;
        if shortcut != SchemaAttrs::default() {
            let schema = decl.schema.get_or_insert_with(SchemaDecl::default);
            merge_attrs(&mut schema.attrs, shortcut);
        }
        Ok(decl)
    }
}

fn merge_attrs(target: &mut SchemaAttrs, source: SchemaAttrs) {
    macro_rules! fill {
        ($($field:ident),*) => {
            $( if target.$field.is_none() { target.$field = source.$field; } )*
        };
    }
    fill!(schema_type, format, enum_values, minimum, maximum, default, pattern);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBodyDecl {
    pub description: Option<String>,
    pub required: Option<bool>,
    pub reference: Option<String>,
    pub content: Vec<MediaTypeDecl>,
    pub properties: Vec<PropertyDecl>,
}

impl RequestBodyDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut decl = RequestBodyDecl::default();
        for arg in args.iter() {
            match arg.name.as_str() {
                "description" => decl.description = Some(arg.as_string()?),
                "required" => decl.required = Some(arg.as_bool()?),
                "ref" | "reference" | "schema" => decl.reference = Some(arg.as_string()?),
                "content" => decl.content.extend(parse_media_types(arg)?),
                "properties" => decl.properties.extend(parse_properties(arg)?),
                _ => return Err(unknown(arg)),
            }
        }
        Ok(decl)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDecl {
    /// `"200"`, `"default"` or a range like `"4XX"`
    pub status: String,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub content: Vec<MediaTypeDecl>,
    pub properties: Vec<PropertyDecl>,
    /// header name -> description
    pub headers: IndexMap<String, String>,
}

impl ResponseDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut status = None;
        let mut decl = ResponseDecl {
            status: String::new(),
            description: None,
            reference: None,
            content: Vec::new(),
            properties: Vec::new(),
            headers: IndexMap::new(),
        };

        for arg in args.iter() {
            match arg.name.as_str() {
                "" | "status" | "code" | "response" => status = Some(parse_status(arg)?),
                "description" => decl.description = Some(arg.as_string()?),
                "ref" | "reference" | "schema" => decl.reference = Some(arg.as_string()?),
                "content" => decl.content.extend(parse_media_types(arg)?),
                "properties" => decl.properties.extend(parse_properties(arg)?),
                "headers" => {
                    for header in arg.as_list()?.iter() {
                        decl.headers.insert(header.name.clone(), header.as_string()?);
                    }
                }
                _ => return Err(unknown(arg)),
            }
        }

        decl.status = status.unwrap_or_else(|| "200".to_string());
        Ok(decl)
    }
}

fn parse_status(arg: &Arg) -> Result<String, AnnotationError> {
    let invalid = || AnnotationError::InvalidValue {
        name: arg.display_name(),
        expected: "an HTTP status code, a range like \"4XX\" or \"default\"",
    };
    match &arg.value {
        ArgValue::Number(n) => match n.as_u64() {
            Some(code @ 100..=599) => Ok(code.to_string()),
            _ => Err(invalid()),
        },
        ArgValue::Str(s) => {
            let upper = s.to_uppercase();
            let is_code = s.len() == 3
                && s.parse::<u16>().map(|c| (100..=599).contains(&c)).unwrap_or(false);
            let is_range = upper.len() == 3
                && matches!(upper.as_bytes()[0], b'1'..=b'5')
                && &upper[1..] == "XX";
            if s == "default" {
                Ok(s.clone())
            } else if is_code {
                Ok(s.clone())
            } else if is_range {
                Ok(upper)
            } else {
                Err(invalid())
            }
        }
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaTypeDecl {
    pub media_type: String,
    pub schema: Option<SchemaDecl>,
    pub example: Option<Value>,
    pub examples: Option<IndexMap<String, Value>>,
}

impl MediaTypeDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut media_type = None;
        let mut schema = None;
        let mut example = None;
        let mut examples = None;
        for arg in args.iter() {
            match arg.name.as_str() {
                "" | "media_type" | "mediaType" => media_type = Some(arg.as_string()?),
                "schema" => schema = Some(parse_schema_value(arg)?),
                "example" => example = Some(arg.as_json()),
                "examples" => examples = Some(parse_examples(arg)?),
                _ => return Err(unknown(arg)),
            }
        }
        Ok(MediaTypeDecl {
            media_type: media_type.ok_or(AnnotationError::MissingArgument("media_type"))?,
            schema,
            example,
            examples,
        })
    }
}

/// Controller-level grouping; becomes a document tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiGroupDecl {
    pub name: String,
    pub description: Option<String>,
    pub external_docs: Option<String>,
}

impl ApiGroupDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut name = None;
        let mut description = None;
        let mut external_docs = None;
        for arg in args.iter() {
            match arg.name.as_str() {
                "" | "name" => name = Some(arg.as_string()?),
                "description" => description = Some(arg.as_string()?),
                "external_docs" | "externalDocs" => external_docs = Some(arg.as_string()?),
                _ => return Err(unknown(arg)),
            }
        }
        Ok(ApiGroupDecl {
            name: name.ok_or(AnnotationError::MissingArgument("name"))?,
            description,
            external_docs,
        })
    }
}

/// One security requirement set: `#[security(bearer, oauth = ["read"])]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityDecl {
    pub requirement: SecurityRequirement,
}

impl SecurityDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut requirement = SecurityRequirement::new();
        for arg in args.iter() {
            if arg.is_positional() {
                requirement.insert(arg.as_string()?, Vec::new());
                continue;
            }
            let scopes = match &arg.value {
                ArgValue::Flag => Vec::new(),
                _ => arg.as_string_list()?,
            };
            requirement.insert(arg.name.clone(), scopes);
        }
        if requirement.is_empty() {
            return Err(AnnotationError::MissingArgument("scheme"));
        }
        Ok(SecurityDecl { requirement })
    }
}

/// Marks a route, handler type or field as undocumented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HiddenDecl;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
    MorphOne,
    MorphMany,
}

impl RelationshipKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "belongs_to" | "belongsTo" => Some(RelationshipKind::BelongsTo),
            "has_one" | "hasOne" => Some(RelationshipKind::HasOne),
            "has_many" | "hasMany" => Some(RelationshipKind::HasMany),
            "belongs_to_many" | "belongsToMany" => Some(RelationshipKind::BelongsToMany),
            "morph_one" | "morphOne" => Some(RelationshipKind::MorphOne),
            "morph_many" | "morphMany" => Some(RelationshipKind::MorphMany),
            _ => None,
        }
    }

    /// Whether the relation holds a collection of related records.
    pub fn is_many(self) -> bool {
        matches!(
            self,
            RelationshipKind::HasMany | RelationshipKind::BelongsToMany | RelationshipKind::MorphMany
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDecl {
    pub kind: RelationshipKind,
    pub related: String,
    pub description: Option<String>,
    pub nullable: Option<bool>,
}

impl RelationshipDecl {
    pub fn from_args(args: &ArgList) -> Result<Self, AnnotationError> {
        let mut kind = None;
        let mut related = None;
        let mut description = None;
        let mut nullable = None;
        for arg in args.iter() {
            match arg.name.as_str() {
                "kind" | "type" => {
                    let raw = arg.as_string()?;
                    kind = Some(RelationshipKind::parse(&raw).ok_or_else(|| {
                        AnnotationError::Invalid(format!("unknown relationship kind `{}`", raw))
                    })?);
                }
                "related" | "model" => related = Some(arg.as_string()?),
                "description" => description = Some(arg.as_string()?),
                "nullable" => nullable = Some(arg.as_bool()?),
                name => match (RelationshipKind::parse(name), &arg.value) {
                    (Some(parsed), ArgValue::Flag) => kind = Some(parsed),
                    _ => return Err(unknown(arg)),
                },
            }
        }
        Ok(RelationshipDecl {
            kind: kind.ok_or(AnnotationError::MissingArgument("kind"))?,
            related: related.ok_or(AnnotationError::MissingArgument("related"))?,
            description,
            nullable,
        })
    }
}

/// A constructed annotation instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Schema(SchemaDecl),
    Property(PropertyDecl),
    Items(ItemsDecl),
    Operation(OperationDecl),
    Parameter(ParameterDecl),
    RequestBody(RequestBodyDecl),
    Response(ResponseDecl),
    MediaType(MediaTypeDecl),
    ApiGroup(ApiGroupDecl),
    Security(SecurityDecl),
    Hidden(HiddenDecl),
    Relationship(RelationshipDecl),
}

impl Annotation {
    /// Vocabulary name of an attribute: `name` or `openapi::name`.
    pub fn vocabulary_name(attr: &Attribute) -> Option<String> {
        let segments: Vec<String> = attr
            .path()
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect();
        let name = match segments.as_slice() {
            [name] => name,
            [prefix, name] if prefix == "openapi" => name,
            _ => return None,
        };
        match name.as_str() {
            "schema" | "property" | "items" | "operation" | "parameter" | "request_body"
            | "response" | "media_type" | "api_group" | "api_tag" | "security" | "hidden"
            | "relationship" => Some(name.clone()),
            _ => None,
        }
    }

    /// Builds the annotation for an attribute. `None` when the attribute is not part of the
    /// vocabulary.
    pub fn from_attribute(attr: &Attribute) -> Option<Result<Annotation, AnnotationError>> {
        let name = Self::vocabulary_name(attr)?;
        let args = match ArgList::from_attribute(attr) {
            Ok(args) => args,
            Err(e) => return Some(Err(e)),
        };
        Some(Self::from_args(&name, &args))
    }

    pub fn from_args(name: &str, args: &ArgList) -> Result<Annotation, AnnotationError> {
        let annotation = match name {
            "schema" => Annotation::Schema(SchemaDecl::from_args(args)?),
            "property" => Annotation::Property(PropertyDecl::from_args(args)?),
            "items" => Annotation::Items(ItemsDecl::from_args(args)?),
            "operation" => Annotation::Operation(OperationDecl::from_args(args)?),
            "parameter" => Annotation::Parameter(ParameterDecl::from_args(args)?),
            "request_body" => Annotation::RequestBody(RequestBodyDecl::from_args(args)?),
            "response" => Annotation::Response(ResponseDecl::from_args(args)?),
            "media_type" => Annotation::MediaType(MediaTypeDecl::from_args(args)?),
            "api_group" | "api_tag" => Annotation::ApiGroup(ApiGroupDecl::from_args(args)?),
            "security" => Annotation::Security(SecurityDecl::from_args(args)?),
            "hidden" => {
                if let Some(arg) = args.iter().next() {
                    return Err(unknown(arg));
                }
                Annotation::Hidden(HiddenDecl)
            }
            "relationship" => Annotation::Relationship(RelationshipDecl::from_args(args)?),
            other => return Err(AnnotationError::Invalid(format!("unknown annotation `{}`", other))),
        };
        Ok(annotation)
    }
}

/// Typed lookups over an entity's annotation list.
pub trait AnnotationsExt {
    fn operation(&self) -> Option<&OperationDecl>;
    fn schema(&self) -> Option<&SchemaDecl>;
    fn property(&self) -> Option<&PropertyDecl>;
    fn properties(&self) -> Vec<&PropertyDecl>;
    fn items(&self) -> Option<&ItemsDecl>;
    fn parameters(&self) -> Vec<&ParameterDecl>;
    fn request_body(&self) -> Option<&RequestBodyDecl>;
    fn responses(&self) -> Vec<&ResponseDecl>;
    fn api_groups(&self) -> Vec<&ApiGroupDecl>;
    fn security(&self) -> Vec<&SecurityDecl>;
    fn relationship(&self) -> Option<&RelationshipDecl>;
    fn is_hidden(&self) -> bool;
}

impl AnnotationsExt for [Annotation] {
    fn operation(&self) -> Option<&OperationDecl> {
        self.iter().find_map(|a| match a {
            Annotation::Operation(d) => Some(d),
            _ => None,
        })
    }

    fn schema(&self) -> Option<&SchemaDecl> {
        self.iter().find_map(|a| match a {
            Annotation::Schema(d) => Some(d),
            _ => None,
        })
    }

    fn property(&self) -> Option<&PropertyDecl> {
        self.properties().into_iter().next()
    }

    fn properties(&self) -> Vec<&PropertyDecl> {
        self.iter()
            .filter_map(|a| match a {
                Annotation::Property(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn items(&self) -> Option<&ItemsDecl> {
        self.iter().find_map(|a| match a {
            Annotation::Items(d) => Some(d),
            _ => None,
        })
    }

    fn parameters(&self) -> Vec<&ParameterDecl> {
        self.iter()
            .filter_map(|a| match a {
                Annotation::Parameter(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn request_body(&self) -> Option<&RequestBodyDecl> {
        self.iter().find_map(|a| match a {
            Annotation::RequestBody(d) => Some(d),
            _ => None,
        })
    }

    fn responses(&self) -> Vec<&ResponseDecl> {
        self.iter()
            .filter_map(|a| match a {
                Annotation::Response(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn api_groups(&self) -> Vec<&ApiGroupDecl> {
        self.iter()
            .filter_map(|a| match a {
                Annotation::ApiGroup(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn security(&self) -> Vec<&SecurityDecl> {
        self.iter()
            .filter_map(|a| match a {
                Annotation::Security(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn relationship(&self) -> Option<&RelationshipDecl> {
        self.iter().find_map(|a| match a {
            Annotation::Relationship(d) => Some(d),
            _ => None,
        })
    }

    fn is_hidden(&self) -> bool {
        self.iter().any(|a| matches!(a, Annotation::Hidden(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(name: &str, tokens: &str) -> Result<Annotation, AnnotationError> {
        let args: ArgList = syn::parse_str(tokens).unwrap();
        Annotation::from_args(name, &args)
    }

    #[test]
    fn test_property_decl() {
        let Annotation::Property(p) = build(
            "property",
            r#"type = "string", format = "date", nullable, example = "2024-01-01", enum = ["a"]"#,
        )
        .unwrap() else {
            panic!("expected property");
        };
        assert_eq!(p.attrs.schema_type.as_deref(), Some("string"));
        assert_eq!(p.attrs.nullable, Some(true));
        assert_eq!(p.attrs.example, Some(json!("2024-01-01")));
        assert_eq!(p.attrs.read_only, None);
        assert_eq!(p.required, None);
    }

    #[test]
    fn test_property_nested_items_and_properties() {
        let Annotation::Property(p) = build(
            "property",
            r#"type = "array", items(type = "object", properties(label(type = "string"), property(name = "done", type = "boolean")))"#,
        )
        .unwrap() else {
            panic!("expected property");
        };
        let items = p.items.unwrap();
        let names: Vec<_> = items.properties.iter().filter_map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["label", "done"]);
    }

    #[test]
    fn test_operation_decl_distinguishes_unset() {
        let Annotation::Operation(op) =
            build("operation", r#"summary = "S", tags = ["Tasks"], deprecated = false"#).unwrap()
        else {
            panic!("expected operation");
        };
        assert_eq!(op.summary.as_deref(), Some("S"));
        assert_eq!(op.description, None);
        assert_eq!(op.deprecated, Some(false));
        assert_eq!(op.tags, Some(vec!["Tasks".to_string()]));
        assert!(op.security.is_none());
    }

    #[test]
    fn test_operation_security_alternatives() {
        let Annotation::Operation(op) = build(
            "operation",
            r#"security(bearer), security(oauth = ["read", "write"])"#,
        )
        .unwrap() else {
            panic!("expected operation");
        };
        let security = op.security.unwrap();
        assert_eq!(security.len(), 2);
        assert_eq!(security[1]["oauth"], vec!["read", "write"]);
    }

    #[test]
    fn test_parameter_requires_name_and_location() {
        assert_eq!(
            build("parameter", r#"name = "q""#).unwrap_err(),
            AnnotationError::MissingArgument("in")
        );
        assert!(matches!(
            build("parameter", r#"name = "q", in = "body""#).unwrap_err(),
            AnnotationError::InvalidValue { .. }
        ));

        let Annotation::Parameter(p) =
            build("parameter", r#""status", in = "query", type = "string", enum = ["todo", "done"]"#)
                .unwrap()
        else {
            panic!("expected parameter");
        };
        assert_eq!(p.name, "status");
        assert_eq!(p.location, ParameterLocation::Query);
        let schema = p.schema.unwrap();
        assert_eq!(schema.attrs.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.attrs.enum_values, Some(vec![json!("todo"), json!("done")]));
    }

    #[test]
    fn test_parameter_schema_reference() {
        let Annotation::Parameter(p) =
            build("parameter", r#"name = "filter", in = "query", schema = TaskFilter"#).unwrap()
        else {
            panic!("expected parameter");
        };
        assert_eq!(p.schema.unwrap().attrs.reference.as_deref(), Some("TaskFilter"));
    }

    #[test]
    fn test_response_status_forms() {
        for (tokens, expected) in [
            ("201", "201"),
            (r#"status = "default""#, "default"),
            (r#"status = "4xx""#, "4XX"),
            (r#"description = "ok""#, "200"),
        ] {
            let Annotation::Response(r) = build("response", tokens).unwrap() else {
                panic!("expected response");
            };
            assert_eq!(r.status, expected);
        }
        assert!(build("response", "700").is_err());
        assert!(build("response", r#"status = "ok""#).is_err());
    }

    #[test]
    fn test_response_with_content_and_headers() {
        let Annotation::Response(r) = build(
            "response",
            r#"200, content(media_type("text/csv", example = "a,b")), headers(x_total = "Total count")"#,
        )
        .unwrap() else {
            panic!("expected response");
        };
        assert_eq!(r.content[0].media_type, "text/csv");
        assert_eq!(r.headers["x_total"], "Total count");
    }

    #[test]
    fn test_media_type_requires_name() {
        assert_eq!(
            build("media_type", r#"example = 1"#).unwrap_err(),
            AnnotationError::MissingArgument("media_type")
        );
    }

    #[test]
    fn test_api_group_positional() {
        let Annotation::ApiGroup(g) =
            build("api_group", r#""Tasks", description = "Task management""#).unwrap()
        else {
            panic!("expected group");
        };
        assert_eq!(g.name, "Tasks");
        assert_eq!(g.description.as_deref(), Some("Task management"));
    }

    #[test]
    fn test_relationship_forms() {
        let Annotation::Relationship(r) =
            build("relationship", r#"has_many, related = Comment"#).unwrap()
        else {
            panic!("expected relationship");
        };
        assert_eq!(r.kind, RelationshipKind::HasMany);
        assert!(r.kind.is_many());
        assert_eq!(r.related, "Comment");

        assert!(build("relationship", r#"kind = "owns", related = User"#).is_err());
        assert_eq!(
            build("relationship", r#"belongs_to"#).unwrap_err(),
            AnnotationError::MissingArgument("related")
        );
    }

    #[test]
    fn test_hidden_takes_no_arguments() {
        assert_eq!(
            build("hidden", "").unwrap(),
            Annotation::Hidden(HiddenDecl)
        );
        assert!(build("hidden", "always").is_err());
    }

    #[test]
    fn test_unknown_argument_is_rejected() {
        assert_eq!(
            build("schema", r#"colour = "red""#).unwrap_err(),
            AnnotationError::UnknownArgument("colour".to_string())
        );
    }

    #[test]
    fn test_lookups() {
        let annotations = vec![
            build("response", "200").unwrap(),
            build("response", "404").unwrap(),
            build("hidden", "").unwrap(),
        ];
        assert_eq!(annotations.responses().len(), 2);
        assert!(annotations.is_hidden());
        assert!(annotations.operation().is_none());
    }
}
