use crate::parser::ParsedFile;
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;
use syn::{Attribute, ImplItem, Item, Type};

/// What kind of source item owns a set of handler functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    /// A struct with inherent or trait impl blocks
    Struct,
    /// A module with free functions
    Module,
}

/// A handler function found in an impl block or a module.
#[derive(Debug, Clone)]
pub struct HandlerMethod {
    pub name: String,
    pub attrs: Vec<Attribute>,
}

/// A struct or module known to the source index.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    /// e.g. `crate::http::TaskController` or `crate::http::tasks`
    pub qualified_name: String,
    pub name: String,
    pub kind: OwnerKind,
    pub path: PathBuf,
    /// Struct attributes followed by impl block attributes, or module attributes.
    pub attrs: Vec<Attribute>,
    pub methods: Vec<HandlerMethod>,
    /// The struct definition, when the owner is a struct whose definition was parsed.
    pub item: Option<syn::ItemStruct>,
    /// Last path segment of every trait implemented for the struct.
    pub traits: Vec<String>,
}

impl TypeEntry {
    pub fn find_method(&self, name: &str) -> Option<&HandlerMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Whether the struct has no generic parameters and can be constructed as-is.
    pub fn is_concrete(&self) -> bool {
        self.item
            .as_ref()
            .map(|item| item.generics.params.is_empty())
            .unwrap_or(false)
    }

    pub fn implements(&self, trait_name: &str) -> bool {
        self.traits.iter().any(|t| t == trait_name)
    }
}

struct PendingImpl {
    module_path: String,
    type_name: String,
    item: syn::ItemImpl,
    path: PathBuf,
}

/// Index of structs, impl blocks and modules across a set of parsed files.
///
/// Lookups accept a qualified path (`crate::http::TaskController`), a path suffix
/// (`http::TaskController`) or a short name (`TaskController`).
pub struct TypeResolver {
    entries: Vec<TypeEntry>,
    by_qualified: HashMap<String, usize>,
}

impl TypeResolver {
    pub fn new(parsed_files: &[ParsedFile]) -> Self {
        let mut resolver = TypeResolver {
            entries: Vec::new(),
            by_qualified: HashMap::new(),
        };
        let mut pending_impls = Vec::new();
        let mut pending_mod_attrs: Vec<(String, Vec<Attribute>)> = Vec::new();

        for file in parsed_files {
            resolver.index_module(
                &file.module_path,
                &file.syntax_tree.attrs,
                &file.syntax_tree.items,
                &file.path,
                &mut pending_impls,
                &mut pending_mod_attrs,
            );
        }

        for pending in pending_impls {
            resolver.attach_impl(pending);
        }

        // `#[api_group("Tasks")] mod tasks;` annotates a module defined in another file.
        for (qualified, attrs) in pending_mod_attrs {
            if let Some(&idx) = resolver.by_qualified.get(&qualified) {
                let entry = &mut resolver.entries[idx];
                let mut merged = attrs;
                merged.append(&mut entry.attrs);
                entry.attrs = merged;
            }
        }

        debug!("Indexed {} types and modules", resolver.entries.len());
        resolver
    }

    fn index_module(
        &mut self,
        module_path: &str,
        module_attrs: &[Attribute],
        items: &[Item],
        path: &PathBuf,
        pending_impls: &mut Vec<PendingImpl>,
        pending_mod_attrs: &mut Vec<(String, Vec<Attribute>)>,
    ) {
        let mut functions = Vec::new();

        for item in items {
            match item {
                Item::Struct(item_struct) => {
                    let name = item_struct.ident.to_string();
                    self.insert(TypeEntry {
                        qualified_name: qualify(module_path, &name),
                        name,
                        kind: OwnerKind::Struct,
                        path: path.clone(),
                        attrs: item_struct.attrs.clone(),
                        methods: Vec::new(),
                        item: Some(item_struct.clone()),
                        traits: Vec::new(),
                    });
                }
                Item::Impl(item_impl) => {
                    if let Some(type_name) = self_type_name(&item_impl.self_ty) {
                        pending_impls.push(PendingImpl {
                            module_path: module_path.to_string(),
                            type_name,
                            item: item_impl.clone(),
                            path: path.clone(),
                        });
                    }
                }
                Item::Fn(item_fn) => functions.push(HandlerMethod {
                    name: item_fn.sig.ident.to_string(),
                    attrs: item_fn.attrs.clone(),
                }),
                Item::Mod(item_mod) => {
                    let nested = qualify(module_path, &item_mod.ident.to_string());
                    match &item_mod.content {
                        Some((_, nested_items)) => self.index_module(
                            &nested,
                            &item_mod.attrs,
                            nested_items,
                            path,
                            pending_impls,
                            pending_mod_attrs,
                        ),
                        None => pending_mod_attrs.push((nested, item_mod.attrs.clone())),
                    }
                }
                _ => {}
            }
        }

        let name = module_path
            .rsplit("::")
            .next()
            .unwrap_or(module_path)
            .to_string();
        self.insert(TypeEntry {
            qualified_name: module_path.to_string(),
            name,
            kind: OwnerKind::Module,
            path: path.clone(),
            attrs: module_attrs.to_vec(),
            methods: functions,
            item: None,
            traits: Vec::new(),
        });
    }

    fn insert(&mut self, entry: TypeEntry) {
        if self.by_qualified.contains_key(&entry.qualified_name) {
            debug!("Duplicate definition of {}, keeping the first", entry.qualified_name);
            return;
        }
        self.by_qualified
            .insert(entry.qualified_name.clone(), self.entries.len());
        self.entries.push(entry);
    }

    fn attach_impl(&mut self, pending: PendingImpl) {
        let qualified = qualify(&pending.module_path, &pending.type_name);
        let idx = self.by_qualified.get(&qualified).copied().or_else(|| {
            self.entries
                .iter()
                .position(|e| e.kind == OwnerKind::Struct && e.name == pending.type_name)
        });

        let idx = match idx {
            Some(idx) => idx,
            None => {
                // the struct lives in a file that was not parsed
                self.insert(TypeEntry {
                    qualified_name: qualified.clone(),
                    name: pending.type_name.clone(),
                    kind: OwnerKind::Struct,
                    path: pending.path.clone(),
                    attrs: Vec::new(),
                    methods: Vec::new(),
                    item: None,
                    traits: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[idx];
        match &pending.item.trait_ {
            Some((_, trait_path, _)) => {
                if let Some(segment) = trait_path.segments.last() {
                    entry.traits.push(segment.ident.to_string());
                }
            }
            None => entry.attrs.extend(pending.item.attrs.iter().cloned()),
        }

        for impl_item in &pending.item.items {
            if let ImplItem::Fn(method) = impl_item {
                entry.methods.push(HandlerMethod {
                    name: method.sig.ident.to_string(),
                    attrs: method.attrs.clone(),
                });
            }
        }
    }

    pub fn entries(&self) -> &[TypeEntry] {
        &self.entries
    }

    pub fn structs(&self) -> impl Iterator<Item = &TypeEntry> {
        self.entries.iter().filter(|e| e.kind == OwnerKind::Struct)
    }

    /// Finds a struct or module by qualified path, path suffix or short name.
    pub fn find(&self, name: &str) -> Option<&TypeEntry> {
        let name = name.trim().trim_start_matches("::");
        if let Some(&idx) = self.by_qualified.get(name) {
            return Some(&self.entries[idx]);
        }

        let suffix = format!("::{}", name);
        let mut matches = self
            .entries
            .iter()
            .filter(|e| e.qualified_name.ends_with(&suffix) || e.qualified_name == name);
        let first = matches.next();
        if first.is_some() && matches.next().is_some() {
            debug!("Ambiguous type name {}, using {}", name, first.map(|e| e.qualified_name.as_str()).unwrap_or_default());
        }
        first
    }

    /// Finds a free function by name across all modules.
    pub fn find_function(&self, name: &str) -> Option<(&TypeEntry, &HandlerMethod)> {
        let mut found = self
            .entries
            .iter()
            .filter(|e| e.kind == OwnerKind::Module)
            .filter_map(|e| e.find_method(name).map(|m| (e, m)));
        let first = found.next();
        if first.is_some() && found.next().is_some() {
            debug!("Function {} is defined in several modules, using the first", name);
        }
        first
    }
}

fn qualify(module_path: &str, name: &str) -> String {
    if module_path.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", module_path, name)
    }
}

fn self_type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// `#[serde(..)]` options that change how a field appears in the API.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SerdeFieldOptions {
    pub rename: Option<String>,
    pub skip: bool,
}

impl SerdeFieldOptions {
    pub fn from_attrs(attrs: &[Attribute]) -> Self {
        let mut options = SerdeFieldOptions::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    options.rename = Some(value.value());
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    options.skip = true;
                } else if meta.input.peek(syn::Token![=]) {
                    // consume values of options we do not care about
                    let _: syn::Expr = meta.value()?.parse()?;
                } else if meta.input.peek(syn::token::Paren) {
                    meta.parse_nested_meta(|nested| {
                        if nested.input.peek(syn::Token![=]) {
                            let _: syn::Expr = nested.value()?.parse()?;
                        }
                        Ok(())
                    })?;
                }
                Ok(())
            });
        }
        options
    }
}

/// Unwraps `Option<T>`, reporting whether the type was optional.
pub fn unwrap_option(ty: &Type) -> (bool, &Type) {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                        return (true, inner);
                    }
                }
            }
        }
    }
    (false, ty)
}

/// Cast hint implied by a Rust field type, for the schema generator's cast families.
pub fn cast_hint_for_type(ty: &Type) -> Option<&'static str> {
    let (_, ty) = unwrap_option(ty);
    match ty {
        Type::Reference(reference) => cast_hint_for_type(&reference.elem),
        Type::Slice(_) | Type::Array(_) => Some("array"),
        Type::Path(type_path) => {
            let segment = type_path.path.segments.last()?;
            let hint = match segment.ident.to_string().as_str() {
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" => "integer",
                "f32" | "f64" => "float",
                "Decimal" | "BigDecimal" => "decimal",
                "bool" => "boolean",
                "String" | "str" | "char" => "string",
                "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "IndexSet" => "array",
                "HashMap" | "BTreeMap" | "IndexMap" => "object",
                "Value" | "JsonValue" => "json",
                "NaiveDate" | "Date" => "date",
                "NaiveDateTime" | "DateTime" | "OffsetDateTime" | "PrimitiveDateTime"
                | "SystemTime" | "Timestamp" => "datetime",
                _ => return None,
            };
            Some(hint)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_from(sources: &[(&str, &str)]) -> TypeResolver {
        let files: Vec<ParsedFile> = sources
            .iter()
            .map(|(module, code)| ParsedFile::from_source(module, code).unwrap())
            .collect();
        TypeResolver::new(&files)
    }

    #[test]
    fn test_struct_with_impl_methods() {
        let resolver = resolver_from(&[(
            "crate::http::tasks",
            r#"
            #[api_group("Tasks")]
            pub struct TaskController;

            #[security(bearer)]
            impl TaskController {
                #[operation(summary = "List")]
                pub async fn index() {}
                pub async fn show() {}
            }
            "#,
        )]);

        let entry = resolver.find("TaskController").unwrap();
        assert_eq!(entry.qualified_name, "crate::http::tasks::TaskController");
        assert_eq!(entry.kind, OwnerKind::Struct);
        assert_eq!(entry.attrs.len(), 2);
        assert_eq!(entry.methods.len(), 2);
        assert_eq!(entry.find_method("index").unwrap().attrs.len(), 1);
        assert!(entry.is_concrete());
    }

    #[test]
    fn test_impl_in_another_file() {
        let resolver = resolver_from(&[
            ("crate::models::task", "pub struct Task { id: u64 }"),
            (
                "crate::models::task_impl",
                "impl Model for Task {} impl Task { fn table() {} }",
            ),
        ]);
        let entry = resolver.find("crate::models::task::Task").unwrap();
        assert!(entry.implements("Model"));
        assert!(entry.find_method("table").is_some());
    }

    #[test]
    fn test_lookup_by_suffix_and_modules() {
        let resolver = resolver_from(&[
            ("crate::handlers::tasks", "pub async fn index() {} pub async fn store() {}"),
            (
                "crate",
                r#"
                #[api_group("Users")]
                mod users {
                    pub async fn index() {}
                }
                "#,
            ),
        ]);

        let tasks = resolver.find("handlers::tasks").unwrap();
        assert_eq!(tasks.kind, OwnerKind::Module);
        assert_eq!(tasks.methods.len(), 2);

        let users = resolver.find("crate::users").unwrap();
        assert_eq!(users.attrs.len(), 1);

        let (owner, method) = resolver.find_function("store").unwrap();
        assert_eq!(owner.qualified_name, "crate::handlers::tasks");
        assert_eq!(method.name, "store");
        assert!(resolver.find("Missing").is_none());
    }

    #[test]
    fn test_module_declaration_attributes() {
        let resolver = resolver_from(&[
            ("crate", r#"#[api_group("Tasks")] pub mod tasks;"#),
            ("crate::tasks", "#![security(bearer)] pub async fn index() {}"),
        ]);
        let tasks = resolver.find("crate::tasks").unwrap();
        assert_eq!(tasks.attrs.len(), 2);
    }

    #[test]
    fn test_generic_struct_is_not_concrete() {
        let resolver = resolver_from(&[("crate::models", "pub struct Page<T> { items: Vec<T> }")]);
        assert!(!resolver.find("Page").unwrap().is_concrete());
    }

    #[test]
    fn test_serde_field_options() {
        let item: syn::ItemStruct = syn::parse_str(
            r#"
            struct Task {
                #[serde(rename = "dueDate", default)]
                due_date: String,
                #[serde(skip)]
                cache: String,
                #[serde(skip_serializing_if = "Option::is_none")]
                notes: Option<String>,
            }
            "#,
        )
        .unwrap();
        let fields: Vec<_> = item.fields.iter().collect();
        assert_eq!(
            SerdeFieldOptions::from_attrs(&fields[0].attrs).rename.as_deref(),
            Some("dueDate")
        );
        assert!(SerdeFieldOptions::from_attrs(&fields[1].attrs).skip);
        assert_eq!(SerdeFieldOptions::from_attrs(&fields[2].attrs), SerdeFieldOptions::default());
    }

    #[test]
    fn test_cast_hints() {
        let hint = |code: &str| {
            let ty: Type = syn::parse_str(code).unwrap();
            cast_hint_for_type(&ty)
        };
        assert_eq!(hint("u64"), Some("integer"));
        assert_eq!(hint("Option<f64>"), Some("float"));
        assert_eq!(hint("chrono::NaiveDate"), Some("date"));
        assert_eq!(hint("DateTime<Utc>"), Some("datetime"));
        assert_eq!(hint("Vec<String>"), Some("array"));
        assert_eq!(hint("serde_json::Value"), Some("json"));
        assert_eq!(hint("HashMap<String, String>"), Some("object"));
        assert_eq!(hint("Uuid"), None);

        let ty: Type = syn::parse_str("Option<String>").unwrap();
        assert!(unwrap_option(&ty).0);
    }
}
