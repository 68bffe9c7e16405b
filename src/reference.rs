use crate::naming::short_name;
use crate::schema_generator::{Schema, SchemaFragment};
use std::collections::HashMap;

/// Prefix of every schema pointer in the document.
pub const SCHEMA_POINTER_PREFIX: &str = "#/components/schemas/";

/// Normalizes the three reference notations into one canonical pointer.
///
/// - `#/components/schemas/Task` is returned unchanged
/// - `crate::models::Task` (a known model) becomes a pointer to its short name
/// - any other name is used verbatim: `TaskList` -> `#/components/schemas/TaskList`
#[derive(Debug, Default, Clone)]
pub struct ReferenceResolver {
    /// qualified or short identifier -> component name
    models: HashMap<String, String>,
}

impl ReferenceResolver {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut models = HashMap::new();
        for identifier in identifiers {
            let identifier = identifier.as_ref();
            let name = short_name(identifier).to_string();
            models.insert(identifier.to_string(), name.clone());
            if let Some(relative) = identifier.strip_prefix("crate::") {
                models.insert(relative.to_string(), name.clone());
            }
            models.entry(name.clone()).or_insert(name);
        }
        Self { models }
    }

    pub fn pointer_for(name: &str) -> String {
        format!("{}{}", SCHEMA_POINTER_PREFIX, name)
    }

    /// Resolves a reference; empty input yields `None`.
    pub fn resolve(&self, reference: Option<&str>) -> Option<String> {
        let reference = reference?.trim();
        if reference.is_empty() {
            return None;
        }
        if reference.starts_with("#/") {
            return Some(reference.to_string());
        }
        if let Some(name) = self.models.get(reference) {
            return Some(Self::pointer_for(name));
        }
        Some(Self::pointer_for(reference))
    }

    /// Resolves every reference inside a fragment, e.g. one copied from configuration.
    pub fn resolve_fragment(&self, fragment: SchemaFragment) -> SchemaFragment {
        match fragment {
            SchemaFragment::Ref(reference) => match self.resolve(Some(&reference.pointer)) {
                Some(pointer) => SchemaFragment::reference(pointer),
                None => SchemaFragment::inline(Schema::typed("object")),
            },
            SchemaFragment::Inline(schema) => {
                let mut schema = *schema;
                schema.items = schema.items.map(|items| self.resolve_fragment(items));
                schema.properties = schema
                    .properties
                    .into_iter()
                    .map(|(name, property)| (name, self.resolve_fragment(property)))
                    .collect();
                SchemaFragment::inline(schema)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(["crate::models::Task"])
    }

    #[test]
    fn test_three_notations() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve(Some("#/components/schemas/Task")).as_deref(),
            Some("#/components/schemas/Task")
        );
        assert_eq!(
            resolver.resolve(Some("crate::models::Task")).as_deref(),
            Some("#/components/schemas/Task")
        );
        assert_eq!(
            resolver.resolve(Some("models::Task")).as_deref(),
            Some("#/components/schemas/Task")
        );
        assert_eq!(
            resolver.resolve(Some("TaskList")).as_deref(),
            Some("#/components/schemas/TaskList")
        );
    }

    #[test]
    fn test_empty_input() {
        let resolver = resolver();
        assert_eq!(resolver.resolve(None), None);
        assert_eq!(resolver.resolve(Some("")), None);
        assert_eq!(resolver.resolve(Some("   ")), None);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let resolver = resolver();
        for input in ["#/components/schemas/Task", "crate::models::Task", "Task", "Unknown"] {
            let once = resolver.resolve(Some(input)).unwrap();
            let twice = resolver.resolve(Some(&once)).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", input);
        }
    }

    #[test]
    fn test_resolve_fragment_recurses() {
        let resolver = resolver();
        let fragment: SchemaFragment = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "task": {"$ref": "Task"},
                "list": {"type": "array", "items": {"$ref": "crate::models::Task"}}
            }
        }))
        .unwrap();
        let resolved = serde_json::to_value(resolver.resolve_fragment(fragment)).unwrap();
        assert_eq!(resolved["properties"]["task"]["$ref"], "#/components/schemas/Task");
        assert_eq!(
            resolved["properties"]["list"]["items"]["$ref"],
            "#/components/schemas/Task"
        );
    }
}
