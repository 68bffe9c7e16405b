use super::Annotation;
use log::{debug, warn};
use syn::Attribute;

/// A source entity that can carry annotations.
pub trait Annotated {
    fn attributes(&self) -> &[Attribute];

    /// Human readable name used in diagnostics.
    fn entity_name(&self) -> String;
}

impl Annotated for syn::ItemStruct {
    fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    fn entity_name(&self) -> String {
        format!("struct {}", self.ident)
    }
}

impl Annotated for syn::ItemImpl {
    fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    fn entity_name(&self) -> String {
        "impl block".to_string()
    }
}

impl Annotated for syn::ImplItemFn {
    fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    fn entity_name(&self) -> String {
        format!("method {}", self.sig.ident)
    }
}

impl Annotated for syn::ItemFn {
    fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    fn entity_name(&self) -> String {
        format!("fn {}", self.sig.ident)
    }
}

impl Annotated for syn::ItemMod {
    fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    fn entity_name(&self) -> String {
        format!("mod {}", self.ident)
    }
}

impl Annotated for syn::Field {
    fn attributes(&self) -> &[Attribute] {
        &self.attrs
    }

    fn entity_name(&self) -> String {
        match &self.ident {
            Some(ident) => format!("field {}", ident),
            None => "tuple field".to_string(),
        }
    }
}

/// Reads annotation instances off source entities.
pub struct AnnotationExtractor;

impl AnnotationExtractor {
    /// Returns the annotations of `entity` in declaration order.
    ///
    /// An annotation that fails to construct is logged and left out; the others on the same
    /// entity are still returned.
    pub fn extract<T: Annotated + ?Sized>(entity: &T) -> Vec<Annotation> {
        Self::extract_attributes(entity.attributes(), &entity.entity_name())
    }

    pub fn extract_attributes(attrs: &[Attribute], entity: &str) -> Vec<Annotation> {
        let annotations: Vec<Annotation> = attrs
            .iter()
            .filter_map(|attr| match Annotation::from_attribute(attr)? {
                Ok(annotation) => Some(annotation),
                Err(e) => {
                    let name = Annotation::vocabulary_name(attr).unwrap_or_default();
                    warn!("Skipping malformed #[{}] on {}: {}", name, entity, e);
                    None
                }
            })
            .collect();

        if !annotations.is_empty() {
            debug!("Extracted {} annotations from {}", annotations.len(), entity);
        }

        annotations
    }
}
