//! Shape descriptors for definitions and output models.
//!
//! A declaration describes WHAT it accepts (a [`DefinitionShape`]) and WHAT it
//! publishes (a [`ModelShape`]). Shapes are plain data so the registry can
//! validate them and the binder can build fresh instances for every binding.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::Identifier;
use crate::model::{ModelValue, ValueKind};

/// A single field of a definition.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: Identifier,
    pub kind: ValueKind,
    pub required: bool,
    pub default: Option<ModelValue>,
}

/// The declared shape of user-facing definition input.
#[derive(Debug, Clone)]
pub struct DefinitionShape {
    name: Identifier,
    fields: Vec<FieldSpec>,
}

impl DefinitionShape {
    /// Create a shape with no fields.
    pub fn new(name: impl Into<Identifier>) -> Self {
        DefinitionShape {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add an optional field.
    pub fn field(mut self, name: impl Into<Identifier>, kind: ValueKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: false,
            default: None,
        });
        self
    }

    /// Add a field that must be present in the raw input.
    pub fn required(mut self, name: impl Into<Identifier>, kind: ValueKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
            required: true,
            default: None,
        });
        self
    }

    /// Add an optional field with a default used when the input omits it.
    pub fn with_default(mut self, name: impl Into<Identifier>, default: impl Into<ModelValue>) -> Self {
        let default = default.into();
        self.fields.push(FieldSpec {
            name: name.into(),
            kind: default.kind(),
            required: false,
            default: Some(default),
        });
        self
    }

    pub fn name(&self) -> Identifier {
        self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }

    /// Names that fail identifier validation.
    pub(crate) fn invalid_names(&self) -> Vec<String> {
        std::iter::once(self.name)
            .chain(self.fields.iter().map(|f| f.name))
            .filter(|n| !n.is_valid())
            .map(|n| n.to_string())
            .collect()
    }
}

/// The declared shape of an output model node.
///
/// A node carries lazily-bound properties, appendable source directory sets,
/// and named collections of child nodes with a fixed element shape.
#[derive(Debug, Clone)]
pub struct ModelShape {
    name: Identifier,
    properties: BTreeMap<Identifier, ValueKind>,
    source_sets: BTreeSet<Identifier>,
    collections: BTreeMap<Identifier, Arc<ModelShape>>,
}

impl ModelShape {
    pub fn new(name: impl Into<Identifier>) -> Self {
        ModelShape {
            name: name.into(),
            properties: BTreeMap::new(),
            source_sets: BTreeSet::new(),
            collections: BTreeMap::new(),
        }
    }

    pub fn property(mut self, name: impl Into<Identifier>, kind: ValueKind) -> Self {
        self.properties.insert(name.into(), kind);
        self
    }

    pub fn source_set(mut self, name: impl Into<Identifier>) -> Self {
        self.source_sets.insert(name.into());
        self
    }

    pub fn collection(mut self, name: impl Into<Identifier>, element: ModelShape) -> Self {
        self.collections.insert(name.into(), Arc::new(element));
        self
    }

    pub fn name(&self) -> Identifier {
        self.name
    }

    pub fn properties(&self) -> &BTreeMap<Identifier, ValueKind> {
        &self.properties
    }

    pub fn property_kind(&self, name: &str) -> Option<ValueKind> {
        self.properties.get(name).copied()
    }

    pub fn source_sets(&self) -> &BTreeSet<Identifier> {
        &self.source_sets
    }

    pub fn collections(&self) -> &BTreeMap<Identifier, Arc<ModelShape>> {
        &self.collections
    }

    pub fn collection_shape(&self, name: &str) -> Option<&Arc<ModelShape>> {
        self.collections.get(name)
    }

    /// Whether a node of `shape` appears anywhere in this shape tree.
    pub fn contains_shape(&self, shape: &str) -> bool {
        self.name.as_str() == shape
            || self
                .collections
                .values()
                .any(|element| element.contains_shape(shape))
    }

    pub(crate) fn invalid_names(&self) -> Vec<String> {
        let mut invalid: Vec<String> = std::iter::once(self.name)
            .chain(self.properties.keys().copied())
            .chain(self.source_sets.iter().copied())
            .chain(self.collections.keys().copied())
            .filter(|n| !n.is_valid())
            .map(|n| n.to_string())
            .collect();

        for element in self.collections.values() {
            invalid.extend(element.invalid_names());
        }
        invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_shape_defaults_carry_kind() {
        let shape = DefinitionShape::new("CheckstyleSourceSetDefinition")
            .with_default("configFile", std::path::PathBuf::from("config/checkstyle.xml"))
            .required("toolVersion", ValueKind::String);

        let config = shape.field_named("configFile").unwrap();
        assert_eq!(config.kind, ValueKind::Path);
        assert!(!config.required);

        let version = shape.field_named("toolVersion").unwrap();
        assert!(version.required);
        assert!(version.default.is_none());
    }

    #[test]
    fn test_model_shape_contains_nested_shape() {
        let shape = ModelShape::new("JavaLibraryOutputs")
            .property("jarFile", ValueKind::Path)
            .collection(
                "sources",
                ModelShape::new("JavaSources").source_set("java"),
            );

        assert!(shape.contains_shape("JavaSources"));
        assert!(shape.contains_shape("JavaLibraryOutputs"));
        assert!(!shape.contains_shape("CheckstyleModel"));
        assert_eq!(shape.property_kind("jarFile"), Some(ValueKind::Path));
    }

    #[test]
    fn test_invalid_names_are_reported() {
        let shape = ModelShape::new("Outputs")
            .property("jar file", ValueKind::Path)
            .collection("sources", ModelShape::new("9Sources"));

        let invalid = shape.invalid_names();
        assert!(invalid.contains(&"jar file".to_string()));
        assert!(invalid.contains(&"9Sources".to_string()));
    }
}
