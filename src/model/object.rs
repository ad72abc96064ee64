//! Model objects - the typed configuration tree a binding publishes.
//!
//! Every node is created from a [`ModelShape`]: declared properties start out
//! as unbound lazy values, declared source sets start out empty, and declared
//! collections accept children of their element shape. Nodes are addressed by
//! a dotted [`ModelPath`] of `collection.child` pairs, e.g. `sources.main`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::core::{Identifier, ModelShape};
use crate::model::{ConfigurationPhase, LazyModelValue, ModelError, ModelValue, ValueKind};
use crate::sources::SourceDirectorySet;

/// Path of a node inside a model tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelPath {
    segments: Vec<Identifier>,
}

impl ModelPath {
    /// The root of a model tree.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path. The empty string is the root.
    pub fn parse(path: &str) -> Result<Self, ModelError> {
        if path.is_empty() {
            return Ok(Self::root());
        }

        let segments = path
            .split('.')
            .map(|s| {
                Identifier::parse(s).ok_or_else(|| ModelError::UnknownPath {
                    path: path.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if segments.len() % 2 != 0 {
            return Err(ModelError::UnknownPath {
                path: path.to_string(),
            });
        }

        Ok(ModelPath { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Render a child path from raw names without interning them.
    fn describe_child(&self, collection: &str, name: &str) -> String {
        if self.is_root() {
            format!("{}.{}", collection, name)
        } else {
            format!("{}.{}.{}", self, collection, name)
        }
    }

    pub fn join(&self, collection: Identifier, name: Identifier) -> Self {
        let mut segments = self.segments.clone();
        segments.push(collection);
        segments.push(name);
        ModelPath { segments }
    }

    /// `(collection, child)` pairs from the root down.
    pub fn steps(&self) -> impl Iterator<Item = (Identifier, Identifier)> + '_ {
        self.segments.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "<root>");
        }
        let parts: Vec<&str> = self.segments.iter().map(Identifier::as_str).collect();
        write!(f, "{}", parts.join("."))
    }
}

struct ObjectInner {
    name: Identifier,
    owner: String,
    path: ModelPath,
    shape: Arc<ModelShape>,
    phase: ConfigurationPhase,
    properties: BTreeMap<Identifier, LazyModelValue<ModelValue>>,
    source_sets: BTreeMap<Identifier, SourceDirectorySet>,
    collections: BTreeMap<Identifier, RwLock<BTreeMap<Identifier, ModelObject>>>,
}

/// A node of a published output model (or of a parent capability).
#[derive(Clone)]
pub struct ModelObject {
    inner: Arc<ObjectInner>,
}

impl ModelObject {
    /// Create an empty root node of `shape`.
    ///
    /// `owner` names the binding the model belongs to and prefixes every
    /// value description, e.g. `:app/javaLibrary`.
    pub fn new(
        name: impl Into<Identifier>,
        owner: impl Into<String>,
        shape: Arc<ModelShape>,
        phase: &ConfigurationPhase,
    ) -> Self {
        Self::build(name.into(), owner.into(), ModelPath::root(), shape, phase)
    }

    fn build(
        name: Identifier,
        owner: String,
        path: ModelPath,
        shape: Arc<ModelShape>,
        phase: &ConfigurationPhase,
    ) -> Self {
        let prefix = if path.is_root() {
            owner.clone()
        } else {
            format!("{}.{}", owner, path)
        };

        let properties = shape
            .properties()
            .keys()
            .map(|prop| {
                let description = format!("{}.{}", prefix, prop);
                (*prop, LazyModelValue::in_phase(description, phase))
            })
            .collect();

        let source_sets = shape
            .source_sets()
            .iter()
            .map(|set| {
                let source_set = SourceDirectorySet::new(
                    format!("{}.{}", name, set),
                    format!("{} {} source", name, set),
                );
                (*set, source_set)
            })
            .collect();

        let collections = shape
            .collections()
            .keys()
            .map(|c| (*c, RwLock::new(BTreeMap::new())))
            .collect();

        ModelObject {
            inner: Arc::new(ObjectInner {
                name,
                owner,
                path,
                shape,
                phase: phase.clone(),
                properties,
                source_sets,
                collections,
            }),
        }
    }

    pub fn name(&self) -> Identifier {
        self.inner.name
    }

    pub fn path(&self) -> &ModelPath {
        &self.inner.path
    }

    pub fn shape(&self) -> &ModelShape {
        &self.inner.shape
    }

    pub fn shape_name(&self) -> Identifier {
        self.inner.shape.name()
    }

    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    /// Whether both handles refer to the same node.
    pub fn same_as(&self, other: &ModelObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The lazy cell behind a declared property.
    pub fn property(&self, name: &str) -> Result<LazyModelValue<ModelValue>, ModelError> {
        self.inner
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownProperty {
                shape: self.shape_name().to_string(),
                property: name.to_string(),
            })
    }

    fn declared_kind(&self, name: &str) -> Result<ValueKind, ModelError> {
        self.inner
            .shape
            .property_kind(name)
            .ok_or_else(|| ModelError::UnknownProperty {
                shape: self.shape_name().to_string(),
                property: name.to_string(),
            })
    }

    /// Bind a property to a value computed now.
    pub fn set(&self, name: &str, value: impl Into<ModelValue>) -> Result<(), ModelError> {
        let value = value.into();
        let expected = self.declared_kind(name)?;
        check_kind(name, expected, &value)?;
        self.property(name)?.set_value(value)
    }

    /// Bind a property to a value that resolves later.
    ///
    /// The kind is checked when the value is first read.
    pub fn bind<T>(&self, name: &str, source: &LazyModelValue<T>) -> Result<(), ModelError>
    where
        T: Into<ModelValue> + Clone + Send + Sync + 'static,
    {
        let expected = self.declared_kind(name)?;
        let property = name.to_string();
        let source = source.clone();

        self.property(name)?.set(move || {
            let value: ModelValue = source.get()?.into();
            check_kind(&property, expected, &value)?;
            Ok(value)
        })
    }

    /// Read a property, computing it if necessary.
    pub fn get(&self, name: &str) -> Result<ModelValue, ModelError> {
        self.property(name)?.get()
    }

    /// Read a property, blocking until its project finishes configuration.
    pub fn wait(&self, name: &str) -> Result<ModelValue, ModelError> {
        self.property(name)?.wait()
    }

    /// Read a path property.
    pub fn path_value(&self, name: &str) -> Result<PathBuf, ModelError> {
        match self.get(name)? {
            ModelValue::Path(p) => Ok(p),
            other => Err(ModelError::TypeMismatch {
                property: name.to_string(),
                expected: ValueKind::Path,
                found: other.kind(),
            }),
        }
    }

    /// A declared source directory set.
    pub fn source_set(&self, name: &str) -> Result<SourceDirectorySet, ModelError> {
        self.inner
            .source_sets
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownSourceSet {
                shape: self.shape_name().to_string(),
                name: name.to_string(),
            })
    }

    fn collection(
        &self,
        collection: &str,
    ) -> Result<&RwLock<BTreeMap<Identifier, ModelObject>>, ModelError> {
        self.inner
            .collections
            .get(collection)
            .ok_or_else(|| ModelError::UnknownCollection {
                shape: self.shape_name().to_string(),
                collection: collection.to_string(),
            })
    }

    /// Add a child node to a declared collection.
    pub fn register_child(&self, collection: &str, name: &str) -> Result<ModelObject, ModelError> {
        let children = self.collection(collection)?;
        let element = self
            .inner
            .shape
            .collection_shape(collection)
            .cloned()
            .ok_or_else(|| ModelError::UnknownCollection {
                shape: self.shape_name().to_string(),
                collection: collection.to_string(),
            })?;

        let child_name = Identifier::parse(name).ok_or_else(|| ModelError::UnknownPath {
            path: format!("{}.{}", collection, name),
        })?;

        let mut children = children.write().unwrap_or_else(PoisonError::into_inner);
        if children.contains_key(&child_name) {
            return Err(ModelError::DuplicateChild {
                collection: collection.to_string(),
                name: name.to_string(),
            });
        }

        let child = ModelObject::build(
            child_name,
            self.inner.owner.clone(),
            self.inner.path.join(Identifier::new(collection), child_name),
            element,
            &self.inner.phase,
        );
        children.insert(child_name, child.clone());

        tracing::trace!("registered {} in {}", child.path(), self.inner.owner);
        Ok(child)
    }

    /// Look up a child node.
    pub fn child(&self, collection: &str, name: &str) -> Result<ModelObject, ModelError> {
        self.collection(collection)?
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownPath {
                path: self.inner.path.describe_child(collection, name),
            })
    }

    /// Children of a collection, ordered by name.
    pub fn children(&self, collection: &str) -> Result<Vec<ModelObject>, ModelError> {
        Ok(self
            .collection(collection)?
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    /// Resolve a path relative to this node.
    pub fn find(&self, path: &ModelPath) -> Result<ModelObject, ModelError> {
        let mut node = self.clone();
        for (collection, name) in path.steps() {
            node = node.child(&collection, &name).map_err(|_| ModelError::UnknownPath {
                path: path.to_string(),
            })?;
        }
        Ok(node)
    }

    /// This node and every node below it, depth first.
    pub fn descendants(&self) -> Vec<ModelObject> {
        let mut nodes = vec![self.clone()];
        for children in self.inner.collections.values() {
            let children = children.read().unwrap_or_else(PoisonError::into_inner);
            for child in children.values() {
                nodes.extend(child.descendants());
            }
        }
        nodes
    }

    /// Descriptions of declared properties nobody has bound.
    pub fn unbound_properties(&self) -> Vec<String> {
        self.descendants()
            .iter()
            .flat_map(|node| {
                node.inner
                    .properties
                    .values()
                    .filter(|v| !v.is_bound())
                    .map(|v| v.description().to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// A serialisable view of the tree.
    ///
    /// Bound properties are computed; unbound or failing ones appear as `null`.
    pub fn snapshot(&self) -> ObjectSnapshot {
        let properties = self
            .inner
            .properties
            .iter()
            .map(|(name, value)| {
                let resolved = if value.is_bound() {
                    value.get().ok()
                } else {
                    None
                };
                (name.to_string(), resolved)
            })
            .collect();

        let source_sets = self
            .inner
            .source_sets
            .iter()
            .map(|(name, set)| (name.to_string(), set.src_dirs().unwrap_or_default()))
            .collect();

        let collections = self
            .inner
            .collections
            .iter()
            .map(|(name, children)| {
                let children = children.read().unwrap_or_else(PoisonError::into_inner);
                let snapshots = children
                    .iter()
                    .map(|(child, node)| (child.to_string(), node.snapshot()))
                    .collect();
                (name.to_string(), snapshots)
            })
            .collect();

        ObjectSnapshot {
            shape: self.shape_name().to_string(),
            properties,
            source_sets,
            collections,
        }
    }
}

fn check_kind(property: &str, expected: ValueKind, value: &ModelValue) -> Result<(), ModelError> {
    if value.kind() == expected {
        Ok(())
    } else {
        Err(ModelError::TypeMismatch {
            property: property.to_string(),
            expected,
            found: value.kind(),
        })
    }
}

impl fmt::Debug for ModelObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelObject")
            .field("owner", &self.inner.owner)
            .field("path", &self.inner.path)
            .field("shape", &self.shape_name())
            .finish()
    }
}

/// Serialisable view of a [`ModelObject`].
#[derive(Debug, Clone, Serialize)]
pub struct ObjectSnapshot {
    pub shape: String,
    pub properties: BTreeMap<String, Option<ModelValue>>,
    pub source_sets: BTreeMap<String, Vec<PathBuf>>,
    pub collections: BTreeMap<String, BTreeMap<String, ObjectSnapshot>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_shape() -> Arc<ModelShape> {
        Arc::new(
            ModelShape::new("JavaLibraryOutputs")
                .property("jarFile", ValueKind::Path)
                .collection(
                    "sources",
                    ModelShape::new("JavaSources")
                        .source_set("java")
                        .property("byteCodeDir", ValueKind::Path),
                ),
        )
    }

    fn library() -> ModelObject {
        let phase = ConfigurationPhase::new(":app");
        ModelObject::new("javaLibrary", ":app/javaLibrary", library_shape(), &phase)
    }

    #[test]
    fn test_declared_properties_start_unbound() {
        let model = library();

        assert!(model.property("jarFile").is_ok());
        assert!(matches!(
            model.property("classes"),
            Err(ModelError::UnknownProperty { .. })
        ));
        assert_eq!(model.unbound_properties(), vec![":app/javaLibrary.jarFile"]);
    }

    #[test]
    fn test_set_checks_kind() {
        let model = library();

        let err = model.set("jarFile", true).unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));

        model.set("jarFile", PathBuf::from("build/libs/app.jar")).unwrap();
        assert_eq!(
            model.path_value("jarFile").unwrap(),
            PathBuf::from("build/libs/app.jar")
        );
    }

    #[test]
    fn test_bind_checks_kind_on_read() {
        let model = library();
        let wrong = LazyModelValue::resolved("flag", true);
        model.bind("jarFile", &wrong).unwrap();

        assert!(matches!(
            model.get("jarFile"),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_children_are_addressable_by_path() {
        let model = library();
        let main = model.register_child("sources", "main").unwrap();
        model.register_child("sources", "test").unwrap();

        assert_eq!(main.path().to_string(), "sources.main");
        assert_eq!(main.shape_name().as_str(), "JavaSources");

        let found = model.find(&ModelPath::parse("sources.main").unwrap()).unwrap();
        assert!(found.same_as(&main));

        let err = model.register_child("sources", "main").unwrap_err();
        assert!(matches!(err, ModelError::DuplicateChild { .. }));

        assert!(model.find(&ModelPath::parse("sources.docs").unwrap()).is_err());
        assert_eq!(model.descendants().len(), 3);
    }

    #[test]
    fn test_missing_child_is_not_interned() {
        let model = library();
        model.register_child("sources", "main").unwrap();

        let err = model.child("sources", "nosuchChild42").unwrap_err();
        match err {
            ModelError::UnknownPath { path } => assert_eq!(path, "sources.nosuchChild42"),
            other => panic!("expected UnknownPath, got {other:?}"),
        }
        assert!(!Identifier::is_interned("nosuchChild42"));

        let main = model.child("sources", "main").unwrap();
        let err = main.child("sources", "nested").unwrap_err();
        assert!(matches!(err, ModelError::UnknownCollection { .. }));
    }

    #[test]
    fn test_model_path_parsing() {
        assert!(ModelPath::parse("").unwrap().is_root());
        assert!(ModelPath::parse("sources").is_err());
        assert!(ModelPath::parse("sources.9main").is_err());
        assert_eq!(
            ModelPath::parse("sources.main").unwrap().to_string(),
            "sources.main"
        );
    }

    #[test]
    fn test_snapshot_includes_nested_nodes() {
        let model = library();
        let main = model.register_child("sources", "main").unwrap();
        main.source_set("java").unwrap().src_dir("src/main/java");
        main.set("byteCodeDir", PathBuf::from("build/classes/java/main"))
            .unwrap();

        let snapshot = model.snapshot();
        let main_snapshot = &snapshot.collections["sources"]["main"];

        assert_eq!(snapshot.properties["jarFile"], None);
        assert_eq!(
            main_snapshot.properties["byteCodeDir"],
            Some(ModelValue::Path(PathBuf::from("build/classes/java/main")))
        );
        assert_eq!(
            main_snapshot.source_sets["java"],
            vec![PathBuf::from("src/main/java")]
        );
    }
}
