//! Software type and software feature declarations.
//!
//! A declaration is immutable once built. Types stand alone; features name a
//! parent (a type or another feature) and the parent model node they attach
//! to. Both carry a configuration function that the binder calls once per
//! project they are applied to.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::binder::BindingContext;
use crate::core::{DefinitionShape, Definition, Identifier, ModelShape, ProjectId};
use crate::model::ModelObject;

type TypeConfigure =
    dyn Fn(&BindingContext<'_>, &Definition, &ModelObject) -> anyhow::Result<()> + Send + Sync;

type FeatureConfigure = dyn Fn(&BindingContext<'_>, &Definition, &ModelObject, &ModelObject) -> anyhow::Result<()>
    + Send
    + Sync;

/// Dotted name of a declaration: `javaLibrary`, `javaLibrary.antlr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    segments: Vec<Identifier>,
}

impl QualifiedName {
    /// A top-level name.
    pub fn root(name: impl Into<Identifier>) -> Self {
        QualifiedName {
            segments: vec![name.into()],
        }
    }

    /// A name scoped under this one.
    pub fn child(&self, name: impl Into<Identifier>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        QualifiedName { segments }
    }

    /// Parse a dotted name, rejecting invalid segments.
    pub fn parse(s: &str) -> Option<Self> {
        let segments = s
            .split('.')
            .map(Identifier::parse)
            .collect::<Option<Vec<_>>>()?;
        Some(QualifiedName { segments })
    }

    /// The last segment.
    pub fn name(&self) -> Identifier {
        // Constructors never produce an empty name
        self.segments[self.segments.len() - 1]
    }

    /// Everything but the last segment, or `None` for a top-level name.
    pub fn scope(&self) -> Option<QualifiedName> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(QualifiedName {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn segments(&self) -> &[Identifier] {
        &self.segments
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Segments are not validated here; registration reports invalid ones.
impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        QualifiedName {
            segments: s.split('.').map(Identifier::new).collect(),
        }
    }
}

impl Serialize for QualifiedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identity of a binding: one declaration applied to one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BindingKey {
    pub project: ProjectId,
    pub declaration: QualifiedName,
}

impl BindingKey {
    pub fn new(project: ProjectId, declaration: QualifiedName) -> Self {
        BindingKey {
            project,
            declaration,
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.declaration)
    }
}

/// A top-level software type, e.g. `javaLibrary`.
#[derive(Clone)]
pub struct SoftwareTypeDeclaration {
    name: QualifiedName,
    definition: DefinitionShape,
    model: Arc<ModelShape>,
    configure: Arc<TypeConfigure>,
}

impl SoftwareTypeDeclaration {
    pub fn build(name: impl Into<Identifier>) -> TypeDeclarationBuilder {
        let name = name.into();
        TypeDeclarationBuilder {
            definition: DefinitionShape::new(format!("{}Definition", name)),
            model: ModelShape::new(format!("{}Model", name)),
            name,
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }
}

pub struct TypeDeclarationBuilder {
    name: Identifier,
    definition: DefinitionShape,
    model: ModelShape,
}

impl TypeDeclarationBuilder {
    pub fn definition(mut self, shape: DefinitionShape) -> Self {
        self.definition = shape;
        self
    }

    pub fn model(mut self, shape: ModelShape) -> Self {
        self.model = shape;
        self
    }

    /// Finish the declaration with its configuration function.
    pub fn bind<F>(self, configure: F) -> SoftwareTypeDeclaration
    where
        F: Fn(&BindingContext<'_>, &Definition, &ModelObject) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        SoftwareTypeDeclaration {
            name: QualifiedName::root(self.name),
            definition: self.definition,
            model: Arc::new(self.model),
            configure: Arc::new(configure),
        }
    }
}

/// A feature attached to a type or another feature, e.g. `javaLibrary.antlr`.
#[derive(Clone)]
pub struct SoftwareFeatureDeclaration {
    name: QualifiedName,
    parent: QualifiedName,
    parent_model: Option<Identifier>,
    default_target: Option<String>,
    requires: Vec<QualifiedName>,
    definition: DefinitionShape,
    model: Arc<ModelShape>,
    configure: Arc<FeatureConfigure>,
}

impl SoftwareFeatureDeclaration {
    /// Start a feature declared under `parent`.
    ///
    /// The parent model shape defaults to the root shape of the parent's
    /// output model; use [`parent_model`](FeatureDeclarationBuilder::parent_model)
    /// to attach to nested nodes instead.
    pub fn build(
        name: impl Into<Identifier>,
        parent: impl Into<QualifiedName>,
    ) -> FeatureDeclarationBuilder {
        let name = name.into();
        FeatureDeclarationBuilder {
            parent: parent.into(),
            parent_model: None,
            default_target: None,
            requires: Vec::new(),
            definition: DefinitionShape::new(format!("{}Definition", name)),
            model: ModelShape::new(format!("{}Model", name)),
            name,
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn parent(&self) -> &QualifiedName {
        &self.parent
    }

    /// Shape name of the parent model node this feature attaches to, if
    /// narrower than the parent's root model.
    pub fn parent_model(&self) -> Option<Identifier> {
        self.parent_model
    }

    pub fn requires(&self) -> &[QualifiedName] {
        &self.requires
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }
}

pub struct FeatureDeclarationBuilder {
    name: Identifier,
    parent: QualifiedName,
    parent_model: Option<Identifier>,
    default_target: Option<String>,
    requires: Vec<QualifiedName>,
    definition: DefinitionShape,
    model: ModelShape,
}

impl FeatureDeclarationBuilder {
    /// Attach to nodes of this shape inside the parent's output model.
    pub fn parent_model(mut self, shape: impl Into<Identifier>) -> Self {
        self.parent_model = Some(shape.into());
        self
    }

    /// Parent model node used when the definition names no target and
    /// several nodes of the parent model shape exist, e.g. `sources.main`.
    pub fn default_target(mut self, path: impl Into<String>) -> Self {
        self.default_target = Some(path.into());
        self
    }

    /// Another declaration that must be bound on the project first.
    pub fn requires(mut self, declaration: impl Into<QualifiedName>) -> Self {
        self.requires.push(declaration.into());
        self
    }

    pub fn definition(mut self, shape: DefinitionShape) -> Self {
        self.definition = shape;
        self
    }

    pub fn model(mut self, shape: ModelShape) -> Self {
        self.model = shape;
        self
    }

    /// Finish the declaration with its configuration function.
    ///
    /// The function receives the selected parent model node and the fresh
    /// output model, in that order.
    pub fn bind<F>(self, configure: F) -> SoftwareFeatureDeclaration
    where
        F: Fn(&BindingContext<'_>, &Definition, &ModelObject, &ModelObject) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        SoftwareFeatureDeclaration {
            name: self.parent.child(self.name),
            parent_model: self.parent_model,
            default_target: self.default_target,
            parent: self.parent,
            requires: self.requires,
            definition: self.definition,
            model: Arc::new(self.model),
            configure: Arc::new(configure),
        }
    }
}

/// A registered declaration of either kind.
#[derive(Clone)]
pub enum Declaration {
    Type(SoftwareTypeDeclaration),
    Feature(SoftwareFeatureDeclaration),
}

impl Declaration {
    pub fn qualified_name(&self) -> &QualifiedName {
        match self {
            Declaration::Type(t) => &t.name,
            Declaration::Feature(f) => &f.name,
        }
    }

    pub fn name(&self) -> Identifier {
        self.qualified_name().name()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Type(_) => "software type",
            Declaration::Feature(_) => "software feature",
        }
    }

    pub fn is_feature(&self) -> bool {
        matches!(self, Declaration::Feature(_))
    }

    pub fn parent(&self) -> Option<&QualifiedName> {
        match self {
            Declaration::Type(_) => None,
            Declaration::Feature(f) => Some(&f.parent),
        }
    }

    /// Required parent model shape, `None` for types and for features that
    /// attach to the parent's root model.
    pub fn parent_model(&self) -> Option<Identifier> {
        match self {
            Declaration::Type(_) => None,
            Declaration::Feature(f) => f.parent_model,
        }
    }

    pub fn requires(&self) -> &[QualifiedName] {
        match self {
            Declaration::Type(_) => &[],
            Declaration::Feature(f) => &f.requires,
        }
    }

    pub fn default_target(&self) -> Option<&str> {
        match self {
            Declaration::Type(_) => None,
            Declaration::Feature(f) => f.default_target(),
        }
    }

    /// Declarations that must be bound before this one.
    pub fn dependencies(&self) -> impl Iterator<Item = &QualifiedName> {
        self.parent().into_iter().chain(self.requires())
    }

    pub fn definition_shape(&self) -> &DefinitionShape {
        match self {
            Declaration::Type(t) => &t.definition,
            Declaration::Feature(f) => &f.definition,
        }
    }

    pub fn model_shape(&self) -> &Arc<ModelShape> {
        match self {
            Declaration::Type(t) => &t.model,
            Declaration::Feature(f) => &f.model,
        }
    }

    /// Names in the declaration that fail identifier validation.
    pub(crate) fn invalid_names(&self) -> Vec<String> {
        let mut invalid: Vec<String> = self
            .qualified_name()
            .segments()
            .iter()
            .copied()
            .chain(
                self.dependencies()
                    .flat_map(|dep| dep.segments().iter().copied()),
            )
            .chain(self.parent_model())
            .filter(|n| !n.is_valid())
            .map(|n| n.to_string())
            .collect();

        invalid.extend(self.definition_shape().invalid_names());
        invalid.extend(self.model_shape().invalid_names());
        invalid.dedup();
        invalid
    }

    /// Run the configuration function.
    pub(crate) fn configure(
        &self,
        ctx: &BindingContext<'_>,
        definition: &Definition,
        parent: Option<&ModelObject>,
        model: &ModelObject,
    ) -> anyhow::Result<()> {
        match (self, parent) {
            (Declaration::Type(t), _) => (t.configure)(ctx, definition, model),
            (Declaration::Feature(f), Some(parent)) => (f.configure)(ctx, definition, parent, model),
            (Declaration::Feature(f), None) => {
                anyhow::bail!("feature `{}` was configured without a parent model", f.name)
            }
        }
    }
}

impl From<SoftwareTypeDeclaration> for Declaration {
    fn from(declaration: SoftwareTypeDeclaration) -> Self {
        Declaration::Type(declaration)
    }
}

impl From<SoftwareFeatureDeclaration> for Declaration {
    fn from(declaration: SoftwareFeatureDeclaration) -> Self {
        Declaration::Feature(declaration)
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("kind", &self.kind())
            .field("name", &self.qualified_name().to_string())
            .field("parent", &self.parent().map(ToString::to_string))
            .field("parent_model", &self.parent_model())
            .field("definition", &self.definition_shape().name())
            .field("model", &self.model_shape().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        let library = QualifiedName::root("javaLibrary");
        let antlr = library.child("antlr");

        assert_eq!(antlr.to_string(), "javaLibrary.antlr");
        assert_eq!(antlr.name().as_str(), "antlr");
        assert_eq!(antlr.scope(), Some(library.clone()));
        assert!(library.scope().is_none());
        assert_eq!(QualifiedName::parse("javaLibrary.antlr"), Some(antlr));
        assert!(QualifiedName::parse("javaLibrary..antlr").is_none());
    }

    #[test]
    fn test_feature_is_scoped_under_parent() {
        let feature: Declaration = SoftwareFeatureDeclaration::build("antlr", "javaLibrary")
            .parent_model("JavaSources")
            .requires("javaLibrary.checkstyle")
            .bind(|_, _, _, _| Ok(()))
            .into();

        assert_eq!(feature.qualified_name().to_string(), "javaLibrary.antlr");
        assert_eq!(feature.parent().map(ToString::to_string).as_deref(), Some("javaLibrary"));
        assert_eq!(feature.parent_model().map(|s| s.as_str()), Some("JavaSources"));
        assert_eq!(feature.dependencies().count(), 2);
        assert!(feature.invalid_names().is_empty());
    }

    #[test]
    fn test_root_parent_model_is_none() {
        let feature: Declaration = SoftwareFeatureDeclaration::build("docs", "javaLibrary")
            .bind(|_, _, _, _| Ok(()))
            .into();
        assert!(feature.parent_model().is_none());
    }

    #[test]
    fn test_invalid_names_reported() {
        let declaration: Declaration = SoftwareTypeDeclaration::build("java library")
            .model(ModelShape::new("Outputs").property("jar-file", crate::model::ValueKind::Path))
            .bind(|_, _, _| Ok(()))
            .into();

        let invalid = declaration.invalid_names();
        assert!(invalid.iter().any(|n| n.contains("java library")));
        assert!(invalid.iter().all(|n| !n.contains("jar-file")));
    }
}
