//! Bindings and the context handed to configuration functions.

use std::fmt;
use std::sync::Arc;

use crate::core::{
    BindingError, BindingKey, Declaration, Definition, Project, ProjectId, ProjectLayout,
    QualifiedName,
};
use crate::model::{ConfigurationPhase, EdgeKind, LazyModelValue, ModelGraph, ModelObject};
use crate::registry::DeclarationRegistry;
use crate::tasks::TaskRegistrar;

/// One declaration applied to one project.
pub struct Binding {
    key: BindingKey,
    declaration: Arc<Declaration>,
    definition: Definition,
    parent: Option<ModelObject>,
    model: ModelObject,
}

impl Binding {
    pub(crate) fn new(
        key: BindingKey,
        declaration: Arc<Declaration>,
        definition: Definition,
        parent: Option<ModelObject>,
        model: ModelObject,
    ) -> Self {
        Binding {
            key,
            declaration,
            definition,
            parent,
            model,
        }
    }

    pub fn key(&self) -> &BindingKey {
        &self.key
    }

    pub fn project(&self) -> &ProjectId {
        &self.key.project
    }

    pub fn declaration(&self) -> &Arc<Declaration> {
        &self.declaration
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// The parent model node the feature was attached to.
    pub fn parent_model(&self) -> Option<&ModelObject> {
        self.parent.as_ref()
    }

    /// The published output model.
    pub fn model(&self) -> &ModelObject {
        &self.model
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("key", &self.key.to_string())
            .field("definition", &self.definition.name())
            .field("parent", &self.parent.as_ref().map(|p| p.path().to_string()))
            .finish()
    }
}

/// What a configuration function can reach besides its three models.
pub struct BindingContext<'a> {
    project: &'a Project,
    key: &'a BindingKey,
    declaration: &'a Declaration,
    registry: &'a DeclarationRegistry,
    graph: &'a ModelGraph,
}

impl<'a> BindingContext<'a> {
    pub(crate) fn new(
        project: &'a Project,
        key: &'a BindingKey,
        declaration: &'a Declaration,
        registry: &'a DeclarationRegistry,
        graph: &'a ModelGraph,
    ) -> Self {
        BindingContext {
            project,
            key,
            declaration,
            registry,
            graph,
        }
    }

    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn layout(&self) -> &'a ProjectLayout {
        self.project.layout()
    }

    pub fn tasks(&self) -> &'a TaskRegistrar {
        self.project.tasks()
    }

    pub fn key(&self) -> &'a BindingKey {
        self.key
    }

    pub fn declaration(&self) -> &'a Declaration {
        self.declaration
    }

    /// The project's configuration phase.
    pub fn phase(&self) -> ConfigurationPhase {
        self.graph.phase(self.project.id())
    }

    /// A fresh lazy value owned by this project's configuration phase.
    pub fn lazy<T>(&self, name: &str) -> LazyModelValue<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        LazyModelValue::in_phase(format!("{}.{}", self.key, name), &self.phase())
    }

    /// Read another binding's output model on this project.
    ///
    /// Accepts the same names as `Binder::apply`. Records a consumer edge so
    /// the model graph knows who read what.
    pub fn consume(&self, declaration: &str) -> Result<ModelObject, BindingError> {
        self.consume_from(self.project.id(), declaration)
    }

    /// Read another binding's output model on any project.
    pub fn consume_from(
        &self,
        project: &ProjectId,
        declaration: &str,
    ) -> Result<ModelObject, BindingError> {
        let name = self.resolve_producer(project, declaration)?;
        let producer = BindingKey::new(project.clone(), name);

        let model = self
            .graph
            .lookup(&producer)
            .ok_or_else(|| BindingError::MissingRequirement {
                project: project.to_string(),
                feature: self.key.declaration.to_string(),
                required: producer.declaration.to_string(),
            })?;

        self.graph.link(&producer, self.key, EdgeKind::Consumes);
        Ok(model)
    }

    /// A bare name declared under several parents means the one published
    /// on `project`.
    fn resolve_producer(
        &self,
        project: &ProjectId,
        declaration: &str,
    ) -> Result<QualifiedName, BindingError> {
        match self.registry.resolve(declaration) {
            Ok(found) => Ok(found.qualified_name().clone()),
            Err(BindingError::AmbiguousFeature { name, candidates }) => {
                let mut published: Vec<QualifiedName> = self
                    .registry
                    .candidates(&name)
                    .into_iter()
                    .filter(|candidate| {
                        let key = BindingKey::new(project.clone(), candidate.clone());
                        self.graph.lookup(&key).is_some()
                    })
                    .collect();

                if published.len() == 1 {
                    Ok(published.remove(0))
                } else {
                    Err(BindingError::AmbiguousFeature { name, candidates })
                }
            }
            Err(err) => Err(err),
        }
    }
}
