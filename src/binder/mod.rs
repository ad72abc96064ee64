//! The binder - applies declarations to projects.
//!
//! Applying a declaration to a project creates a [`Binding`]: the definition
//! is validated, a fresh output model is built, and the declaration's
//! configuration function runs once. Features need their parent (and every
//! `requires` entry) bound on the same project first. A (project,
//! declaration) pair is bound at most once, even under concurrent `apply`.

mod binding;
mod plan;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use anyhow::Context;

use crate::core::{
    BindingError, BindingKey, Declaration, Definition, Project, ProjectId, QualifiedName,
    RawDefinition,
};
use crate::model::{EdgeKind, ModelGraph, ModelObject, ModelPath};
use crate::registry::DeclarationRegistry;
use crate::util::config::BinderConfig;

pub use binding::{Binding, BindingContext};
pub use plan::{ApplyRequest, ConfigurationReport, FailedApplication, SkippedApplication};

enum Slot {
    /// Reserved by an `apply` that has not finished yet.
    Configuring,
    Bound(Arc<Binding>),
}

/// Applies registered declarations to projects.
pub struct Binder {
    registry: Arc<DeclarationRegistry>,
    graph: Arc<ModelGraph>,
    bindings: RwLock<HashMap<BindingKey, Slot>>,
    config: BinderConfig,
    pool: Option<rayon::ThreadPool>,
}

impl Binder {
    /// Create a binder with default settings and a fresh model graph.
    pub fn new(registry: Arc<DeclarationRegistry>) -> Self {
        Binder {
            registry,
            graph: Arc::new(ModelGraph::new()),
            bindings: RwLock::new(HashMap::new()),
            config: BinderConfig::default(),
            pool: None,
        }
    }

    /// Create a binder following `config`.
    ///
    /// `binder.jobs` gets a dedicated worker pool; otherwise `apply_all`
    /// runs on rayon's global pool.
    pub fn with_config(
        registry: Arc<DeclarationRegistry>,
        config: &BinderConfig,
    ) -> anyhow::Result<Self> {
        let pool = match config.jobs {
            Some(jobs) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .thread_name(|i| format!("quay-binder-{}", i))
                    .build()
                    .with_context(|| format!("failed to start {} binder threads", jobs))?,
            ),
            None => None,
        };

        Ok(Binder {
            config: config.clone(),
            pool,
            ..Self::new(registry)
        })
    }

    pub fn registry(&self) -> &Arc<DeclarationRegistry> {
        &self.registry
    }

    pub fn graph(&self) -> &Arc<ModelGraph> {
        &self.graph
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    fn write_bindings(&self) -> RwLockWriteGuard<'_, HashMap<BindingKey, Slot>> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The finished binding of `declaration` on `project`.
    pub fn binding(&self, project: &ProjectId, declaration: &QualifiedName) -> Option<Arc<Binding>> {
        let key = BindingKey::new(project.clone(), declaration.clone());
        match self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            Some(Slot::Bound(binding)) => Some(Arc::clone(binding)),
            _ => None,
        }
    }

    pub fn is_bound(&self, project: &ProjectId, declaration: &QualifiedName) -> bool {
        self.binding(project, declaration).is_some()
    }

    /// Every finished binding on `project`, sorted by declaration.
    pub fn bindings(&self, project: &ProjectId) -> Vec<Arc<Binding>> {
        let mut found: Vec<_> = self
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| &key.project == project)
            .filter_map(|(_, slot)| match slot {
                Slot::Bound(binding) => Some(Arc::clone(binding)),
                Slot::Configuring => None,
            })
            .collect();
        found.sort_by(|a, b| a.key().cmp(b.key()));
        found
    }

    /// Resolve a declaration name for `project`.
    ///
    /// A bare name declared under several parents is disambiguated by which
    /// parent is bound on the project, or about to be (`pending`).
    fn resolve_for(
        &self,
        project: &ProjectId,
        name: &str,
        pending: &HashSet<QualifiedName>,
    ) -> Result<Arc<Declaration>, BindingError> {
        match self.registry.resolve(name) {
            Err(BindingError::AmbiguousFeature { name, candidates }) => {
                let mut usable: Vec<Arc<Declaration>> = self
                    .registry
                    .candidates(&name)
                    .iter()
                    .filter_map(|candidate| self.registry.get(candidate))
                    .filter(|declaration| {
                        declaration.parent().is_some_and(|parent| {
                            pending.contains(parent) || self.is_bound(project, parent)
                        })
                    })
                    .collect();

                if usable.len() == 1 {
                    Ok(usable.remove(0))
                } else {
                    Err(BindingError::AmbiguousFeature { name, candidates })
                }
            }
            other => other,
        }
    }

    /// Apply `name` to `project` with the given definition input.
    pub fn apply(
        &self,
        project: &Project,
        name: &str,
        raw: &RawDefinition,
    ) -> Result<Arc<Binding>, BindingError> {
        let declaration = self.resolve_for(project.id(), name, &HashSet::new())?;
        let key = BindingKey::new(project.id().clone(), declaration.qualified_name().clone());

        self.reserve(&key)?;

        let span = tracing::info_span!(
            "configure",
            project = %key.project,
            feature = %key.declaration
        );
        let _enter = span.enter();

        match self.bind(project, &key, declaration, raw) {
            Ok(binding) => {
                let binding = Arc::new(binding);
                self.write_bindings()
                    .insert(key, Slot::Bound(Arc::clone(&binding)));
                tracing::debug!("bound {}", binding.key());
                Ok(binding)
            }
            Err(err) => {
                // Release the reservation so the caller may try again
                self.write_bindings().remove(&key);
                tracing::debug!("applying {} failed: {}", key, err);
                Err(err)
            }
        }
    }

    fn reserve(&self, key: &BindingKey) -> Result<(), BindingError> {
        let mut bindings = self.write_bindings();
        if bindings.contains_key(key) {
            return Err(BindingError::DuplicateApplication {
                project: key.project.to_string(),
                declaration: key.declaration.to_string(),
            });
        }
        bindings.insert(key.clone(), Slot::Configuring);
        Ok(())
    }

    fn require_bound(
        &self,
        project: &ProjectId,
        declaration: &Declaration,
        dependency: &QualifiedName,
        is_parent: bool,
    ) -> Result<Arc<Binding>, BindingError> {
        if !self.registry.contains(dependency) {
            return Err(self.registry.resolve(&dependency.to_string()).err().unwrap_or(
                BindingError::UnknownFeature {
                    name: dependency.to_string(),
                    suggestions: Vec::new(),
                },
            ));
        }

        self.binding(project, dependency).ok_or_else(|| {
            if is_parent {
                BindingError::MissingParent {
                    project: project.to_string(),
                    feature: declaration.qualified_name().to_string(),
                    parent: dependency.to_string(),
                }
            } else {
                BindingError::MissingRequirement {
                    project: project.to_string(),
                    feature: declaration.qualified_name().to_string(),
                    required: dependency.to_string(),
                }
            }
        })
    }

    fn bind(
        &self,
        project: &Project,
        key: &BindingKey,
        declaration: Arc<Declaration>,
        raw: &RawDefinition,
    ) -> Result<Binding, BindingError> {
        let parent_binding = match declaration.parent() {
            Some(parent) => Some(self.require_bound(project.id(), &declaration, parent, true)?),
            None => None,
        };
        for required in declaration.requires() {
            self.require_bound(project.id(), &declaration, required, false)?;
        }

        let parent_node = match &parent_binding {
            Some(parent) => Some(select_target(&declaration, parent.model(), raw)?),
            None if raw.target().is_some() => {
                return Err(BindingError::invalid_definition(
                    declaration.definition_shape().name().as_str(),
                    format!("software type `{}` takes no target path", key.declaration),
                ));
            }
            None => None,
        };

        let definition_name = parent_node
            .as_ref()
            .map_or_else(|| declaration.name(), ModelObject::name);
        let definition =
            Definition::from_raw(definition_name, declaration.definition_shape(), raw)?;

        let phase = self.graph.phase(project.id());
        if phase.is_complete() {
            tracing::warn!(
                "applying {} after configuration of {} finished",
                key.declaration,
                key.project
            );
        }
        let model = ModelObject::new(
            declaration.name(),
            key.to_string(),
            Arc::clone(declaration.model_shape()),
            &phase,
        );

        let ctx = BindingContext::new(project, key, &declaration, &self.registry, &self.graph);
        declaration
            .configure(&ctx, &definition, parent_node.as_ref(), &model)
            .map_err(|source| BindingError::Configuration {
                project: key.project.to_string(),
                declaration: key.declaration.to_string(),
                source,
            })?;

        self.graph.publish(key.clone(), model.clone());
        if let Some(parent) = &parent_binding {
            self.graph.link(parent.key(), key, EdgeKind::Parent);
        }

        Ok(Binding::new(
            key.clone(),
            declaration,
            definition,
            parent_node,
            model,
        ))
    }

    /// End `project`'s configuration phase.
    ///
    /// Lazy values still unbound fail from now on; blocked readers wake up.
    /// Returns the declared properties nobody bound.
    pub fn finish_configuration(&self, project: &ProjectId) -> Vec<String> {
        self.graph.finish(project)
    }

    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

/// Pick the node of the parent's output model a feature attaches to.
///
/// An explicit target path wins. Otherwise the unique node of the required
/// shape is used, falling back to the declaration's default target when
/// several exist.
fn select_target(
    declaration: &Declaration,
    parent: &ModelObject,
    raw: &RawDefinition,
) -> Result<ModelObject, BindingError> {
    let invalid = |reason: String| {
        BindingError::invalid_definition(declaration.definition_shape().name().as_str(), reason)
    };
    let expected = declaration.parent_model();

    if let Some(target) = raw.target() {
        let path =
            ModelPath::parse(target).map_err(|_| invalid(format!("`{}` is not a model path", target)))?;
        let node = parent
            .find(&path)
            .map_err(|_| invalid(format!("parent model has no node at `{}`", target)))?;

        if let Some(expected) = expected {
            if node.shape_name() != expected {
                return Err(invalid(format!(
                    "`{}` is a `{}` but `{}` attaches to `{}`",
                    target,
                    node.shape_name(),
                    declaration.qualified_name(),
                    expected
                )));
            }
        }
        return Ok(node);
    }

    let Some(expected) = expected else {
        return Ok(parent.clone());
    };

    let mut candidates: Vec<ModelObject> = parent
        .descendants()
        .into_iter()
        .filter(|node| node.shape_name() == expected)
        .collect();

    match candidates.len() {
        0 => Err(invalid(format!("parent model has no `{}` node", expected))),
        1 => Ok(candidates.remove(0)),
        _ => {
            let paths: Vec<String> = candidates.iter().map(|n| n.path().to_string()).collect();
            let default = declaration
                .default_target()
                .and_then(|default| ModelPath::parse(default).ok());

            match default {
                Some(default) => candidates
                    .into_iter()
                    .find(|node| node.path() == &default)
                    .ok_or_else(|| {
                        invalid(format!(
                            "default target `{}` is not one of {}",
                            default,
                            paths.join(", ")
                        ))
                    }),
                None => Err(invalid(format!(
                    "several `{}` nodes ({}); name one with a target path",
                    expected,
                    paths.join(", ")
                ))),
            }
        }
    }
}
