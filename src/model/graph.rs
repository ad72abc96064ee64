//! The model graph - published output models and who reads them.
//!
//! Every binding publishes its output model under its [`BindingKey`]. Edges
//! run producer -> consumer: from a parent binding to the feature bound
//! under it, and from any binding whose model another binding read through
//! `BindingContext::consume`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError, RwLock};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::core::{BindingKey, ProjectId, QualifiedName};
use crate::model::{ConfigurationPhase, ModelObject, ObjectSnapshot};

/// Why one binding depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// The consumer is a feature bound under the producer.
    Parent,
    /// The consumer read the producer's model explicitly.
    Consumes,
}

/// An output model together with the binding that published it.
#[derive(Debug, Clone)]
pub struct PublishedModel {
    pub key: BindingKey,
    pub model: ModelObject,
}

#[derive(Default)]
struct GraphState {
    graph: DiGraph<BindingKey, EdgeKind>,
    nodes: HashMap<BindingKey, NodeIndex>,
    models: HashMap<BindingKey, ModelObject>,
}

impl GraphState {
    fn node(&mut self, key: &BindingKey) -> NodeIndex {
        if let Some(&node) = self.nodes.get(key) {
            return node;
        }
        let node = self.graph.add_node(key.clone());
        self.nodes.insert(key.clone(), node);
        node
    }

    fn neighbours(&self, key: &BindingKey, direction: Direction) -> Vec<(BindingKey, EdgeKind)> {
        let Some(&node) = self.nodes.get(key) else {
            return Vec::new();
        };

        let mut found: Vec<_> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (self.graph[other].clone(), *edge.weight())
            })
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }
}

/// Process-wide registry of published models and configuration phases.
#[derive(Default)]
pub struct ModelGraph {
    state: RwLock<GraphState>,
    phases: Mutex<HashMap<ProjectId, ConfigurationPhase>>,
}

impl ModelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The configuration phase of a project, created on first use.
    pub fn phase(&self, project: &ProjectId) -> ConfigurationPhase {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(project.clone())
            .or_insert_with(|| ConfigurationPhase::new(project.as_str()))
            .clone()
    }

    /// Publish a binding's output model.
    ///
    /// Returns `false`, keeping the first model, if the key was already
    /// published.
    pub fn publish(&self, key: BindingKey, model: ModelObject) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.models.contains_key(&key) {
            tracing::warn!("{} is already published, keeping the first model", key);
            return false;
        }

        state.node(&key);
        tracing::debug!("published {}", key);
        state.models.insert(key, model);
        true
    }

    /// The output model published under `key`.
    pub fn lookup(&self, key: &BindingKey) -> Option<ModelObject> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .models
            .get(key)
            .cloned()
    }

    /// The output model of `declaration` on `project`.
    pub fn model(&self, project: &ProjectId, declaration: &QualifiedName) -> Option<ModelObject> {
        self.lookup(&BindingKey::new(project.clone(), declaration.clone()))
    }

    /// Record that `consumer` depends on `producer`.
    pub fn link(&self, producer: &BindingKey, consumer: &BindingKey, kind: EdgeKind) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let from = state.node(producer);
        let to = state.node(consumer);

        let exists = state
            .graph
            .edges_connecting(from, to)
            .any(|edge| *edge.weight() == kind);
        if !exists {
            state.graph.add_edge(from, to, kind);
        }
    }

    /// Bindings `key` depends on, sorted.
    pub fn producers(&self, key: &BindingKey) -> Vec<(BindingKey, EdgeKind)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .neighbours(key, Direction::Incoming)
    }

    /// Bindings that depend on `key`, sorted.
    pub fn consumers(&self, key: &BindingKey) -> Vec<(BindingKey, EdgeKind)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .neighbours(key, Direction::Outgoing)
    }

    /// Every model published for `project`, sorted by declaration name.
    pub fn published(&self, project: &ProjectId) -> Vec<PublishedModel> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut models: Vec<_> = state
            .models
            .iter()
            .filter(|(key, _)| &key.project == project)
            .map(|(key, model)| PublishedModel {
                key: key.clone(),
                model: model.clone(),
            })
            .collect();
        models.sort_by(|a, b| a.key.cmp(&b.key));
        models
    }

    /// End `project`'s configuration phase.
    ///
    /// Readers blocked on unbound values are woken and fail. Returns the
    /// declared properties nobody bound.
    pub fn finish(&self, project: &ProjectId) -> Vec<String> {
        if !self.phase(project).complete() {
            tracing::debug!("configuration of {} was already finished", project);
        }

        let unbound: Vec<String> = self
            .published(project)
            .iter()
            .flat_map(|published| published.model.unbound_properties())
            .collect();

        for property in &unbound {
            tracing::warn!("{} was never bound", property);
        }
        unbound
    }

    pub fn is_finished(&self, project: &ProjectId) -> bool {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project)
            .is_some_and(ConfigurationPhase::is_complete)
    }

    /// A serialisable view of everything published for `project`.
    ///
    /// Bound properties are computed, so take snapshots after configuration.
    pub fn snapshot(&self, project: &ProjectId) -> ProjectSnapshot {
        let published = self.published(project);

        let edges = published
            .iter()
            .flat_map(|p| {
                self.consumers(&p.key)
                    .into_iter()
                    .map(|(consumer, kind)| EdgeSnapshot {
                        producer: p.key.to_string(),
                        consumer: consumer.to_string(),
                        kind,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let models = published
            .iter()
            .map(|p| (p.key.declaration.to_string(), p.model.snapshot()))
            .collect();

        ProjectSnapshot {
            project: project.clone(),
            finished: self.is_finished(project),
            models,
            edges,
        }
    }
}

/// Serialisable view of a project's published models.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSnapshot {
    pub project: ProjectId,
    pub finished: bool,
    pub models: BTreeMap<String, ObjectSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl ProjectSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One producer -> consumer edge in a [`ProjectSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub producer: String,
    pub consumer: String,
    pub kind: EdgeKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModelShape;
    use crate::model::ValueKind;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn key(project: &str, declaration: &str) -> BindingKey {
        BindingKey::new(ProjectId::new(project), QualifiedName::from(declaration))
    }

    fn model(graph: &ModelGraph, project: &str, shape: &str) -> ModelObject {
        let phase = graph.phase(&ProjectId::new(project));
        let shape = Arc::new(ModelShape::new(shape).property("outputDir", ValueKind::Path));
        ModelObject::new("model", ProjectId::new(project).to_string(), shape, &phase)
    }

    #[test]
    fn test_publish_and_lookup() {
        let graph = ModelGraph::new();
        let library = model(&graph, "app", "JavaLibraryOutputs");

        assert!(graph.publish(key("app", "javaLibrary"), library.clone()));
        assert!(!graph.publish(key("app", "javaLibrary"), model(&graph, "app", "Other")));

        let found = graph.lookup(&key("app", "javaLibrary")).unwrap();
        assert!(found.same_as(&library));
        assert!(graph.lookup(&key("lib", "javaLibrary")).is_none());
    }

    #[test]
    fn test_edges_are_directed_and_deduplicated() {
        let graph = ModelGraph::new();
        let parent = key("app", "javaLibrary");
        let child = key("app", "javaLibrary.antlr");

        graph.link(&parent, &child, EdgeKind::Parent);
        graph.link(&parent, &child, EdgeKind::Parent);
        graph.link(&parent, &child, EdgeKind::Consumes);

        assert_eq!(graph.consumers(&parent).len(), 2);
        assert_eq!(graph.producers(&child)[0].0, parent);
        assert!(graph.producers(&parent).is_empty());
    }

    #[test]
    fn test_finish_reports_unbound_properties() {
        let graph = ModelGraph::new();
        let project = ProjectId::new("app");
        let bound = model(&graph, "app", "Bound");
        bound.set("outputDir", PathBuf::from("build/out")).unwrap();

        graph.publish(key("app", "bound"), bound);
        graph.publish(key("app", "unbound"), model(&graph, "app", "Unbound"));

        assert!(!graph.is_finished(&project));
        let unbound = graph.finish(&project);

        assert!(graph.is_finished(&project));
        assert_eq!(unbound, vec![":app.outputDir".to_string()]);
    }

    #[test]
    fn test_snapshot_serialises_models_and_edges() {
        let graph = ModelGraph::new();
        let project = ProjectId::new("app");
        let parent = model(&graph, "app", "Parent");
        parent.set("outputDir", PathBuf::from("build/parent")).unwrap();

        graph.publish(key("app", "parent"), parent);
        graph.publish(key("app", "parent.child"), model(&graph, "app", "Child"));
        graph.link(&key("app", "parent"), &key("app", "parent.child"), EdgeKind::Parent);

        let snapshot = graph.snapshot(&project);
        assert_eq!(snapshot.models.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);

        let json = snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["project"], ":app");
        assert_eq!(value["edges"][0]["kind"], "parent");
        assert_eq!(
            value["models"]["parent"]["properties"]["outputDir"]["value"],
            "build/parent"
        );
    }

    #[test]
    fn test_projects_have_independent_phases() {
        let graph = ModelGraph::new();
        graph.finish(&ProjectId::new("app"));

        assert!(graph.is_finished(&ProjectId::new("app")));
        assert!(!graph.is_finished(&ProjectId::new("lib")));
    }
}
