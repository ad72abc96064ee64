//! Declaration registry.
//!
//! Plugins register software types and features here before any project is
//! configured. The registry owns the declaration table and a dependency
//! graph (parent and `requires` edges) used to reject cycles at
//! registration time. Parents may be registered after their features; a
//! dangling parent surfaces when the feature is applied.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::{BindingError, Declaration, Identifier, QualifiedName};

/// Maximum number of "did you mean" suggestions.
const MAX_SUGGESTIONS: usize = 3;

/// The table of registered declarations.
#[derive(Debug, Default)]
pub struct DeclarationRegistry {
    declarations: HashMap<QualifiedName, Arc<Declaration>>,

    /// Bare name -> every qualified name ending in it
    by_name: HashMap<Identifier, Vec<QualifiedName>>,

    /// Edges run dependency -> dependent
    graph: DiGraph<QualifiedName, ()>,
    nodes: HashMap<QualifiedName, NodeIndex>,
}

impl DeclarationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &QualifiedName) -> NodeIndex {
        if let Some(&node) = self.nodes.get(name) {
            return node;
        }
        let node = self.graph.add_node(name.clone());
        self.nodes.insert(name.clone(), node);
        node
    }

    /// Register a declaration.
    ///
    /// Fails if its names are invalid, if its qualified name is taken, or if
    /// its parent or `requires` edges would close a cycle.
    pub fn register(
        &mut self,
        declaration: impl Into<Declaration>,
    ) -> Result<Arc<Declaration>, BindingError> {
        let declaration = declaration.into();
        let name = declaration.qualified_name().clone();

        let invalid = declaration.invalid_names();
        if !invalid.is_empty() {
            return Err(BindingError::InvalidName {
                declaration: name.to_string(),
                names: invalid,
            });
        }

        if self.declarations.contains_key(&name) {
            return Err(BindingError::DuplicateName {
                name: name.name().to_string(),
                scope: name
                    .scope()
                    .map_or_else(|| "<root>".to_string(), |s| s.to_string()),
            });
        }

        self.check_cycles(&declaration)?;

        let node = self.node(&name);
        for dependency in declaration.dependencies() {
            let from = self.node(dependency);
            self.graph.update_edge(from, node, ());
        }

        tracing::debug!("registered {} `{}`", declaration.kind(), name);

        let declaration = Arc::new(declaration);
        self.by_name
            .entry(name.name())
            .or_default()
            .push(name.clone());
        self.declarations.insert(name, Arc::clone(&declaration));
        Ok(declaration)
    }

    fn check_cycles(&self, declaration: &Declaration) -> Result<(), BindingError> {
        let name = declaration.qualified_name();

        for dependency in declaration.dependencies() {
            if dependency == name {
                return Err(BindingError::CyclicDependency {
                    cycle: vec![name.to_string(), name.to_string()],
                });
            }

            let (Some(&from), Some(&to)) = (self.nodes.get(name), self.nodes.get(dependency))
            else {
                continue;
            };

            // The new edge runs dependency -> name; a path back closes a loop
            if let Some((_, path)) = astar(&self.graph, from, |n| n == to, |_| 1usize, |_| 0usize) {
                let mut cycle: Vec<String> =
                    path.iter().map(|&n| self.graph[n].to_string()).collect();
                cycle.push(name.to_string());
                return Err(BindingError::CyclicDependency { cycle });
            }
        }

        Ok(())
    }

    /// Look up `name` declared in `scope` (`None` for top-level types).
    pub fn lookup(
        &self,
        name: &str,
        scope: Option<&QualifiedName>,
    ) -> Result<Arc<Declaration>, BindingError> {
        let qualified = match scope {
            Some(scope) => scope.child(name),
            None => QualifiedName::root(name),
        };

        self.get(&qualified)
            .ok_or_else(|| self.unknown(&qualified.to_string()))
    }

    pub fn get(&self, name: &QualifiedName) -> Option<Arc<Declaration>> {
        self.declarations.get(name).cloned()
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.declarations.contains_key(name)
    }

    /// Every qualified name whose last segment is `name`, sorted.
    pub fn candidates(&self, name: &str) -> Vec<QualifiedName> {
        let mut found = self.by_name.get(name).cloned().unwrap_or_default();
        found.sort();
        found
    }

    /// Resolve a qualified (`javaLibrary.antlr`) or bare (`antlr`) name.
    ///
    /// A bare name declared in more than one scope is ambiguous.
    pub fn resolve(&self, name: &str) -> Result<Arc<Declaration>, BindingError> {
        if name.contains('.') {
            return QualifiedName::parse(name)
                .and_then(|qualified| self.get(&qualified))
                .ok_or_else(|| self.unknown(name));
        }

        let mut candidates = self.candidates(name);
        match candidates.len() {
            0 => Err(self.unknown(name)),
            1 => {
                let only = candidates.remove(0);
                self.get(&only).ok_or_else(|| self.unknown(name))
            }
            _ => Err(BindingError::AmbiguousFeature {
                name: name.to_string(),
                candidates: candidates.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    fn unknown(&self, name: &str) -> BindingError {
        BindingError::UnknownFeature {
            name: name.to_string(),
            suggestions: self.suggestions(name),
        }
    }

    fn suggestions(&self, name: &str) -> Vec<String> {
        let bare = name.rsplit('.').next().unwrap_or(name).to_ascii_lowercase();
        let mut similar: Vec<String> = self
            .declarations
            .keys()
            .filter(|candidate| {
                let candidate = candidate.name().to_ascii_lowercase();
                candidate.contains(&bare) || bare.contains(&candidate)
            })
            .map(ToString::to_string)
            .filter(|candidate| candidate != name)
            .collect();

        similar.sort();
        similar.truncate(MAX_SUGGESTIONS);
        similar
    }

    /// Declarations whose parent is `name`, sorted by name.
    pub fn children(&self, name: &QualifiedName) -> Vec<Arc<Declaration>> {
        let mut children: Vec<_> = self
            .declarations
            .values()
            .filter(|d| d.parent() == Some(name))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        children
    }

    /// Every declaration, sorted by qualified name.
    pub fn declarations(&self) -> Vec<Arc<Declaration>> {
        let mut all: Vec<_> = self.declarations.values().cloned().collect();
        all.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
        all
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
