//! Batch application.
//!
//! `apply_all` takes every requested application at once, orders each
//! project's requests so parents and requirements come first, and runs
//! independent work in parallel: projects against each other, and within a
//! project every wave of requests whose dependencies are already bound.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;
use petgraph::Direction;
use rayon::prelude::*;

use super::Binder;
use crate::core::{BindingError, BindingKey, Declaration, Project, ProjectId, QualifiedName, RawDefinition};
use crate::util::config::DuplicatePolicy;
use crate::util::diagnostic::Diagnostic;

/// One requested application.
#[derive(Debug, Clone)]
pub struct ApplyRequest<'a> {
    pub project: &'a Project,
    pub declaration: String,
    pub definition: RawDefinition,
}

impl<'a> ApplyRequest<'a> {
    pub fn new(project: &'a Project, declaration: impl Into<String>) -> Self {
        ApplyRequest {
            project,
            declaration: declaration.into(),
            definition: RawDefinition::new(),
        }
    }

    pub fn with_definition(mut self, definition: RawDefinition) -> Self {
        self.definition = definition;
        self
    }
}

/// An application that failed.
#[derive(Debug)]
pub struct FailedApplication {
    pub project: ProjectId,
    pub declaration: String,
    pub error: BindingError,
}

/// An application that never ran because something it depends on failed.
#[derive(Debug, Clone)]
pub struct SkippedApplication {
    pub project: ProjectId,
    pub declaration: String,
    pub blocked_by: String,
}

/// Outcome of [`Binder::apply_all`].
#[derive(Debug, Default)]
pub struct ConfigurationReport {
    pub applied: Vec<BindingKey>,
    pub failed: Vec<FailedApplication>,
    pub skipped: Vec<SkippedApplication>,

    /// Duplicate applications tolerated under the `warn` policy
    pub ignored: Vec<BindingKey>,

    /// Declared properties left unbound when a project's phase finished
    pub unresolved: BTreeMap<ProjectId, Vec<String>>,
}

impl ConfigurationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    fn merge(&mut self, other: ConfigurationReport) {
        self.applied.extend(other.applied);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
        self.ignored.extend(other.ignored);
        self.unresolved.extend(other.unresolved);
    }

    fn sort(&mut self) {
        self.applied.sort();
        self.ignored.sort();
        self.failed
            .sort_by(|a, b| (&a.project, &a.declaration).cmp(&(&b.project, &b.declaration)));
        self.skipped
            .sort_by(|a, b| (&a.project, &a.declaration).cmp(&(&b.project, &b.declaration)));
    }

    /// Fail if any application failed or was skipped.
    pub fn into_result(self) -> anyhow::Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let mut message = format!(
            "configuration failed: {} failed, {} skipped",
            self.failed.len(),
            self.skipped.len()
        );
        for failed in &self.failed {
            message.push_str(&format!(
                "\n  {}/{}: {}",
                failed.project, failed.declaration, failed.error
            ));
        }
        anyhow::bail!(message)
    }

    /// One diagnostic per failed or skipped application.
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        let failed = self
            .failed
            .iter()
            .map(|f| f.error.to_diagnostic().with_project(f.project.to_string()));

        let skipped = self.skipped.iter().map(|s| {
            Diagnostic::note(format!("`{}` was not applied", s.declaration))
                .with_context(format!("`{}` failed first", s.blocked_by))
                .with_project(s.project.to_string())
        });

        failed.chain(skipped).collect()
    }
}

impl fmt::Display for ConfigurationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} failed, {} skipped",
            self.applied.len(),
            self.failed.len(),
            self.skipped.len()
        )?;
        if !self.ignored.is_empty() {
            write!(f, ", {} duplicate(s) ignored", self.ignored.len())?;
        }
        Ok(())
    }
}

/// A request with its declaration resolved.
struct Planned<'r, 'a> {
    request: &'r ApplyRequest<'a>,
    declaration: Arc<Declaration>,
}

enum Outcome {
    Applied(BindingKey),
    Ignored(BindingKey),
    Failed(BindingError),
    Skipped(String),
}

impl Binder {
    /// Apply a batch of requests in dependency order.
    ///
    /// Projects are configured in parallel. Within a project, requests run
    /// after every request they depend on, and requests whose dependencies
    /// are all done run concurrently. A failure skips everything that
    /// depends on it; unrelated requests still run.
    pub fn apply_all(&self, requests: Vec<ApplyRequest<'_>>) -> ConfigurationReport {
        let mut by_project: BTreeMap<ProjectId, Vec<ApplyRequest<'_>>> = BTreeMap::new();
        for request in requests {
            by_project
                .entry(request.project.id().clone())
                .or_default()
                .push(request);
        }

        let reports: Vec<ConfigurationReport> = self.install(|| {
            by_project
                .into_par_iter()
                .map(|(_, requests)| self.apply_project(&requests))
                .collect()
        });

        let mut report = ConfigurationReport::default();
        for project_report in reports {
            report.merge(project_report);
        }
        report.sort();

        tracing::info!("configuration finished: {}", report);
        report
    }

    fn apply_project(&self, requests: &[ApplyRequest<'_>]) -> ConfigurationReport {
        let mut report = ConfigurationReport::default();
        let Some(project) = requests.first().map(|r| r.project) else {
            return report;
        };
        let project_id = project.id().clone();

        // Unambiguous names first, so bare names can be resolved against
        // parents requested in the same batch
        let requested: HashSet<QualifiedName> = requests
            .iter()
            .filter_map(|r| self.registry.resolve(&r.declaration).ok())
            .map(|d| d.qualified_name().clone())
            .collect();

        let mut planned = Vec::new();
        for request in requests {
            match self.resolve_for(&project_id, &request.declaration, &requested) {
                Ok(declaration) => planned.push(Planned {
                    request,
                    declaration,
                }),
                Err(error) => report.failed.push(FailedApplication {
                    project: project_id.clone(),
                    declaration: request.declaration.clone(),
                    error,
                }),
            }
        }

        let (graph, waves) = plan_waves(&planned);
        let mut outcomes: HashMap<NodeIndex, Outcome> = HashMap::new();

        for wave in waves {
            let results: Vec<(NodeIndex, Outcome)> = wave
                .par_iter()
                .map(|&node| {
                    let blocked_by = graph
                        .neighbors_directed(node, Direction::Incoming)
                        .find_map(|dep| {
                            let dependency = planned[graph[dep]].declaration.qualified_name();
                            match outcomes.get(&dep) {
                                // A rejected duplicate leaves the earlier binding in place
                                Some(Outcome::Failed(_)) | Some(Outcome::Skipped(_))
                                    if !self.is_bound(&project_id, dependency) =>
                                {
                                    Some(dependency.to_string())
                                }
                                _ => None,
                            }
                        });

                    let outcome = match blocked_by {
                        Some(blocker) => Outcome::Skipped(blocker),
                        None => self.run_planned(project, &planned[graph[node]]),
                    };
                    (node, outcome)
                })
                .collect();

            outcomes.extend(results);
        }

        for (node, outcome) in outcomes {
            let planned = &planned[graph[node]];
            let declaration = planned.declaration.qualified_name().to_string();
            match outcome {
                Outcome::Applied(key) => report.applied.push(key),
                Outcome::Ignored(key) => report.ignored.push(key),
                Outcome::Failed(error) => report.failed.push(FailedApplication {
                    project: project_id.clone(),
                    declaration,
                    error,
                }),
                Outcome::Skipped(blocked_by) => report.skipped.push(SkippedApplication {
                    project: project_id.clone(),
                    declaration,
                    blocked_by,
                }),
            }
        }

        if self.config.finishes_after_apply() {
            let unresolved = self.finish_configuration(&project_id);
            if !unresolved.is_empty() {
                report.unresolved.insert(project_id, unresolved);
            }
        }

        report
    }

    fn run_planned(&self, project: &Project, planned: &Planned<'_, '_>) -> Outcome {
        let name = planned.declaration.qualified_name().to_string();
        match self.apply(project, &name, &planned.request.definition) {
            Ok(binding) => Outcome::Applied(binding.key().clone()),
            Err(BindingError::DuplicateApplication { .. })
                if self.config.duplicate_policy() == DuplicatePolicy::Warn =>
            {
                tracing::warn!("`{}` is already applied to {}, ignoring", name, project.id());
                Outcome::Ignored(BindingKey::new(
                    project.id().clone(),
                    planned.declaration.qualified_name().clone(),
                ))
            }
            Err(error) => Outcome::Failed(error),
        }
    }
}

/// Order planned requests into waves.
///
/// Edges run from a request to every request depending on its declaration.
/// A request's wave is one past the latest wave among its dependencies.
fn plan_waves(planned: &[Planned<'_, '_>]) -> (DiGraph<usize, ()>, Vec<Vec<NodeIndex>>) {
    let mut graph = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..planned.len()).map(|i| graph.add_node(i)).collect();

    let mut by_name: HashMap<&QualifiedName, Vec<NodeIndex>> = HashMap::new();
    for (i, p) in planned.iter().enumerate() {
        by_name
            .entry(p.declaration.qualified_name())
            .or_default()
            .push(nodes[i]);
    }

    for (i, p) in planned.iter().enumerate() {
        for dependency in p.declaration.dependencies() {
            for &from in by_name.get(dependency).into_iter().flatten() {
                graph.update_edge(from, nodes[i], ());
            }
        }
    }

    // The registry rejects cycles, so the topological walk visits every node
    let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
    let mut topo = Topo::new(&graph);
    while let Some(node) = topo.next(&graph) {
        let level = graph
            .neighbors_directed(node, Direction::Incoming)
            .filter_map(|dep| depth.get(&dep))
            .map(|d| d + 1)
            .max()
            .unwrap_or(0);
        depth.insert(node, level);
    }

    let mut waves: Vec<Vec<NodeIndex>> = Vec::new();
    for (&node, &level) in &depth {
        if waves.len() <= level {
            waves.resize_with(level + 1, Vec::new);
        }
        waves[level].push(node);
    }
    for wave in &mut waves {
        wave.sort();
    }

    (graph, waves)
}
