//! Projects that declarations are applied to.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::tasks::TaskRegistrar;
use crate::util::config::{Config, DEFAULT_BUILD_DIR};

/// Identity of a project, e.g. `:app`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create an id, adding the leading `:` if missing.
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.starts_with(':') {
            ProjectId(name.to_string())
        } else {
            ProjectId(format!(":{}", name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment, e.g. `app` for `:lib:app`.
    pub fn name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        ProjectId::new(s)
    }
}

/// Where a project keeps its sources and build outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    build_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectLayout {
            root: root.into(),
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
        }
    }

    /// Use a different build directory, relative to the root.
    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The build directory relative to the project root.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// A path below the build directory, relative to the project root.
    ///
    /// Leading separators and `..` components in `relative` are dropped so
    /// the result never leaves the build directory.
    pub fn build_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        let mut path = self.build_dir.clone();
        for component in relative.as_ref().components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }

    /// A project-relative path made absolute.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

/// A project: identity, layout and its task registrar.
#[derive(Debug)]
pub struct Project {
    id: ProjectId,
    layout: ProjectLayout,
    tasks: TaskRegistrar,
}

impl Project {
    pub fn new(name: impl AsRef<str>, root: impl Into<PathBuf>) -> Self {
        Self::with_layout(name, ProjectLayout::new(root))
    }

    pub fn with_layout(name: impl AsRef<str>, layout: ProjectLayout) -> Self {
        let id = ProjectId::new(name);
        let tasks = TaskRegistrar::new(id.as_str());
        Project { id, layout, tasks }
    }

    /// Create a project whose layout follows `config`.
    pub fn with_config(name: impl AsRef<str>, root: impl Into<PathBuf>, config: &Config) -> Self {
        let layout = ProjectLayout::new(root).with_build_dir(config.layout.build_dir());
        Self::with_layout(name, layout)
    }

    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn tasks(&self) -> &TaskRegistrar {
        &self.tasks
    }
}
