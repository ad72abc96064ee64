//! Source directory sets.
//!
//! A [`SourceDirectorySet`] is a named, shared collection of source roots plus
//! include/exclude patterns. Roots may be lazy, so a feature can add the
//! output directory of a task that has not been configured yet.

pub mod walker;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use glob::{MatchOptions, Pattern, PatternError};

use crate::model::{LazyModelValue, ModelError};

pub use walker::{walk_reproducibly, WalkedFile};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Include/exclude glob patterns applied to paths relative to a source root.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PatternFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(&mut self, pattern: &str) -> Result<(), PatternError> {
        self.includes.push(Pattern::new(pattern)?);
        Ok(())
    }

    pub fn exclude(&mut self, pattern: &str) -> Result<(), PatternError> {
        self.excludes.push(Pattern::new(pattern)?);
        Ok(())
    }

    /// An empty include list includes everything.
    pub fn matches(&self, relative: &Path) -> bool {
        let included = self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|p| p.matches_path_with(relative, MATCH_OPTIONS));

        included
            && !self
                .excludes
                .iter()
                .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(Pattern::as_str)
    }

    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.excludes.iter().map(Pattern::as_str)
    }
}

struct SetInner {
    name: String,
    display_name: String,
    roots: RwLock<Vec<LazyModelValue<PathBuf>>>,
    filter: RwLock<PatternFilter>,
}

/// A named set of source roots shared between bindings.
#[derive(Clone)]
pub struct SourceDirectorySet {
    inner: Arc<SetInner>,
}

impl SourceDirectorySet {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        SourceDirectorySet {
            inner: Arc::new(SetInner {
                name: name.into(),
                display_name: display_name.into(),
                roots: RwLock::new(Vec::new()),
                filter: RwLock::new(PatternFilter::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    /// Add a source root.
    pub fn src_dir(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let description = format!("{} root {}", self.inner.name, dir.display());
        self.src_dir_lazy(LazyModelValue::resolved(description, dir));
    }

    /// Add a source root that is produced later.
    pub fn src_dir_lazy(&self, dir: LazyModelValue<PathBuf>) {
        self.inner
            .roots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dir);
    }

    pub fn include(&self, pattern: &str) -> Result<(), PatternError> {
        self.inner
            .filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .include(pattern)
    }

    pub fn exclude(&self, pattern: &str) -> Result<(), PatternError> {
        self.inner
            .filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .exclude(pattern)
    }

    pub fn filter(&self) -> PatternFilter {
        self.inner
            .filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of roots, resolved or not.
    pub fn root_count(&self) -> usize {
        self.inner
            .roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolve every source root, in the order they were added.
    pub fn src_dirs(&self) -> Result<Vec<PathBuf>, ModelError> {
        let roots = self
            .inner
            .roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        roots.iter().map(LazyModelValue::get).collect()
    }

    /// List matching files under every root.
    ///
    /// Relative roots are resolved against `base`, usually the project root.
    pub fn files(&self, base: &Path) -> Result<Vec<PathBuf>> {
        let filter = self.filter();
        let mut files = Vec::new();

        for root in self.src_dirs()? {
            files.extend(
                walk_reproducibly(&base.join(root))?
                    .into_iter()
                    .filter(|f| filter.matches(&f.relative))
                    .map(|f| f.path),
            );
        }

        Ok(files)
    }
}

impl fmt::Debug for SourceDirectorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDirectorySet")
            .field("name", &self.inner.name)
            .field("roots", &self.root_count())
            .finish()
    }
}
