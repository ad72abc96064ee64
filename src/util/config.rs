//! Configuration file support for quay.
//!
//! Two configuration file locations are read:
//! - Global: `~/.quay/config.toml` - User-wide defaults
//! - Project: `.quay/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default build directory, relative to the project root.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// quay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Binder settings
    pub binder: BinderConfig,

    /// Project layout settings
    pub layout: LayoutConfig,
}

/// What `apply_all` does with a declaration applied twice to one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Report it as a failure.
    #[default]
    Error,
    /// Log a warning and keep the first application.
    Warn,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "error" => Ok(DuplicatePolicy::Error),
            "warn" => Ok(DuplicatePolicy::Warn),
            other => Err(format!("unknown duplicate policy `{}`", other)),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Error => write!(f, "error"),
            DuplicatePolicy::Warn => write!(f, "warn"),
        }
    }
}

/// Binder-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderConfig {
    /// Worker threads for `apply_all` (None = rayon's default pool)
    pub jobs: Option<usize>,

    /// Duplicate application policy (default: error)
    pub duplicates: Option<DuplicatePolicy>,

    /// End each project's configuration phase after `apply_all` (default: true)
    pub finish_after_apply: Option<bool>,
}

impl BinderConfig {
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicates.unwrap_or_default()
    }

    pub fn finishes_after_apply(&self) -> bool {
        self.finish_after_apply.unwrap_or(true)
    }
}

/// Project layout configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Build directory relative to the project root (default: `build`)
    pub build_dir: Option<String>,
}

impl LayoutConfig {
    pub fn build_dir(&self) -> &str {
        self.build_dir.as_deref().unwrap_or(DEFAULT_BUILD_DIR)
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.binder.jobs.is_some() {
            self.binder.jobs = other.binder.jobs;
        }
        if other.binder.duplicates.is_some() {
            self.binder.duplicates = other.binder.duplicates;
        }
        if other.binder.finish_after_apply.is_some() {
            self.binder.finish_after_apply = other.binder.finish_after_apply;
        }

        if other.layout.build_dir.is_some() {
            self.layout.build_dir = other.layout.build_dir;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.quay/config.toml)
/// 2. Global config (~/.quay/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    // Project config overrides global
    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global quay config directory (~/.quay).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".quay"))
}

/// Get the global config path (~/.quay/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.quay/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".quay").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.binder.jobs.is_none());
        assert_eq!(config.binder.duplicate_policy(), DuplicatePolicy::Error);
        assert!(config.binder.finishes_after_apply());
        assert_eq!(config.layout.build_dir(), "build");
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[binder]
jobs = 4
duplicates = "warn"
finish_after_apply = false

[layout]
build_dir = "out"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.binder.jobs, Some(4));
        assert_eq!(config.binder.duplicate_policy(), DuplicatePolicy::Warn);
        assert!(!config.binder.finishes_after_apply());
        assert_eq!(config.layout.build_dir(), "out");
    }

    #[test]
    fn test_config_load_rejects_unknown_policy() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[binder]\nduplicates = \"ignore\"\n").unwrap();

        assert!(Config::load(&config_path).is_err());
        assert_eq!(Config::load_or_default(&config_path), Config::default());
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.binder.jobs = Some(4);
        base.layout.build_dir = Some("out".to_string());

        let mut override_cfg = Config::default();
        override_cfg.binder.duplicates = Some(DuplicatePolicy::Warn);
        override_cfg.layout.build_dir = Some("target".to_string());

        base.merge(override_cfg);

        assert_eq!(base.binder.jobs, Some(4)); // Not overridden
        assert_eq!(base.binder.duplicate_policy(), DuplicatePolicy::Warn);
        assert_eq!(base.layout.build_dir(), "target");
    }

    #[test]
    fn test_load_config_project_wins() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = project_config_path(tmp.path());

        std::fs::write(&global, "[binder]\njobs = 2\n[layout]\nbuild_dir = \"out\"\n").unwrap();
        std::fs::create_dir_all(project.parent().unwrap()).unwrap();
        std::fs::write(&project, "[layout]\nbuild_dir = \"target\"\n").unwrap();

        let config = load_config(&global, &project);
        assert_eq!(config.binder.jobs, Some(2));
        assert_eq!(config.layout.build_dir(), "target");
    }

    #[test]
    fn test_duplicate_policy_from_str() {
        assert_eq!("warn".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Warn);
        assert!("skip".parse::<DuplicatePolicy>().is_err());
        assert_eq!(DuplicatePolicy::Error.to_string(), "error");
    }
}
