//! Pre-built registries, binders and projects.

use std::path::Path;
use std::sync::Arc;

use crate::binder::Binder;
use crate::core::Project;
use crate::plugins::register_builtin;
use crate::registry::DeclarationRegistry;

/// A registry holding the built-in Java declarations.
pub fn java_registry() -> DeclarationRegistry {
    let mut registry = DeclarationRegistry::new();
    register_builtin(&mut registry).expect("built-in plugins register cleanly");
    registry
}

/// A sequential binder over [`java_registry`].
pub fn java_binder() -> Binder {
    Binder::new(Arc::new(java_registry()))
}

/// A project rooted at `/work/<name>` that never touches the filesystem.
pub fn project(name: &str) -> Project {
    Project::new(name, Path::new("/work").join(name))
}

