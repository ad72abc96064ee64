//! Quay - software type and software feature binding for build orchestration
//!
//! A *software type* is a declared kind of software (a Java library, say)
//! with a definition shape the build author fills in and an output model the
//! type publishes. A *software feature* attaches to a node of another
//! binding's output model and extends it. The binder applies declarations to
//! projects in parent order, at most once per project, and wires their
//! output models together through lazily computed values.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quay::{plugins, Binder, DeclarationRegistry, Project, RawDefinition};
//!
//! let mut registry = DeclarationRegistry::new();
//! plugins::register_builtin(&mut registry)?;
//!
//! let binder = Binder::new(Arc::new(registry));
//! let project = Project::new("app", "/work/app");
//! binder.apply(&project, "javaLibrary", &RawDefinition::new())?;
//! let antlr = binder.apply(&project, "antlr", &RawDefinition::new())?;
//!
//! let dir = antlr.model().path_value("generatedSourcesDir")?;
//! assert_eq!(dir, std::path::Path::new("build/generated-src/antlr/main"));
//! ```

pub mod binder;
pub mod core;
pub mod model;
pub mod plugins;
pub mod registry;
pub mod sources;
pub mod tasks;
pub mod util;

#[cfg(test)]
mod test_support;

pub use binder::{ApplyRequest, Binder, Binding, BindingContext, ConfigurationReport};
pub use core::{
    BindingError, Definition, DefinitionShape, ModelShape, Project, ProjectId, QualifiedName,
    RawDefinition, SoftwareFeatureDeclaration, SoftwareTypeDeclaration,
};
pub use model::{LazyModelValue, ModelError, ModelGraph, ModelObject, ModelValue, ValueKind};
pub use registry::DeclarationRegistry;
pub use util::config::Config;
