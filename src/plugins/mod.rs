//! Built-in software plugins.
//!
//! A plugin contributes declarations to the registry. The built-ins model a
//! small Java toolchain: the `javaLibrary` software type plus the `antlr`
//! and `checkstyle` features that attach to its source sets.

pub mod antlr;
pub mod checkstyle;
pub mod java_library;

use crate::core::BindingError;
use crate::registry::DeclarationRegistry;

pub use antlr::AntlrPlugin;
pub use checkstyle::CheckstylePlugin;
pub use java_library::JavaLibraryPlugin;

/// Something that registers software types or features.
pub trait SoftwarePlugin: Send + Sync {
    /// Stable identifier, e.g. `quay.java-library`.
    fn id(&self) -> &'static str;

    /// Register this plugin's declarations.
    fn register(&self, registry: &mut DeclarationRegistry) -> Result<(), BindingError>;
}

/// Every built-in plugin.
pub fn builtin_plugins() -> Vec<Box<dyn SoftwarePlugin>> {
    vec![
        Box::new(JavaLibraryPlugin),
        Box::new(AntlrPlugin),
        Box::new(CheckstylePlugin),
    ]
}

/// Register a set of plugins, stopping at the first failure.
pub fn register_plugins(
    registry: &mut DeclarationRegistry,
    plugins: &[Box<dyn SoftwarePlugin>],
) -> Result<(), BindingError> {
    for plugin in plugins {
        tracing::debug!("registering plugin {}", plugin.id());
        plugin.register(registry)?;
    }
    Ok(())
}

/// Register the built-in plugins.
pub fn register_builtin(registry: &mut DeclarationRegistry) -> Result<(), BindingError> {
    register_plugins(registry, &builtin_plugins())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_plugins_register_cleanly() {
        let mut registry = DeclarationRegistry::new();
        register_builtin(&mut registry).unwrap();

        let names: Vec<String> = registry
            .declarations()
            .iter()
            .map(|d| d.qualified_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["javaLibrary", "javaLibrary.antlr", "javaLibrary.checkstyle"]
        );
    }

    #[test]
    fn test_registering_twice_fails() {
        let mut registry = DeclarationRegistry::new();
        register_builtin(&mut registry).unwrap();

        let err = register_builtin(&mut registry).unwrap_err();
        assert!(matches!(err, BindingError::DuplicateName { .. }));
    }
}
