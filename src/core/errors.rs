//! Registry and binder error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::model::ModelError;
use crate::tasks::TaskError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while registering or applying declarations.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BindingError {
    #[error("`{name}` is already declared in scope `{scope}`")]
    #[diagnostic(code(quay::registry::duplicate_name))]
    DuplicateName { name: String, scope: String },

    #[error("unknown software type or feature `{name}`")]
    #[diagnostic(code(quay::registry::unknown_feature))]
    UnknownFeature {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("`{name}` is declared in more than one scope")]
    #[diagnostic(
        code(quay::registry::ambiguous_feature),
        help("use the qualified name, e.g. `javaLibrary.{name}`")
    )]
    AmbiguousFeature { name: String, candidates: Vec<String> },

    #[error("cannot apply `{feature}` to `{project}`: parent `{parent}` has not been applied")]
    #[diagnostic(
        code(quay::binder::missing_parent),
        help("apply `{parent}` to the project before `{feature}`")
    )]
    MissingParent {
        project: String,
        feature: String,
        parent: String,
    },

    #[error("cannot apply `{feature}` to `{project}`: requires `{required}`")]
    #[diagnostic(code(quay::binder::missing_requirement))]
    MissingRequirement {
        project: String,
        feature: String,
        required: String,
    },

    #[error("invalid definition for `{shape}`: {reason}")]
    #[diagnostic(code(quay::binder::invalid_definition))]
    InvalidDefinition { shape: String, reason: String },

    #[error("cyclic dependency between declarations: {}", .cycle.join(" -> "))]
    #[diagnostic(code(quay::registry::cyclic_dependency))]
    CyclicDependency { cycle: Vec<String> },

    #[error("`{declaration}` has already been applied to `{project}`")]
    #[diagnostic(code(quay::binder::duplicate_application))]
    DuplicateApplication { project: String, declaration: String },

    #[error("`{declaration}` uses invalid names: {}", .names.join(", "))]
    #[diagnostic(code(quay::registry::invalid_name))]
    InvalidName {
        declaration: String,
        names: Vec<String>,
    },

    #[error("configuring `{declaration}` for `{project}` failed")]
    #[diagnostic(code(quay::binder::configuration_failed))]
    Configuration {
        project: String,
        declaration: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),
}

impl BindingError {
    pub(crate) fn invalid_definition(shape: impl Into<String>, reason: impl Into<String>) -> Self {
        BindingError::InvalidDefinition {
            shape: shape.into(),
            reason: reason.into(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BindingError::DuplicateName { name, scope } => {
                Diagnostic::error(format!("`{}` is declared twice in `{}`", name, scope))
                    .with_suggestion("Rename one of the declarations or register it under another parent")
            }

            BindingError::UnknownFeature {
                name,
                suggestions: similar,
            } => {
                let mut diag =
                    Diagnostic::error(format!("no software type or feature named `{}`", name));
                if !similar.is_empty() {
                    diag = diag.with_context(format!("did you mean: {}?", similar.join(", ")));
                }
                diag.with_suggestion(suggestions::REGISTER_PLUGIN)
            }

            BindingError::AmbiguousFeature { name, candidates } => {
                let mut diag = Diagnostic::error(format!("`{}` is ambiguous", name));
                for candidate in candidates {
                    diag = diag.with_context(format!("declared as `{}`", candidate));
                }
                diag.with_suggestion("Refer to the feature by its qualified name")
            }

            BindingError::MissingParent {
                project,
                feature,
                parent,
            } => Diagnostic::error(format!(
                "`{}` needs `{}` on project `{}`",
                feature, parent, project
            ))
            .with_context(format!("`{}` has not been applied to `{}`", parent, project))
            .with_suggestion(format!("Apply `{}` before `{}`", parent, feature)),

            BindingError::MissingRequirement {
                project,
                feature,
                required,
            } => Diagnostic::error(format!(
                "`{}` requires `{}` on project `{}`",
                feature, required, project
            ))
            .with_suggestion(format!("Apply `{}` first", required)),

            BindingError::InvalidDefinition { shape, reason } => {
                Diagnostic::error(format!("invalid `{}` definition", shape))
                    .with_context(reason.clone())
                    .with_suggestion(suggestions::CHECK_DEFINITION)
            }

            BindingError::CyclicDependency { cycle } => {
                Diagnostic::error("cycle detected between software declarations")
                    .with_context(format!("cycle: {}", cycle.join(" -> ")))
                    .with_suggestion("Break the cycle by removing a parent or `requires` edge")
            }

            BindingError::DuplicateApplication {
                project,
                declaration,
            } => Diagnostic::warning(format!(
                "`{}` is already applied to `{}`",
                declaration, project
            ))
            .with_context("the first application is kept unchanged"),

            BindingError::InvalidName { declaration, names } => {
                Diagnostic::error(format!("invalid names in `{}`", declaration))
                    .with_context(format!("offending names: {}", names.join(", ")))
                    .with_suggestion("Names must match [A-Za-z_][A-Za-z0-9_-]*")
            }

            BindingError::Configuration {
                project,
                declaration,
                source,
            } => Diagnostic::error(format!(
                "configuring `{}` for `{}` failed",
                declaration, project
            ))
            .with_context(format!("{:#}", source))
            .with_suggestion(suggestions::VERBOSE_LOGGING),

            BindingError::Model(err) => Diagnostic::error(err.to_string()),

            BindingError::Task(err) => Diagnostic::error(err.to_string()),
        }
    }
}
