//! Model graph error types.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::model::ValueKind;

/// Error raised by lazy model values and model objects.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ModelError {
    #[error("`{value}` is already bound to a producer")]
    #[diagnostic(
        code(quay::model::already_bound),
        help("a lazy model value accepts exactly one producer; derive a new value with `map` instead")
    )]
    AlreadyBound { value: String },

    #[error("`{value}` has not been resolved")]
    #[diagnostic(code(quay::model::unresolved))]
    UnresolvedValue {
        value: String,
        /// Whether the owning project had finished configuration when read.
        phase_complete: bool,
    },

    #[error("model `{shape}` declares no property `{property}`")]
    #[diagnostic(code(quay::model::unknown_property))]
    UnknownProperty { shape: String, property: String },

    #[error("model `{shape}` declares no source set `{name}`")]
    #[diagnostic(code(quay::model::unknown_source_set))]
    UnknownSourceSet { shape: String, name: String },

    #[error("model `{shape}` declares no collection `{collection}`")]
    #[diagnostic(code(quay::model::unknown_collection))]
    UnknownCollection { shape: String, collection: String },

    #[error("`{name}` is already registered in collection `{collection}`")]
    #[diagnostic(code(quay::model::duplicate_child))]
    DuplicateChild { collection: String, name: String },

    #[error("property `{property}` expects {expected}, found {found}")]
    #[diagnostic(code(quay::model::type_mismatch))]
    TypeMismatch {
        property: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("no model node at `{path}`")]
    #[diagnostic(code(quay::model::unknown_path))]
    UnknownPath { path: String },

    #[error("computing `{value}` failed")]
    #[diagnostic(code(quay::model::producer_failed))]
    Producer {
        value: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("`{value}` depends on itself")]
    #[diagnostic(
        code(quay::model::circular_evaluation),
        help("a producer read a value whose own producer is still running; break the cycle between the bound values")
    )]
    CircularEvaluation { value: String },
}

impl ModelError {
    pub(crate) fn unresolved(value: impl Into<String>, phase_complete: bool) -> Self {
        ModelError::UnresolvedValue {
            value: value.into(),
            phase_complete,
        }
    }

    /// Whether this error means the value will never become available.
    pub fn is_fatal(&self) -> bool {
        match self {
            ModelError::UnresolvedValue { phase_complete, .. } => *phase_complete,
            _ => true,
        }
    }
}
