//! The model graph.
//!
//! Bindings publish output models made of [`LazyModelValue`] cells. Later
//! bindings, and the host after configuration, read them through the
//! [`ModelGraph`], which also records who produced and who consumed what.

pub mod error;
pub mod graph;
pub mod lazy;
pub mod object;
pub mod phase;
pub mod value;

pub use error::ModelError;
pub use graph::{EdgeKind, ModelGraph, ProjectSnapshot, PublishedModel};
pub use lazy::LazyModelValue;
pub use object::{ModelObject, ModelPath, ObjectSnapshot};
pub use phase::ConfigurationPhase;
pub use value::{ModelValue, TaskRef, ValueKind};
