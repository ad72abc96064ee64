//! Core data structures for quay.
//!
//! This module contains the foundational types used throughout quay:
//! - Interned identifiers and qualified declaration names
//! - Definition and model shapes
//! - Software type and software feature declarations
//! - Projects and their layout
//! - Binding errors

pub mod declaration;
pub mod definition;
pub mod errors;
pub mod identifier;
pub mod project;
pub mod shape;

pub use declaration::{
    BindingKey, Declaration, FeatureDeclarationBuilder, QualifiedName,
    SoftwareFeatureDeclaration, SoftwareTypeDeclaration, TypeDeclarationBuilder,
};
pub use definition::{Definition, RawDefinition};
pub use errors::BindingError;
pub use identifier::Identifier;
pub use project::{Project, ProjectId, ProjectLayout};
pub use shape::{DefinitionShape, FieldSpec, ModelShape};
