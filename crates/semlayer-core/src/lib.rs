//! Semlayer Core - shared types for semantic model generation
//!
//! This crate provides:
//! - The crate-wide error taxonomy
//! - Fully-qualified table references (`DATABASE.SCHEMA.TABLE`)
//! - The semantic model document and its validation

pub mod error;
pub mod fqn;
pub mod model;

pub use error::{BoxError, Result, SemlayerError};
pub use fqn::TableRef;
pub use model::{
    validate_model, BaseTable, Column, ModelValidationError, Relationship, RelationshipColumn,
    SemanticModel, Table,
};
