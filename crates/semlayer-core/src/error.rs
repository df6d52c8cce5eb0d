//! Typed errors shared by every semlayer crate.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed cause carried by connection and database errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = SemlayerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SemlayerError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("unsupported configuration format '{0}' (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("conflicting authentication settings: {0}")]
    ConflictingAuthentication(String),

    #[error("invalid table reference '{0}': expected DATABASE.SCHEMA.TABLE")]
    InvalidTableReference(String),

    #[error("connection error: {0}")]
    Connection(#[source] BoxError),

    #[error("database error: {0}")]
    Database(#[source] BoxError),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("unsupported LLM provider '{0}'")]
    UnsupportedProvider(String),

    #[error("invalid semantic model: {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SemlayerError {
    pub fn connection(cause: impl Into<BoxError>) -> Self {
        SemlayerError::Connection(cause.into())
    }

    pub fn database(cause: impl Into<BoxError>) -> Self {
        SemlayerError::Database(cause.into())
    }
}
