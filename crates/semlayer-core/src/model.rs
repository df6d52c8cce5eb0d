//! Semantic model document
//!
//! The YAML layout follows the semantic model format consumed by
//! natural-language query tools: a model holds tables, each table points at
//! its physical `base_table` and splits its columns into dimensions, time
//! dimensions and measures.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Result, SemlayerError};
use crate::fqn::TableRef;

/// Root of a semantic model document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticModel {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub tables: Vec<Table>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

/// A logical table backed by one physical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub base_table: BaseTable,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Column>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_dimensions: Vec<Column>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measures: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTable {
    pub database: String,
    pub schema: String,
    pub table: String,
}

/// A column entry (dimension, time dimension or measure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub expr: String,

    pub data_type: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub left_table: String,
    pub right_table: String,
    #[serde(default)]
    pub relationship_columns: Vec<RelationshipColumn>,
    pub join_type: String,
    pub relationship_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipColumn {
    pub left_column: String,
    pub right_column: String,
}

impl From<&TableRef> for BaseTable {
    fn from(t: &TableRef) -> Self {
        Self {
            database: t.database.clone(),
            schema: t.schema.clone(),
            table: t.table.clone(),
        }
    }
}

impl Table {
    /// All columns in document order: dimensions, time dimensions, measures.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.dimensions
            .iter()
            .chain(self.time_dimensions.iter())
            .chain(self.measures.iter())
    }
}

impl SemanticModel {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a YAML document and validate its structure.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let model: SemanticModel = serde_yaml::from_str(yaml)?;
        if let Err(errors) = validate_model(&model) {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SemlayerError::InvalidModel(joined));
        }
        Ok(model)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelValidationError {
    #[error("model name cannot be empty")]
    EmptyName,

    #[error("model must contain at least one table")]
    NoTables,

    #[error("table name cannot be empty")]
    EmptyTableName,

    #[error("duplicate table name '{0}'")]
    DuplicateTable(String),

    #[error("table '{0}' has no columns")]
    NoColumns(String),

    #[error("table '{0}' has a column with an empty name")]
    EmptyColumnName(String),
}

/// Check the structural rules of a loaded document.
pub fn validate_model(model: &SemanticModel) -> std::result::Result<(), Vec<ModelValidationError>> {
    let mut errors = Vec::new();

    if model.name.trim().is_empty() {
        errors.push(ModelValidationError::EmptyName);
    }

    if model.tables.is_empty() {
        errors.push(ModelValidationError::NoTables);
    }

    let mut seen = HashSet::new();
    for table in &model.tables {
        if table.name.trim().is_empty() {
            errors.push(ModelValidationError::EmptyTableName);
        } else if !seen.insert(table.name.as_str()) {
            errors.push(ModelValidationError::DuplicateTable(table.name.clone()));
        }

        if table.columns().next().is_none() {
            errors.push(ModelValidationError::NoColumns(table.name.clone()));
        }

        if table.columns().any(|c| c.name.trim().is_empty()) {
            errors.push(ModelValidationError::EmptyColumnName(table.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
