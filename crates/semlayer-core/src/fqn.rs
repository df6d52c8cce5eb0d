//! Fully-qualified table references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemlayerError};

/// A `DATABASE.SCHEMA.TABLE` triple, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableRef {
    /// Parse a dotted reference. Exactly three non-empty segments are required.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.matches('.').count() != 2 {
            return Err(SemlayerError::InvalidTableReference(raw.to_string()));
        }

        let parts: Vec<String> = raw.split('.').map(|p| p.to_uppercase()).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(SemlayerError::InvalidTableReference(raw.to_string()));
        }

        let [database, schema, table]: [String; 3] = parts
            .try_into()
            .map_err(|_| SemlayerError::InvalidTableReference(raw.to_string()))?;

        Ok(Self {
            database,
            schema,
            table,
        })
    }
}

impl FromStr for TableRef {
    type Err = SemlayerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}
