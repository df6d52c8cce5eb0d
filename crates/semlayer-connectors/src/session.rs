//! Warehouse session abstraction shared by introspection and in-database completion.

use async_trait::async_trait;

use crate::error::ConnectorError;

/// Rows returned by a statement; every cell is text or NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First cell of the first row, if present and non-NULL.
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }

    /// Non-NULL values of column `idx`, in row order.
    pub fn column_values(&self, idx: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(idx).cloned().flatten())
            .collect()
    }
}

/// An open, authenticated session. Statements run one at a time.
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    async fn query(&self, sql: &str) -> Result<QueryResult, ConnectorError>;

    /// Release the session. Calling `close` twice is a no-op.
    async fn close(&self) -> Result<(), ConnectorError>;
}
