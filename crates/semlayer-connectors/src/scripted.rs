//! Scripted in-memory session for tests
//!
//! Statements are matched against substring rules; the most recently added
//! matching rule wins. Statements that match nothing return an empty result.
//! Every statement is recorded so tests can assert on what was sent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use semlayer_core::TableRef;

use crate::error::ConnectorError;
use crate::session::{QueryResult, WarehouseSession};
use crate::sql::{columns_query, qualified_table, quote_identifier};

#[derive(Debug, Clone)]
enum Reply {
    Rows(QueryResult),
    Fail(String),
}

#[derive(Debug, Default)]
pub struct ScriptedSession {
    rules: Vec<(String, Reply)>,
    close_error: Option<String>,
    statements: Mutex<Vec<String>>,
    close_calls: AtomicUsize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `result` to statements containing `pattern`.
    pub fn on(mut self, pattern: &str, result: QueryResult) -> Self {
        self.rules.push((pattern.to_string(), Reply::Rows(result)));
        self
    }

    /// Fail statements containing `pattern` with a query error.
    pub fn fail_on(mut self, pattern: &str, message: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Fail(message.to_string())));
        self
    }

    /// Make `close` report an error (it still counts as closed).
    pub fn fail_on_close(mut self, message: &str) -> Self {
        self.close_error = Some(message.to_string());
        self
    }

    /// Script the `INFORMATION_SCHEMA.COLUMNS` reply for `table`.
    ///
    /// # Panics
    /// If `table` is not a valid `DB.SCHEMA.TABLE` reference.
    pub fn with_columns(self, table: &str, columns: &[(&str, &str)]) -> Self {
        let table = parse(table);
        let rows = columns
            .iter()
            .map(|(name, data_type)| {
                vec![Some(name.to_string()), Some(data_type.to_string()), None]
            })
            .collect();
        let result = QueryResult::new(
            vec![
                "COLUMN_NAME".to_string(),
                "DATA_TYPE".to_string(),
                "COMMENT".to_string(),
            ],
            rows,
        );
        self.on(&columns_query(&table), result)
    }

    /// Script the distinct sample values for one column.
    pub fn with_samples(self, table: &str, column: &str, values: &[&str]) -> Self {
        let table = parse(table);
        let pattern = format!(
            "SELECT DISTINCT {} FROM {}",
            quote_identifier(column),
            qualified_table(&table)
        );
        let rows = values.iter().map(|v| vec![Some(v.to_string())]).collect();
        self.on(&pattern, QueryResult::new(vec![column.to_string()], rows))
    }

    /// Every statement received so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.log().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }

    fn log(&self) -> MutexGuard<'_, Vec<String>> {
        self.statements.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse(table: &str) -> TableRef {
    match TableRef::parse(table) {
        Ok(t) => t,
        Err(e) => panic!("scripted table reference: {}", e),
    }
}

#[async_trait]
impl WarehouseSession for ScriptedSession {
    async fn query(&self, sql: &str) -> Result<QueryResult, ConnectorError> {
        self.log().push(sql.to_string());

        let reply = self
            .rules
            .iter()
            .rev()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Rows(result)) => Ok(result),
            Some(Reply::Fail(message)) => Err(ConnectorError::QueryFailed(message)),
            None => Ok(QueryResult::default()),
        }
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        match &self.close_error {
            Some(message) => Err(ConnectorError::ConnectionFailed(message.clone())),
            None => Ok(()),
        }
    }
}
