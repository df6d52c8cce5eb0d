//! Schema introspection over an open warehouse session.

use tracing::{debug, info};

use semlayer_core::{Result, TableRef};

use crate::error::ConnectorError;
use crate::session::WarehouseSession;
use crate::sql::{columns_query, sample_values_query};

/// One column as reported by `INFORMATION_SCHEMA.COLUMNS`, plus samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub comment: Option<String>,
    pub sample_values: Vec<String>,
}

/// Columns of one base table, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: TableRef,
    pub columns: Vec<ColumnInfo>,
}

/// Read column metadata and up to `n_sample_values` distinct non-null values
/// per column for every table, in the order given.
///
/// All references are parsed before any statement runs. The first database
/// error aborts the whole pass.
pub async fn introspect_tables(
    session: &dyn WarehouseSession,
    base_tables: &[String],
    n_sample_values: usize,
) -> Result<Vec<TableSchema>> {
    let tables = base_tables
        .iter()
        .map(|raw| TableRef::parse(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut schemas = Vec::with_capacity(tables.len());
    for table in tables {
        info!("Introspecting {}", table);
        let mut columns = fetch_columns(session, &table).await?;

        if n_sample_values > 0 {
            for column in &mut columns {
                let sql = sample_values_query(&table, &column.name, n_sample_values);
                column.sample_values = session.query(&sql).await?.column_values(0);
            }
        }

        debug!("{} has {} columns", table, columns.len());
        schemas.push(TableSchema { table, columns });
    }

    Ok(schemas)
}

async fn fetch_columns(
    session: &dyn WarehouseSession,
    table: &TableRef,
) -> std::result::Result<Vec<ColumnInfo>, ConnectorError> {
    let result = session.query(&columns_query(table)).await?;
    if result.is_empty() {
        return Err(ConnectorError::TableNotFound(table.to_string()));
    }

    result
        .rows
        .into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            let name = cells.next().flatten().ok_or_else(|| {
                ConnectorError::Protocol(format!("column without a name in {}", table))
            })?;
            let data_type = cells.next().flatten().unwrap_or_default();
            let comment = cells.next().flatten().filter(|c| !c.is_empty());
            Ok(ColumnInfo {
                name,
                data_type,
                comment,
                sample_values: Vec::new(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedSession;
    use semlayer_core::SemlayerError;

    fn session() -> ScriptedSession {
        ScriptedSession::new()
            .with_columns(
                "DB.PUBLIC.ORDERS",
                &[("ORDER_ID", "NUMBER"), ("STATUS", "TEXT")],
            )
            .with_samples("DB.PUBLIC.ORDERS", "ORDER_ID", &["1", "2"])
            .with_samples("DB.PUBLIC.ORDERS", "STATUS", &["open", "closed"])
            .with_columns("DB.PUBLIC.CUSTOMERS", &[("CUSTOMER_ID", "NUMBER")])
            .with_samples("DB.PUBLIC.CUSTOMERS", "CUSTOMER_ID", &["7"])
    }

    #[tokio::test]
    async fn test_introspect_preserves_order() {
        let session = session();
        let tables = vec![
            "db.public.customers".to_string(),
            "db.public.orders".to_string(),
        ];
        let schemas = introspect_tables(&session, &tables, 2).await.unwrap();

        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].table.table, "CUSTOMERS");
        assert_eq!(schemas[1].table.table, "ORDERS");
        let names: Vec<&str> = schemas[1].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ORDER_ID", "STATUS"]);
        assert_eq!(schemas[1].columns[1].sample_values, vec!["open", "closed"]);
    }

    #[tokio::test]
    async fn test_sample_limit_in_statement() {
        let session = session();
        introspect_tables(&session, &["DB.PUBLIC.CUSTOMERS".to_string()], 2)
            .await
            .unwrap();
        let statements = session.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[1].ends_with("LIMIT 2"));
    }

    #[tokio::test]
    async fn test_zero_samples_skips_sampling() {
        let session = session();
        let schemas = introspect_tables(&session, &["DB.PUBLIC.ORDERS".to_string()], 0)
            .await
            .unwrap();
        assert_eq!(session.statements().len(), 1);
        assert!(schemas[0].columns.iter().all(|c| c.sample_values.is_empty()));
    }

    #[tokio::test]
    async fn test_invalid_reference_fails_before_any_query() {
        let session = session();
        let tables = vec!["DB.PUBLIC.ORDERS".to_string(), "orders".to_string()];
        match introspect_tables(&session, &tables, 3).await {
            Err(SemlayerError::InvalidTableReference(raw)) => assert_eq!(raw, "orders"),
            other => panic!("expected InvalidTableReference, got {other:?}"),
        }
        assert!(session.statements().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let session = session();
        let result = introspect_tables(&session, &["DB.PUBLIC.MISSING".to_string()], 3).await;
        match result {
            Err(SemlayerError::Database(e)) => assert!(e.to_string().contains("DB.PUBLIC.MISSING")),
            other => panic!("expected Database error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_database_error_aborts_pass() {
        let session = session().fail_on(
            "SELECT DISTINCT \"STATUS\"",
            "SQL access control error: insufficient privileges",
        );
        let tables = vec![
            "DB.PUBLIC.ORDERS".to_string(),
            "DB.PUBLIC.CUSTOMERS".to_string(),
        ];
        match introspect_tables(&session, &tables, 3).await {
            Err(SemlayerError::Database(e)) => {
                assert!(e.to_string().contains("insufficient privileges"))
            }
            other => panic!("expected Database error, got {other:?}"),
        }
        assert!(!session
            .statements()
            .iter()
            .any(|s| s.contains("CUSTOMERS")));
    }

    #[tokio::test]
    async fn test_empty_comment_is_none() {
        let session = ScriptedSession::new().on(
            "INFORMATION_SCHEMA.COLUMNS",
            crate::session::QueryResult::new(
                vec!["COLUMN_NAME".into(), "DATA_TYPE".into(), "COMMENT".into()],
                vec![
                    vec![Some("A".into()), Some("TEXT".into()), Some(String::new())],
                    vec![Some("B".into()), Some("TEXT".into()), Some("business key".into())],
                ],
            ),
        );
        let schemas = introspect_tables(&session, &["X.Y.Z".to_string()], 0)
            .await
            .unwrap();
        assert_eq!(schemas[0].columns[0].comment, None);
        assert_eq!(schemas[0].columns[1].comment.as_deref(), Some("business key"));
    }
}
