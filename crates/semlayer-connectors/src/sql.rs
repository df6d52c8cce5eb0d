//! SQL text helpers for statements built by hand.

use semlayer_core::TableRef;

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", escape_single_quotes(s))
}

/// Double single quotes for interpolation inside an existing literal.
pub fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_identifier(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// `"DB"."SCHEMA"."TABLE"`
pub fn qualified_table(t: &TableRef) -> String {
    format!(
        "{}.{}.{}",
        quote_identifier(&t.database),
        quote_identifier(&t.schema),
        quote_identifier(&t.table)
    )
}

/// Column metadata for one table, in ordinal order.
pub fn columns_query(t: &TableRef) -> String {
    format!(
        "SELECT COLUMN_NAME, DATA_TYPE, COMMENT FROM {}.INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} ORDER BY ORDINAL_POSITION",
        quote_identifier(&t.database),
        quote_literal(&t.schema),
        quote_literal(&t.table)
    )
}

/// Up to `limit` distinct non-null values of one column.
pub fn sample_values_query(t: &TableRef, column: &str, limit: usize) -> String {
    let col = quote_identifier(column);
    format!(
        "SELECT DISTINCT {col} FROM {} WHERE {col} IS NOT NULL LIMIT {limit}",
        qualified_table(t)
    )
}
