//! Prompt templates and context building for description generation

use semlayer_connectors::{ColumnInfo, TableSchema};

/// System instruction sent to hosted chat providers.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant for generating semantic model descriptions.";

/// Prompt for a table-level description.
pub const TABLE_DESCRIPTION_PROMPT: &str = "Write a concise, one or two sentence business \
description of the database table described below. Describe what each row represents. \
Respond with the description only.";

/// Prompt for a column-level description.
pub const COLUMN_DESCRIPTION_PROMPT: &str = "Write a concise, one sentence business \
description of the database column described below, using the table and sample values \
as hints. Respond with the description only.";

/// The text actually sent to a provider.
pub fn full_prompt(prompt: &str, context: &str) -> String {
    format!("{}\n\nContext:\n{}", prompt, context)
}

/// Context for a table description: its name and column list.
pub fn table_context(schema: &TableSchema) -> String {
    let mut out = format!("Table: {}\nColumns:\n", schema.table);
    for column in &schema.columns {
        out.push_str(&format!("- {} ({})", column.name, column.data_type));
        if let Some(comment) = &column.comment {
            out.push_str(&format!(": {}", comment));
        }
        out.push('\n');
    }
    out
}

/// Context for a column description: table, type, comment and samples.
pub fn column_context(schema: &TableSchema, column: &ColumnInfo) -> String {
    let mut out = format!(
        "Table: {}\nColumn: {}\nData type: {}\n",
        schema.table, column.name, column.data_type
    );
    if let Some(comment) = &column.comment {
        out.push_str(&format!("Comment: {}\n", comment));
    }
    if !column.sample_values.is_empty() {
        out.push_str(&format!("Sample values: {}\n", column.sample_values.join(", ")));
    }
    out
}

/// The first `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
