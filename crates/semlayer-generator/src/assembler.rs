//! Assemble a semantic model from introspected tables

use std::collections::HashSet;

use tracing::{debug, info};

use semlayer_ai::prompt::{
    column_context, table_context, COLUMN_DESCRIPTION_PROMPT, TABLE_DESCRIPTION_PROMPT,
};
use semlayer_ai::LlmClient;
use semlayer_connectors::{ColumnInfo, TableSchema};
use semlayer_core::{BaseTable, Column, Relationship, SemanticModel, Table};

/// Where a column lands in the semantic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Dimension,
    TimeDimension,
    Measure,
}

/// Classify a column by its warehouse type and name.
///
/// Dates and timestamps are time dimensions. Numbers are measures unless the
/// name looks like an identifier (`ID`, `*_ID`, `*_KEY`).
pub fn classify_column(name: &str, data_type: &str) -> ColumnKind {
    let base_type = data_type
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();

    if base_type.starts_with("DATE")
        || base_type.starts_with("TIME")
        || base_type.starts_with("TIMESTAMP")
    {
        return ColumnKind::TimeDimension;
    }

    let numeric = matches!(
        base_type.as_str(),
        "NUMBER"
            | "DECIMAL"
            | "NUMERIC"
            | "FIXED"
            | "INT"
            | "INTEGER"
            | "BIGINT"
            | "SMALLINT"
            | "TINYINT"
            | "BYTEINT"
            | "FLOAT"
            | "FLOAT4"
            | "FLOAT8"
            | "DOUBLE"
            | "DOUBLE PRECISION"
            | "REAL"
    );
    if numeric && !is_identifier_name(name) {
        ColumnKind::Measure
    } else {
        ColumnKind::Dimension
    }
}

fn is_identifier_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    upper == "ID" || upper.ends_with("_ID") || upper.ends_with("_KEY")
}

/// Builds the model, asking the LLM client for descriptions when present.
pub struct ModelAssembler<'a> {
    llm: Option<&'a LlmClient>,
}

impl<'a> ModelAssembler<'a> {
    pub fn new(llm: Option<&'a LlmClient>) -> Self {
        Self { llm }
    }

    /// Tables keep introspection order; columns keep ordinal order within
    /// their section.
    pub async fn assemble(
        &self,
        name: &str,
        schemas: &[TableSchema],
        allow_joins: bool,
    ) -> SemanticModel {
        let mut used_names = HashSet::new();
        let mut tables = Vec::with_capacity(schemas.len());

        for schema in schemas {
            let table_name = logical_name(schema, &mut used_names);
            info!("Assembling table {}", table_name);

            let description = match self.llm {
                Some(llm) => Some(
                    llm.generate_description(&table_context(schema), TABLE_DESCRIPTION_PROMPT)
                        .await,
                ),
                None => None,
            };

            let mut table = Table {
                name: table_name,
                description,
                base_table: BaseTable::from(&schema.table),
                dimensions: Vec::new(),
                time_dimensions: Vec::new(),
                measures: Vec::new(),
            };

            for info in &schema.columns {
                let column = self.column(schema, info).await;
                match classify_column(&info.name, &info.data_type) {
                    ColumnKind::Dimension => table.dimensions.push(column),
                    ColumnKind::TimeDimension => table.time_dimensions.push(column),
                    ColumnKind::Measure => table.measures.push(column),
                }
            }

            debug!(
                "{}: {} dimensions, {} time dimensions, {} measures",
                table.name,
                table.dimensions.len(),
                table.time_dimensions.len(),
                table.measures.len()
            );
            tables.push(table);
        }

        let relationships = if allow_joins {
            placeholder_relationship(&tables).into_iter().collect()
        } else {
            Vec::new()
        };

        SemanticModel {
            name: name.to_string(),
            description: None,
            tables,
            relationships,
        }
    }

    async fn column(&self, schema: &TableSchema, info: &ColumnInfo) -> Column {
        let description = match self.llm {
            Some(llm) => Some(
                llm.generate_description(&column_context(schema, info), COLUMN_DESCRIPTION_PROMPT)
                    .await,
            ),
            None => None,
        };
        Column {
            name: info.name.clone(),
            description,
            expr: info.name.clone(),
            data_type: info.data_type.clone(),
            sample_values: info.sample_values.clone(),
        }
    }
}

/// The table name, qualified with its schema and then its database when
/// another table already took it. A numeric suffix settles what is left.
fn logical_name(schema: &TableSchema, used: &mut HashSet<String>) -> String {
    let table = &schema.table;
    let qualified = format!("{}_{}_{}", table.database, table.schema, table.table);
    let candidates = [
        table.table.clone(),
        format!("{}_{}", table.schema, table.table),
        qualified.clone(),
    ];

    let name = match candidates.into_iter().find(|c| !used.contains(c)) {
        Some(name) => name,
        None => {
            let mut n = 2;
            while used.contains(&format!("{}_{}", qualified, n)) {
                n += 1;
            }
            format!("{}_{}", qualified, n)
        }
    };
    used.insert(name.clone());
    name
}

/// A join skeleton between the first two tables, left for the user to complete.
fn placeholder_relationship(tables: &[Table]) -> Option<Relationship> {
    let [left, right, ..] = tables else {
        return None;
    };
    Some(Relationship {
        name: format!("{}_to_{}", left.name, right.name),
        left_table: left.name.clone(),
        right_table: right.name.clone(),
        relationship_columns: Vec::new(),
        join_type: "left_outer".to_string(),
        relationship_type: "many_to_one".to_string(),
    })
}
