//! Remote table definitions and the idempotent "create if absent" step.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{PipelineError, StoreError};
use crate::store::Store;

/// Column data type in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INT",
            ColumnType::Float => "FLOAT",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
}

/// A named remote relation. The `BIGSERIAL` `id` key is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Schema of `dataset` under the given table name.
    pub fn for_dataset(dataset: Dataset, table: &str) -> Result<Self, PipelineError> {
        validate_identifier(table)?;
        let columns = dataset
            .remote_columns()
            .iter()
            .map(|(name, dtype)| ColumnSchema {
                name: name.to_string(),
                dtype: *dtype,
            })
            .collect();
        Ok(Self {
            name: table.to_string(),
            columns,
        })
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this schema.
    pub fn create_statement(&self) -> String {
        let mut lines = vec!["    id BIGSERIAL PRIMARY KEY".to_string()];
        lines.extend(
            self.columns
                .iter()
                .map(|c| format!("    {} {}", c.name, c.dtype.sql())),
        );
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.name,
            lines.join(",\n")
        )
    }
}

/// Table names are interpolated into DDL, so only plain identifiers are accepted.
fn validate_identifier(name: &str) -> Result<(), PipelineError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 63;
    if valid {
        Ok(())
    } else {
        Err(PipelineError::config(format!(
            "invalid table name '{name}': use letters, digits and underscores"
        )))
    }
}

/// Result of asking the store to create a table.
#[derive(Debug)]
pub enum SchemaOutcome {
    /// The statement was accepted; the table exists.
    Ensured,
    /// The SQL capability failed. The run continues; loading reports any
    /// real absence of the table.
    Skipped { error: StoreError },
}

impl SchemaOutcome {
    pub fn is_ensured(&self) -> bool {
        matches!(self, SchemaOutcome::Ensured)
    }
}

/// Issue the schema's `CREATE TABLE IF NOT EXISTS` through the store.
///
/// Never fails: a store error is logged and returned as [`SchemaOutcome::Skipped`].
pub fn ensure_table(store: &dyn Store, schema: &TableSchema) -> SchemaOutcome {
    match store.execute_sql(&schema.create_statement()) {
        Ok(()) => {
            tracing::info!(table = %schema.name, "Table ensured to exist");
            SchemaOutcome::Ensured
        }
        Err(error) => {
            tracing::error!(
                table = %schema.name,
                error = %error,
                "Table was not created; check the SQL function's permissions"
            );
            SchemaOutcome::Skipped { error }
        }
    }
}
