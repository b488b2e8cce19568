//! Reading and writing comma-delimited tables with a header row.
//!
//! Uses the `csv` crate so quoted fields containing commas or newlines
//! survive a read/write cycle.

use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::data::table::{DataTable, Value};
use crate::error::PipelineError;
use crate::persistence::atomic_write;

/// Load a CSV file fully into memory, preserving column and row order.
pub fn read_csv(path: &Path) -> Result<DataTable, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::file_not_found(path));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(PipelineError::malformed(path, "no header row"));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = columns.iter().find(|c| !seen.insert(c.as_str())) {
        return Err(PipelineError::malformed(
            path,
            format!("duplicate column '{dup}'"),
        ));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::parse).collect());
    }

    tracing::debug!(
        path = %path.display(),
        columns = columns.len(),
        rows = rows.len(),
        "Loaded CSV"
    );
    Ok(DataTable::with_rows(columns, rows))
}

/// Serialize a table to CSV bytes.
pub fn to_csv_bytes(table: &DataTable) -> Result<Vec<u8>, PipelineError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Value::to_field))?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))
}

/// Write a table to `path`, replacing any previous file atomically.
pub fn write_csv(path: &Path, table: &DataTable) -> Result<(), PipelineError> {
    let bytes = to_csv_bytes(table)?;
    atomic_write(path, &bytes)?;
    Ok(())
}
