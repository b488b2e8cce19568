//! Cell values and the in-memory table.

use std::cmp::Ordering;

/// Field contents read as missing, in addition to the empty string.
pub const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
];

/// A single cell.
///
/// Floats may be non-finite: ratios over zero denominators are kept as
/// `inf`/`NaN` in the staged file and only nulled right before loading.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse a raw CSV field, trying integer, then float, then falling back to text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_MARKERS.contains(&trimmed) {
            return Value::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell, `None` for nulls and text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// True for `inf`, `-inf` and `NaN` cells.
    pub fn is_non_finite(&self) -> bool {
        matches!(self, Value::Float(f) if !f.is_finite())
    }

    /// CSV field representation. `NaN` is written as an empty field.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_nan() => String::new(),
            Value::Float(f) => format!("{f:?}"),
            Value::Text(s) => s.clone(),
        }
    }

    /// JSON representation sent to the store. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Map a boolean-like cell to `1`/`0`.
    ///
    /// The cell's text form is lowercased: `"true"` and `"1"` give 1, everything
    /// else (including `"false"`, `"0"`, `"1.0"` and nulls) gives 0.
    pub fn truthy_flag(&self) -> i64 {
        let text = match self {
            Value::Null => return 0,
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Text(s) => s.to_lowercase(),
        };
        match text.as_str() {
            "true" | "1" => 1,
            _ => 0,
        }
    }

    /// Total order used for tie-breaking: nulls, then numbers, then text.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.total_cmp(&b);
        }
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
        }
    }
}

/// A fully materialized table: ordered column names and row-major cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Names from `required` that the table lacks, in the order given.
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.has_column(name))
            .collect()
    }

    /// Cells of column `idx`, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }

    /// Number of null cells in the named column.
    pub fn null_count(&self, name: &str) -> Option<usize> {
        let idx = self.column_index(name)?;
        Some(self.column(idx).filter(|v| v.is_null()).count())
    }

    /// Replace the named column, or append it when absent.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }
}
