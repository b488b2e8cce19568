//! Imputation and feature derivation.
//!
//! A dataset's cleaning rules are a [`TransformPipeline`]: an ordered list of
//! [`TransformStep`]s applied to the whole in-memory table. [`Transformer`]
//! wraps a pipeline with reading the raw file and writing the staged one.

use std::path::{Path, PathBuf};

use crate::data::stats::{median, mode};
use crate::data::{DataTable, Value, read_csv, write_csv};
use crate::dataset::Dataset;
use crate::error::PipelineError;

/// A transformation step.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformStep {
    /// Replace nulls with the median of the column's observed values.
    FillMedian {
        columns: Vec<String>,
        /// Skip absent columns instead of failing.
        optional: bool,
    },
    /// Replace nulls with the column's most frequent value.
    FillMode {
        columns: Vec<String>,
        optional: bool,
    },
    /// `output = numerator / denominator`, row-wise. Zero denominators yield `inf`/`NaN`.
    Ratio {
        numerator: String,
        denominator: String,
        output: String,
    },
    /// `output = 1` where `column` exceeds the table-wide median of `column`.
    AboveMedian { column: String, output: String },
    /// `output = 1` where `column >= threshold`.
    AtLeast {
        column: String,
        threshold: f64,
        output: String,
    },
    /// `output = numerator / (sum(members) + 1)`, null when `numerator` is null.
    PerMember {
        numerator: String,
        members: Vec<String>,
        output: String,
    },
    /// Rewrite boolean-like columns in place as integer `1`/`0` flags.
    TruthyFlag {
        columns: Vec<String>,
        optional: bool,
    },
}

/// A pipeline of transformation steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformPipeline {
    pub steps: Vec<TransformStep>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step(mut self, step: TransformStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Apply every step in order. `source` only labels errors.
    pub fn apply(&self, table: &mut DataTable, source: &Path) -> Result<(), PipelineError> {
        for step in &self.steps {
            apply_step(table, step, source)?;
        }
        Ok(())
    }
}

fn apply_step(
    table: &mut DataTable,
    step: &TransformStep,
    source: &Path,
) -> Result<(), PipelineError> {
    match step {
        TransformStep::FillMedian { columns, optional } => {
            for column in columns {
                let Some(idx) = lookup(table, column, *optional, source)? else {
                    continue;
                };
                let observed = numeric_column(table, idx, column, source)?;
                let present: Vec<f64> = observed.iter().flatten().copied().collect();
                match median(&present) {
                    Some(med) => {
                        let filled = fill_nulls(table, idx, &Value::Float(med));
                        tracing::debug!(column = %column, median = med, filled, "Median imputation");
                    }
                    None => {
                        tracing::warn!(column = %column, "No observed values; nulls left in place")
                    }
                }
            }
            Ok(())
        }
        TransformStep::FillMode { columns, optional } => {
            for column in columns {
                let Some(idx) = lookup(table, column, *optional, source)? else {
                    continue;
                };
                match mode(table.column(idx)) {
                    Some(most_common) => {
                        let filled = fill_nulls(table, idx, &most_common);
                        tracing::debug!(column = %column, value = ?most_common, filled, "Mode imputation");
                    }
                    None => {
                        tracing::warn!(column = %column, "No observed values; nulls left in place")
                    }
                }
            }
            Ok(())
        }
        TransformStep::Ratio {
            numerator,
            denominator,
            output,
        } => {
            let num = required_numeric(table, numerator, source)?;
            let den = required_numeric(table, denominator, source)?;
            let values = num
                .iter()
                .zip(&den)
                .map(|(n, d)| match (n, d) {
                    (Some(n), Some(d)) => Value::Float(n / d),
                    _ => Value::Null,
                })
                .collect();
            table.set_column(output, values);
            Ok(())
        }
        TransformStep::AboveMedian { column, output } => {
            let values = required_numeric(table, column, source)?;
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            let threshold = median(&present);
            let flags = values
                .iter()
                .map(|v| match (v, threshold) {
                    (Some(x), Some(med)) if *x > med => Value::Int(1),
                    _ => Value::Int(0),
                })
                .collect();
            table.set_column(output, flags);
            Ok(())
        }
        TransformStep::AtLeast {
            column,
            threshold,
            output,
        } => {
            let values = required_numeric(table, column, source)?;
            let flags = values
                .iter()
                .map(|v| match v {
                    Some(x) if *x >= *threshold => Value::Int(1),
                    _ => Value::Int(0),
                })
                .collect();
            table.set_column(output, flags);
            Ok(())
        }
        TransformStep::PerMember {
            numerator,
            members,
            output,
        } => {
            let num = required_numeric(table, numerator, source)?;
            let member_columns = members
                .iter()
                .map(|m| required_numeric(table, m, source))
                .collect::<Result<Vec<_>, _>>()?;
            let values = num
                .iter()
                .enumerate()
                .map(|(row, n)| {
                    let Some(n) = n else {
                        return Value::Null;
                    };
                    let group: Option<f64> = member_columns.iter().map(|col| col[row]).sum();
                    match group {
                        Some(size) => Value::Float(n / (size + 1.0)),
                        None => Value::Null,
                    }
                })
                .collect();
            table.set_column(output, values);
            Ok(())
        }
        TransformStep::TruthyFlag { columns, optional } => {
            for column in columns {
                let Some(idx) = lookup(table, column, *optional, source)? else {
                    continue;
                };
                for row in &mut table.rows {
                    row[idx] = Value::Int(row[idx].truthy_flag());
                }
            }
            Ok(())
        }
    }
}

/// Column index, `None` for an absent optional column.
fn lookup(
    table: &DataTable,
    column: &str,
    optional: bool,
    source: &Path,
) -> Result<Option<usize>, PipelineError> {
    match table.column_index(column) {
        Some(idx) => Ok(Some(idx)),
        None if optional => Ok(None),
        None => Err(PipelineError::malformed(
            source,
            format!("missing required column '{column}'"),
        )),
    }
}

fn required_numeric(
    table: &DataTable,
    column: &str,
    source: &Path,
) -> Result<Vec<Option<f64>>, PipelineError> {
    let idx = table.column_index(column).ok_or_else(|| {
        PipelineError::malformed(source, format!("missing required column '{column}'"))
    })?;
    numeric_column(table, idx, column, source)
}

/// Numeric view of a column; text cells are a malformed-input error.
fn numeric_column(
    table: &DataTable,
    idx: usize,
    column: &str,
    source: &Path,
) -> Result<Vec<Option<f64>>, PipelineError> {
    table
        .column(idx)
        .enumerate()
        .map(|(row, value)| match value {
            Value::Null => Ok(None),
            Value::Text(text) => Err(PipelineError::malformed(
                source,
                format!("column '{column}' row {}: expected a number, found '{text}'", row + 1),
            )),
            other => Ok(other.as_f64()),
        })
        .collect()
}

fn fill_nulls(table: &mut DataTable, idx: usize, fill: &Value) -> usize {
    let mut filled = 0;
    for row in &mut table.rows {
        if row[idx].is_null() {
            row[idx] = fill.clone();
            filled += 1;
        }
    }
    filled
}

/// Turns a raw file into the staged file for one dataset.
#[derive(Debug, Clone)]
pub struct Transformer {
    staged_dir: PathBuf,
}

impl Transformer {
    pub fn new(staged_dir: impl Into<PathBuf>) -> Self {
        Self {
            staged_dir: staged_dir.into(),
        }
    }

    /// Fixed staged-file location for `dataset`.
    pub fn staged_path(&self, dataset: Dataset) -> PathBuf {
        self.staged_dir.join(dataset.staged_file_name())
    }

    /// Apply the dataset's cleaning rules to an already loaded table.
    pub fn transform_table(
        &self,
        dataset: Dataset,
        table: &mut DataTable,
        source: &Path,
    ) -> Result<(), PipelineError> {
        let missing = table.missing_columns(dataset.required_columns());
        if !missing.is_empty() {
            return Err(PipelineError::malformed(
                source,
                format!("missing required columns: {}", missing.join(", ")),
            ));
        }
        dataset.pipeline().apply(table, source)
    }

    /// Read `raw_path`, clean it, write the staged file and return its path.
    pub fn transform(&self, dataset: Dataset, raw_path: &Path) -> Result<PathBuf, PipelineError> {
        let mut table = read_csv(raw_path)?;
        self.transform_table(dataset, &mut table, raw_path)?;

        let staged_path = self.staged_path(dataset);
        write_csv(&staged_path, &table)?;
        tracing::info!(
            dataset = dataset.name(),
            rows = table.row_count(),
            columns = table.column_count(),
            path = %staged_path.display(),
            "Staged transformed data"
        );
        Ok(staged_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn source() -> &'static Path {
        Path::new("test.csv")
    }

    #[test]
    fn test_fill_median_uses_observed_values() {
        let mut table = DataTable::with_rows(
            cols(&["x"]),
            vec![
                vec![Value::Float(1.0)],
                vec![Value::Null],
                vec![Value::Float(3.0)],
                vec![Value::Float(10.0)],
            ],
        );
        let pipeline = TransformPipeline::new().add_step(TransformStep::FillMedian {
            columns: cols(&["x"]),
            optional: false,
        });
        pipeline.apply(&mut table, source()).unwrap();
        assert_eq!(table.rows[1][0], Value::Float(3.0));
    }

    #[test]
    fn test_fill_median_missing_required_column() {
        let mut table = DataTable::new(cols(&["y"]));
        let pipeline = TransformPipeline::new().add_step(TransformStep::FillMedian {
            columns: cols(&["x"]),
            optional: false,
        });
        let err = pipeline.apply(&mut table, source()).unwrap_err();
        assert!(matches!(err, PipelineError::Malformed { .. }));
    }

    #[test]
    fn test_fill_mode_optional_column_skipped() {
        let mut table = DataTable::with_rows(
            cols(&["port"]),
            vec![
                vec![Value::Text("S".into())],
                vec![Value::Null],
                vec![Value::Text("S".into())],
                vec![Value::Text("C".into())],
            ],
        );
        let pipeline = TransformPipeline::new().add_step(TransformStep::FillMode {
            columns: cols(&["port", "deck"]),
            optional: true,
        });
        pipeline.apply(&mut table, source()).unwrap();
        assert_eq!(table.rows[1][0], Value::Text("S".into()));
        assert!(!table.has_column("deck"));
    }

    #[test]
    fn test_numeric_step_rejects_text() {
        let mut table = DataTable::with_rows(
            cols(&["age"]),
            vec![vec![Value::Int(3)], vec![Value::Text("old".into())]],
        );
        let pipeline = TransformPipeline::new().add_step(TransformStep::FillMedian {
            columns: cols(&["age"]),
            optional: false,
        });
        let err = pipeline.apply(&mut table, source()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_derivation_missing_input_is_malformed() {
        // "b" is absent; column 0 must not be read in its place.
        let mut table = DataTable::with_rows(cols(&["a"]), vec![vec![Value::Float(2.0)]]);
        let pipeline = TransformPipeline::new().add_step(TransformStep::Ratio {
            numerator: "a".into(),
            denominator: "b".into(),
            output: "a_b".into(),
        });
        let err = pipeline.apply(&mut table, source()).unwrap_err();
        assert!(err.to_string().contains("missing required column 'b'"));
        assert!(!table.has_column("a_b"));
    }

    #[test]
    fn test_ratio_zero_denominator_is_infinite() {
        let mut table = DataTable::with_rows(
            cols(&["a", "b"]),
            vec![
                vec![Value::Float(3.0), Value::Float(2.0)],
                vec![Value::Float(1.0), Value::Float(0.0)],
            ],
        );
        let pipeline = TransformPipeline::new().add_step(TransformStep::Ratio {
            numerator: "a".into(),
            denominator: "b".into(),
            output: "a_b".into(),
        });
        pipeline.apply(&mut table, source()).unwrap();
        assert_eq!(table.rows[0][2], Value::Float(1.5));
        assert_eq!(table.rows[1][2], Value::Float(f64::INFINITY));
    }

    #[test]
    fn test_above_median_is_strict() {
        let mut table = DataTable::with_rows(
            cols(&["len"]),
            vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
        );
        let pipeline = TransformPipeline::new().add_step(TransformStep::AboveMedian {
            column: "len".into(),
            output: "long".into(),
        });
        pipeline.apply(&mut table, source()).unwrap();
        let flags: Vec<_> = table.column(1).cloned().collect();
        assert_eq!(flags, vec![Value::Int(0), Value::Int(0), Value::Int(1)]);
    }

    #[test]
    fn test_per_member_null_numerator() {
        let mut table = DataTable::with_rows(
            cols(&["fare", "sibsp", "parch"]),
            vec![
                vec![Value::Float(30.0), Value::Int(1), Value::Int(1)],
                vec![Value::Null, Value::Int(0), Value::Int(0)],
            ],
        );
        let pipeline = TransformPipeline::new().add_step(TransformStep::PerMember {
            numerator: "fare".into(),
            members: cols(&["sibsp", "parch"]),
            output: "fare_per_person".into(),
        });
        pipeline.apply(&mut table, source()).unwrap();
        assert_eq!(table.rows[0][3], Value::Float(10.0));
        assert_eq!(table.rows[1][3], Value::Null);
    }

    #[test]
    fn test_truthy_flag_in_place() {
        let mut table = DataTable::with_rows(
            cols(&["alone", "other"]),
            vec![
                vec![Value::Text("True".into()), Value::Int(5)],
                vec![Value::Text("False".into()), Value::Int(6)],
                vec![Value::Null, Value::Int(7)],
            ],
        );
        let pipeline = TransformPipeline::new().add_step(TransformStep::TruthyFlag {
            columns: cols(&["alone", "adult_male"]),
            optional: true,
        });
        pipeline.apply(&mut table, source()).unwrap();
        let flags: Vec<_> = table.column(0).cloned().collect();
        assert_eq!(flags, vec![Value::Int(1), Value::Int(0), Value::Int(0)]);
        assert_eq!(table.columns, cols(&["alone", "other"]));
    }
}
