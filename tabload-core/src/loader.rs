//! Batched insertion of a staged file into a remote table.
//!
//! Rows are sent in consecutive, order-preserving batches. Every batch is
//! attempted exactly once; a rejected batch is recorded and the loader moves
//! on. Nothing is retried or rolled back.

use std::path::{Path, PathBuf};

use crate::data::{DataTable, Value, read_csv};
use crate::error::{PipelineError, StoreError};
use crate::store::{Record, Store};

/// A contiguous slice of staged rows submitted as one insertion call.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'t> {
    /// 0-based index of the first row in the staged table.
    pub start: usize,
    pub rows: &'t [Vec<Value>],
}

impl Batch<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 1-based number of the first row, as reported to users.
    pub fn first_row(&self) -> usize {
        self.start + 1
    }

    /// 1-based number of the last row.
    pub fn last_row(&self) -> usize {
        self.start + self.rows.len()
    }

    /// One record per row, keyed by column name.
    pub fn to_records(&self, columns: &[String]) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(row)
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect()
            })
            .collect()
    }
}

/// Split `rows` into consecutive batches of at most `batch_size` rows.
///
/// A zero `batch_size` yields no batches.
pub fn partition(rows: &[Vec<Value>], batch_size: usize) -> Vec<Batch<'_>> {
    if batch_size == 0 {
        return Vec::new();
    }
    rows.chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| Batch {
            start: i * batch_size,
            rows: chunk,
        })
        .collect()
}

/// Replace every non-finite cell with null. Returns the number of cells changed.
pub fn normalize_nulls(table: &mut DataTable) -> usize {
    let mut replaced = 0;
    for cell in table.rows.iter_mut().flatten() {
        if cell.is_non_finite() {
            *cell = Value::Null;
            replaced += 1;
        }
    }
    replaced
}

/// `path` itself when absolute, otherwise `base_dir/path`.
pub fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// What happened to one batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub start: usize,
    pub len: usize,
    pub error: Option<StoreError>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn first_row(&self) -> usize {
        self.start + 1
    }

    pub fn last_row(&self) -> usize {
        self.start + self.len
    }
}

/// Per-batch results of a completed load.
#[derive(Debug)]
pub struct LoadSummary {
    pub table: String,
    pub path: PathBuf,
    pub total_rows: usize,
    pub batches: Vec<BatchOutcome>,
}

impl LoadSummary {
    /// Rows in batches the store accepted.
    pub fn inserted_rows(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| b.is_success())
            .map(|b| b.len)
            .sum()
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| !b.is_success())
    }

    /// Every batch was accepted.
    pub fn is_complete(&self) -> bool {
        self.batches.iter().all(BatchOutcome::is_success)
    }
}

/// Result of [`BatchLoader::load`].
#[derive(Debug)]
pub enum LoadReport {
    /// The staged file was not there; nothing was sent.
    StagedFileMissing { path: PathBuf },
    /// Every batch was attempted.
    Completed(LoadSummary),
}

impl LoadReport {
    pub fn summary(&self) -> Option<&LoadSummary> {
        match self {
            LoadReport::Completed(summary) => Some(summary),
            LoadReport::StagedFileMissing { .. } => None,
        }
    }

    pub fn inserted_rows(&self) -> usize {
        self.summary().map_or(0, LoadSummary::inserted_rows)
    }
}

/// Sends staged files to a store, one blocking call per batch.
pub struct BatchLoader<'s> {
    store: &'s dyn Store,
    base_dir: PathBuf,
    batch_size: usize,
}

impl<'s> BatchLoader<'s> {
    /// Relative staged paths are resolved against `base_dir`.
    pub fn new(
        store: &'s dyn Store,
        base_dir: impl Into<PathBuf>,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::config("batch_size must be at least 1"));
        }
        Ok(Self {
            store,
            base_dir: base_dir.into(),
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Load `staged_path` into `table`.
    ///
    /// A missing staged file is reported as [`LoadReport::StagedFileMissing`]
    /// without touching the store. Batch failures are collected in the
    /// summary. Only an unreadable or malformed file is an `Err`.
    pub fn load(&self, staged_path: &Path, table: &str) -> Result<LoadReport, PipelineError> {
        let path = resolve_path(&self.base_dir, staged_path);
        if !path.is_file() {
            tracing::error!(
                path = %path.display(),
                "Staged file not found; run the transform step first"
            );
            return Ok(LoadReport::StagedFileMissing { path });
        }

        let mut data = read_csv(&path)?;
        let replaced = normalize_nulls(&mut data);
        if replaced > 0 {
            tracing::debug!(cells = replaced, "Replaced non-finite values with null");
        }

        let total_rows = data.row_count();
        tracing::info!(table, rows = total_rows, "Loading rows");

        let batches: Vec<BatchOutcome> = partition(&data.rows, self.batch_size)
            .into_iter()
            .map(|batch| self.insert_batch(table, &data.columns, batch))
            .collect();

        let summary = LoadSummary {
            table: table.to_string(),
            path,
            total_rows,
            batches,
        };
        tracing::info!(
            table,
            inserted = summary.inserted_rows(),
            failed_batches = summary.failed_batches().count(),
            "Data loading completed"
        );
        Ok(LoadReport::Completed(summary))
    }

    fn insert_batch(&self, table: &str, columns: &[String], batch: Batch<'_>) -> BatchOutcome {
        let records = batch.to_records(columns);
        let error = match self.store.insert(table, &records) {
            Ok(()) => {
                tracing::info!(
                    table,
                    first_row = batch.first_row(),
                    last_row = batch.last_row(),
                    "Inserted rows"
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    table,
                    first_row = batch.first_row(),
                    error = %e,
                    "Batch insertion failed"
                );
                Some(e)
            }
        };
        BatchOutcome {
            start: batch.start,
            len: batch.len(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingStore {
        sizes: RefCell<Vec<usize>>,
    }

    impl Store for CountingStore {
        fn execute_sql(&self, _query: &str) -> Result<(), StoreError> {
            Ok(())
        }

        fn insert(&self, _table: &str, records: &[Record]) -> Result<(), StoreError> {
            self.sizes.borrow_mut().push(records.len());
            Ok(())
        }
    }

    fn int_rows(n: i64) -> Vec<Vec<Value>> {
        (0..n).map(|i| vec![Value::Int(i)]).collect()
    }

    #[test]
    fn test_partition_sizes_and_offsets() {
        let rows = int_rows(7);
        let batches = partition(&rows, 3);
        let shape: Vec<(usize, usize)> = batches.iter().map(|b| (b.start, b.len())).collect();
        assert_eq!(shape, vec![(0, 3), (3, 3), (6, 1)]);
        assert_eq!(batches[1].first_row(), 4);
        assert_eq!(batches[1].last_row(), 6);
    }

    #[test]
    fn test_partition_empty_table() {
        assert!(partition(&[], 50).is_empty());
    }

    #[test]
    fn test_partition_zero_size_yields_nothing() {
        assert!(partition(&int_rows(3), 0).is_empty());
    }

    #[test]
    fn test_normalize_nulls() {
        let mut table = DataTable::with_rows(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::Float(f64::INFINITY), Value::Float(1.0)],
                vec![Value::Float(f64::NEG_INFINITY), Value::Float(f64::NAN)],
            ],
        );
        assert_eq!(normalize_nulls(&mut table), 3);
        assert_eq!(table.rows[0], vec![Value::Null, Value::Float(1.0)]);
        assert!(table.rows[1].iter().all(Value::is_null));
    }

    #[test]
    fn test_to_records_keys_by_column() {
        let columns = vec!["species".to_string(), "ratio".to_string()];
        let rows = vec![vec![Value::Text("setosa".into()), Value::Null]];
        let records = partition(&rows, 50)[0].to_records(&columns);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["species"], serde_json::json!("setosa"));
        assert_eq!(records[0]["ratio"], serde_json::Value::Null);
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/srv/data");
        assert_eq!(
            resolve_path(base, Path::new("staged/iris_transformed.csv")),
            PathBuf::from("/srv/data/staged/iris_transformed.csv")
        );
        assert_eq!(
            resolve_path(base, Path::new("/tmp/x.csv")),
            PathBuf::from("/tmp/x.csv")
        );
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let store = CountingStore::default();
        assert!(BatchLoader::new(&store, ".", 0).is_err());
    }

    #[test]
    fn test_load_relative_path() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("staged")).unwrap();
        let body: String = std::iter::once("n\n".to_string())
            .chain((0..5).map(|i| format!("{i}\n")))
            .collect();
        std::fs::write(dir.path().join("staged/t.csv"), body).unwrap();

        let store = CountingStore::default();
        let loader = BatchLoader::new(&store, dir.path(), 2).unwrap();
        let report = loader.load(Path::new("staged/t.csv"), "t").unwrap();

        assert_eq!(*store.sizes.borrow(), vec![2, 2, 1]);
        let summary = report.summary().unwrap();
        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.inserted_rows(), 5);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_load_missing_file_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let store = CountingStore::default();
        let loader = BatchLoader::new(&store, dir.path(), 50).unwrap();
        let report = loader.load(Path::new("staged/none.csv"), "t").unwrap();

        assert!(matches!(report, LoadReport::StagedFileMissing { .. }));
        assert_eq!(report.inserted_rows(), 0);
        assert!(store.sizes.borrow().is_empty());
    }
}
