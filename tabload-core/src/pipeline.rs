//! One dataset's full run: extract, transform, ensure table, load.

use std::path::PathBuf;

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::PipelineError;
use crate::extract::Extractor;
use crate::loader::{BatchLoader, LoadReport};
use crate::schema::{SchemaOutcome, TableSchema, ensure_table};
use crate::store::Store;
use crate::transform::Transformer;

/// Everything a run did, for the caller to report.
#[derive(Debug)]
pub struct RunReport {
    pub dataset: Dataset,
    pub table: String,
    pub staged_path: PathBuf,
    pub schema: SchemaOutcome,
    pub load: LoadReport,
}

/// Run the whole pipeline for `dataset` against `store`.
///
/// `table` overrides the dataset's default table name. Extraction and
/// transformation errors abort the run; schema and batch failures are
/// carried in the report.
pub fn run_dataset(
    dataset: Dataset,
    extractor: &dyn Extractor,
    store: &dyn Store,
    config: &PipelineConfig,
    table: Option<&str>,
) -> Result<RunReport, PipelineError> {
    config.validate()?;
    let table = table.unwrap_or(dataset.default_table());
    let schema = TableSchema::for_dataset(dataset, table)?;
    let loader = BatchLoader::new(store, &config.data_dir, config.batch_size)?;

    let raw_path = extractor.extract()?;
    tracing::info!(dataset = dataset.name(), path = %raw_path.display(), "Raw data ready");

    let staged_path = Transformer::new(config.staged_dir()).transform(dataset, &raw_path)?;
    let schema = ensure_table(store, &schema);
    // The staged path is relative to the working directory, not to data_dir.
    let load = loader.load(&std::path::absolute(&staged_path)?, table)?;

    Ok(RunReport {
        dataset,
        table: table.to_string(),
        staged_path,
        schema,
        load,
    })
}
