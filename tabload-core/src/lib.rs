//! # tabload-core: transform and batch-load pipeline
//!
//! Cleans two fixed tabular datasets (the `iris` flower measurements and the
//! `titanic` passenger manifest), derives features, writes a staged CSV, and
//! loads the staged rows into a PostgREST-style store in fixed-size batches.
//!
//! ## Stages
//!
//! 1. **Extract**: an [`extract::Extractor`] yields the path of a raw CSV.
//! 2. **Transform**: [`transform::Transformer`] imputes, derives and stages.
//! 3. **Ensure schema**: [`schema::ensure_table`] issues `CREATE TABLE IF NOT EXISTS`.
//! 4. **Load**: [`loader::BatchLoader`] inserts the staged rows batch by batch.
//!
//! Everything runs synchronously on the calling thread.

pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod loader;
pub mod persistence;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod transform;

// Re-exports
pub use config::{PipelineConfig, StoreConfig, StoreCredentials, load_config};
pub use data::{DataTable, Value};
pub use dataset::Dataset;
pub use error::{PipelineError, StoreError};
pub use extract::{Extractor, FileExtractor, HttpExtractor};
pub use loader::{Batch, BatchLoader, BatchOutcome, LoadReport, LoadSummary};
pub use pipeline::{RunReport, run_dataset};
pub use schema::{SchemaOutcome, TableSchema, ensure_table};
pub use store::{Record, Store, rest::RestStore};
pub use transform::{TransformPipeline, TransformStep, Transformer};
