//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use std::path::{Path, PathBuf};
use tabload_core::{
    BatchLoader, Dataset, Extractor, FileExtractor, HttpExtractor, LoadReport, PipelineConfig,
    PipelineError, RestStore, RunReport, SchemaOutcome, Store, StoreCredentials, TableSchema,
    Transformer, ensure_table, load_config, run_dataset,
};

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    match command {
        Commands::Transform { dataset, raw } => handle_transform(&config, dataset, raw),
        Commands::Load {
            dataset,
            staged,
            table,
        } => handle_load(&config, dataset, staged, table),
        Commands::Schema {
            dataset,
            table,
            apply,
        } => handle_schema(&config, dataset, table, apply),
        Commands::Run {
            dataset,
            raw,
            table,
        } => handle_run(&config, dataset, raw, table),
        Commands::Config { action } => handle_config(action, &config),
    }
}

fn handle_config(action: ConfigAction, config: &PipelineConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Open a store handle. Fails before any file or network work when a secret is missing.
fn connect(config: &PipelineConfig) -> anyhow::Result<RestStore> {
    let credentials = StoreCredentials::from_env(&config.store)?;
    Ok(RestStore::connect(credentials, &config.store)?)
}

fn table_name(dataset: Dataset, table: Option<String>) -> String {
    table.unwrap_or_else(|| dataset.default_table().to_string())
}

fn handle_transform(
    config: &PipelineConfig,
    dataset: Dataset,
    raw: Option<PathBuf>,
) -> anyhow::Result<()> {
    let raw = raw.unwrap_or_else(|| config.raw_dir().join(dataset.raw_file_name()));
    let staged = Transformer::new(config.staged_dir()).transform(dataset, &raw)?;
    println!("Staged {} data at {}", dataset, staged.display());
    Ok(())
}

fn handle_load(
    config: &PipelineConfig,
    dataset: Dataset,
    staged: Option<PathBuf>,
    table: Option<String>,
) -> anyhow::Result<()> {
    let store = connect(config)?;
    let table = table_name(dataset, table);
    // Same name rules as the DDL path.
    TableSchema::for_dataset(dataset, &table)?;

    let staged =
        staged.unwrap_or_else(|| Path::new("staged").join(dataset.staged_file_name()));
    let loader = BatchLoader::new(&store, &config.data_dir, config.batch_size)?;
    let report = loader.load(&staged, &table)?;
    print_load_report(&report);
    Ok(())
}

fn handle_schema(
    config: &PipelineConfig,
    dataset: Dataset,
    table: Option<String>,
    apply: bool,
) -> anyhow::Result<()> {
    let schema = TableSchema::for_dataset(dataset, &table_name(dataset, table))?;
    if !apply {
        println!("{}", schema.create_statement());
        return Ok(());
    }
    let store = connect(config)?;
    let outcome = ensure_table(&store, &schema);
    print_schema_outcome(&schema.name, &outcome);
    Ok(())
}

fn handle_run(
    config: &PipelineConfig,
    dataset: Option<Dataset>,
    raw: Option<PathBuf>,
    table: Option<String>,
) -> anyhow::Result<()> {
    let store = connect(config)?;
    let datasets = match dataset {
        Some(dataset) => vec![dataset],
        None => Dataset::ALL.to_vec(),
    };

    let jobs: Vec<(Dataset, Box<dyn Extractor>)> = datasets
        .into_iter()
        .map(|dataset| {
            let extractor: Box<dyn Extractor> = match &raw {
                Some(path) => Box::new(FileExtractor::new(path)),
                None => Box::new(HttpExtractor::for_dataset(dataset, &config.raw_dir())),
            };
            (dataset, extractor)
        })
        .collect();

    let failed: Vec<&str> = run_datasets(&jobs, &store, config, table.as_deref())
        .iter()
        .filter(|(_, outcome)| outcome.is_err())
        .map(|(dataset, _)| dataset.name())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("run failed for: {}", failed.join(", ")))
    }
}

/// Run each dataset in turn. A fatal error aborts only that dataset's run.
fn run_datasets(
    jobs: &[(Dataset, Box<dyn Extractor>)],
    store: &dyn Store,
    config: &PipelineConfig,
    table: Option<&str>,
) -> Vec<(Dataset, Result<RunReport, PipelineError>)> {
    jobs.iter()
        .map(|(dataset, extractor)| {
            let outcome = run_dataset(*dataset, extractor.as_ref(), store, config, table);
            match &outcome {
                Ok(report) => print_run_report(report),
                Err(e) => {
                    tracing::error!(dataset = dataset.name(), error = %e, "Run aborted");
                    println!("[{}] run aborted: {}", dataset, e);
                }
            }
            (*dataset, outcome)
        })
        .collect()
}

fn print_schema_outcome(table: &str, outcome: &SchemaOutcome) {
    match outcome {
        SchemaOutcome::Ensured => println!("Table '{}' ensured to exist.", table),
        SchemaOutcome::Skipped { error } => {
            println!("Table '{}' was not created: {}", table, error);
            println!("Check the SQL function's permissions.");
        }
    }
}

fn print_run_report(report: &RunReport) {
    println!(
        "[{}] staged {}",
        report.dataset,
        report.staged_path.display()
    );
    print_schema_outcome(&report.table, &report.schema);
    print_load_report(&report.load);
}

fn print_load_report(report: &LoadReport) {
    let summary = match report {
        LoadReport::StagedFileMissing { path } => {
            println!("Staged file not found at {}", path.display());
            println!("Run `tabload transform` first.");
            return;
        }
        LoadReport::Completed(summary) => summary,
    };

    println!(
        "Loading {} rows into '{}'...",
        summary.total_rows, summary.table
    );
    for batch in &summary.batches {
        match &batch.error {
            None => println!(
                "  inserted rows {} to {}",
                batch.first_row(),
                batch.last_row()
            ),
            Some(error) => println!(
                "  batch starting at row {} failed: {}",
                batch.first_row(),
                error
            ),
        }
    }
    let failed = summary.failed_batches().count();
    if failed == 0 {
        println!("Data loading completed: {} rows inserted.", summary.inserted_rows());
    } else {
        println!(
            "Data loading completed: {} of {} rows inserted, {} batch(es) failed.",
            summary.inserted_rows(),
            summary.total_rows,
            failed
        );
    }
}
