//! tabload CLI: transform and load the iris and titanic datasets.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tabload_core::Dataset;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Clean tabular datasets and bulk-load them into a PostgREST store
#[derive(Parser, Debug)]
#[command(name = "tabload", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./tabload.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Clean a raw file and write the staged file
    Transform {
        /// Dataset name (iris, titanic)
        dataset: Dataset,
        /// Raw CSV path (defaults to <data_dir>/raw/<dataset>.csv)
        #[arg(long)]
        raw: Option<PathBuf>,
    },
    /// Insert a staged file into the remote table in batches
    Load {
        dataset: Dataset,
        /// Staged CSV path; relative paths are resolved against data_dir
        #[arg(long)]
        staged: Option<PathBuf>,
        /// Target table (defaults to <dataset>_data)
        #[arg(long)]
        table: Option<String>,
    },
    /// Print the CREATE TABLE statement, or run it with --apply
    Schema {
        dataset: Dataset,
        #[arg(long)]
        table: Option<String>,
        /// Execute the statement against the store
        #[arg(long)]
        apply: bool,
    },
    /// Extract, transform, ensure the table and load
    Run {
        /// Dataset to run; both when omitted
        dataset: Option<Dataset>,
        /// Use a local raw file instead of downloading
        #[arg(long, requires = "dataset")]
        raw: Option<PathBuf>,
        #[arg(long, requires = "dataset")]
        table: Option<String>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "tabload", "tabload")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "tabload.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, cli.config.as_deref())
}
