//! Producers of raw input files.
//!
//! An extractor yields the path of a raw CSV file. The transformer never
//! cares where the file came from.

use std::path::{Path, PathBuf};

use crate::dataset::Dataset;
use crate::error::PipelineError;
use crate::persistence::atomic_write;

/// Produces a raw file on disk.
pub trait Extractor {
    /// Make the raw file available and return its path.
    fn extract(&self) -> Result<PathBuf, PipelineError>;
}

/// A raw file that already exists locally.
#[derive(Debug, Clone)]
pub struct FileExtractor {
    path: PathBuf,
}

impl FileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Extractor for FileExtractor {
    fn extract(&self) -> Result<PathBuf, PipelineError> {
        if !self.path.is_file() {
            return Err(PipelineError::file_not_found(&self.path));
        }
        Ok(self.path.clone())
    }
}

/// Downloads a raw file over HTTP(S) into a local path.
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    url: String,
    dest: PathBuf,
}

impl HttpExtractor {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
        }
    }

    /// Download the dataset's public mirror into `raw_dir/<name>.csv`.
    pub fn for_dataset(dataset: Dataset, raw_dir: &Path) -> Self {
        Self::new(dataset.source_url(), raw_dir.join(dataset.raw_file_name()))
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    fn fail(&self, message: impl ToString) -> PipelineError {
        PipelineError::Extract {
            url: self.url.clone(),
            message: message.to_string(),
        }
    }
}

impl Extractor for HttpExtractor {
    fn extract(&self) -> Result<PathBuf, PipelineError> {
        tracing::info!(url = %self.url, "Downloading raw data");
        let response = reqwest::blocking::get(&self.url).map_err(|e| self.fail(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.fail(format!("HTTP {status}")));
        }
        let bytes = response.bytes().map_err(|e| self.fail(e))?;
        atomic_write(&self.dest, &bytes)?;
        tracing::info!(
            path = %self.dest.display(),
            bytes = bytes.len(),
            "Saved raw data"
        );
        Ok(self.dest.clone())
    }
}
