// result_sink.rs - Persistence of a finished collection run
//
// A sink writes one artifact per run: a section per source that found
// something plus the combined section. Runs that found nothing are never
// handed to a sink.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;

use crate::config::OutputFormat;
use crate::domain_utils::sanitize_filename;
use crate::export;
use crate::orchestrator::CollectionReport;

pub trait ResultSink {
    /// Write the report and return where it went.
    fn persist(&self, report: &CollectionReport) -> Result<PathBuf>;
}

/// Writes `subdomains_<target>_<YYYYmmdd_HHMMSS>.<ext>` into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    directory: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            directory: directory.into(),
            format,
        }
    }

    /// File name for a target at the current local time
    pub fn file_name(&self, target: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        format!(
            "subdomains_{}_{}.{}",
            sanitize_filename(target),
            timestamp,
            self.format.extension()
        )
    }
}

impl ResultSink for FileSink {
    fn persist(&self, report: &CollectionReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create output directory: {}", self.directory.display()))?;

        let path = self.directory.join(self.file_name(&report.target));
        match self.format {
            OutputFormat::Csv => export::export_csv(report, &path)?,
            OutputFormat::Json => export::export_json(report, &path)?,
        }
        Ok(path)
    }
}
