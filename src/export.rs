use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::orchestrator::{CollectionReport, SourceOutcome};

/// Section name used for the union of all sources
pub const COMBINED_SECTION: &str = "combined";

/// CSV layout: one `section,subdomain` row per name, one section per source
/// that found something, then the combined section.
pub fn export_csv(report: &CollectionReport, output_path: &Path) -> Result<()> {
    debug!("Exporting {} subdomains to CSV: {}", report.combined.len(), output_path.display());

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(["section", "subdomain"])?;

    for (kind, subdomains) in report.per_source() {
        for subdomain in subdomains {
            wtr.write_record([kind.as_str(), subdomain.as_str()])?;
        }
    }
    for subdomain in &report.combined {
        wtr.write_record([COMBINED_SECTION, subdomain.as_str()])?;
    }

    wtr.flush()?;
    info!("Exported {} subdomains to CSV: {}", report.combined.len(), output_path.display());

    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonExport<'a> {
    target: &'a str,
    generated_at: String,
    summary: ExportSummary,
    sources: BTreeMap<&'static str, Vec<&'a str>>,
    combined: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ExportSummary {
    total_unique: usize,
    per_source: BTreeMap<&'static str, usize>,
    failed: Vec<&'static str>,
    cancelled: Vec<&'static str>,
}

pub fn export_json(report: &CollectionReport, output_path: &Path) -> Result<()> {
    debug!("Exporting {} subdomains to JSON: {}", report.combined.len(), output_path.display());

    let sources: BTreeMap<&'static str, Vec<&str>> = report
        .per_source()
        .map(|(kind, set)| (kind.as_str(), set.iter().map(String::as_str).collect()))
        .collect();

    let json_output = JsonExport {
        target: &report.target,
        generated_at: Local::now().to_rfc3339(),
        summary: ExportSummary {
            total_unique: report.combined.len(),
            per_source: report
                .outcomes
                .iter()
                .map(|(kind, outcome)| (kind.as_str(), outcome.count()))
                .collect(),
            failed: report.failed().map(|(kind, _)| kind.as_str()).collect(),
            cancelled: report.cancelled().map(|kind| kind.as_str()).collect(),
        },
        sources,
        combined: report.combined.iter().map(String::as_str).collect(),
    };

    let json_string = serde_json::to_string_pretty(&json_output)?;

    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    file.write_all(json_string.as_bytes())?;

    info!("Exported {} subdomains to JSON: {}", report.combined.len(), output_path.display());

    Ok(())
}

pub fn print_run_summary(report: &CollectionReport) {
    println!("\n=== Subdomain collection: {} ===", report.target);
    for (kind, outcome) in &report.outcomes {
        let status = match outcome {
            SourceOutcome::Found(set) => format!("{} subdomains", set.len()),
            SourceOutcome::Failed(reason) => format!("failed ({})", reason),
            SourceOutcome::Cancelled => "cancelled".to_string(),
        };
        println!("  {:<15} {}", kind.as_str(), status);
    }
    if report.is_empty() {
        println!("No subdomains found.");
    } else {
        println!("Total unique subdomains: {}", report.combined.len());
    }
}
