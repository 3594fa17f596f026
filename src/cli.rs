use clap::Parser;
use std::path::PathBuf;

use crate::config::{AppConfig, OutputFormat};
use crate::discovery::SourceKind;

#[derive(Parser, Debug)]
#[command(name = "subsweep")]
#[command(about = "Collects subdomains of a target from local tools, certificate logs and search APIs")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/subsweep.toml (or --config)
    #[arg(long)]
    pub init: bool,

    /// Target domain, or a file listing one domain per line
    #[arg(short, long)]
    pub target: Option<String>,

    /// Comma-separated sources to run: subfinder, crtsh, securitytrails, zoomeye, shodan
    /// (default: every source enabled in the configuration)
    #[arg(long, value_delimiter = ',')]
    pub sources: Vec<SourceKind>,

    /// Configuration file path
    #[arg(short, long, default_value = crate::config::CONFIG_PATH)]
    pub config: PathBuf,

    /// Output directory for result files (overrides config)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Output format: 'csv' or 'json' (overrides config)
    #[arg(short = 'f', long)]
    pub format: Option<OutputFormat>,

    /// Maximum collectors running at once (overrides config)
    #[arg(short = 'j', long)]
    pub max_concurrency: Option<usize>,

    /// Also write logs to this file (plain text)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if !self.init {
            match self.target.as_deref().map(str::trim) {
                None => return Err("Target is required (use --target <domain|file>)".to_string()),
                Some("") => return Err("Target cannot be empty".to_string()),
                _ => {}
            }
        }

        if let Some(jobs) = self.max_concurrency {
            if jobs == 0 {
                return Err("Max concurrency must be greater than 0".to_string());
            }
            if jobs > 16 {
                return Err("Max concurrency cannot exceed 16".to_string());
            }
        }

        Ok(())
    }

    /// Fold command-line overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(jobs) = self.max_concurrency {
            config.limits.max_collector_tasks = jobs;
        }
    }

    /// Requested sources without duplicates, in the order given
    pub fn selected_sources(&self) -> Vec<SourceKind> {
        let mut selected = Vec::new();
        for kind in &self.sources {
            if !selected.contains(kind) {
                selected.push(*kind);
            }
        }
        selected
    }
}
