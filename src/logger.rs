use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 0,  // Run progress, per-source results, warnings (default)
    Detailed = 1, // Phase transitions, per-request and pagination detail
    Debug = 2,    // Everything, including dependency crates at debug
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Default filter directive when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Summary => "subsweep=info,warn",
            VerbosityLevel::Detailed => "subsweep=debug,info",
            VerbosityLevel::Debug => "subsweep=trace,debug",
        }
    }
}

/// Build the env filter: `RUST_LOG` wins when present, otherwise the
/// verbosity level decides.
pub fn build_filter(verbosity: VerbosityLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Install the global subscriber: formatted output on stderr plus an
/// optional plain-text log file.
pub fn init_tracing(verbosity: VerbosityLevel, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= VerbosityLevel::Debug);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(verbosity))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
