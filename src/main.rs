use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, IsTerminal};
use tokio::sync::watch;
use tracing::{error, info, warn};

use subsweep::api_client::ApiClient;
use subsweep::cli::Cli;
use subsweep::config::{AppConfig, ConfigError};
use subsweep::discovery::build_collectors;
use subsweep::export;
use subsweep::logger::{self, VerbosityLevel};
use subsweep::orchestrator::{shutdown_signal, Orchestrator};
use subsweep::result_sink::{FileSink, ResultSink};
use subsweep::target::Target;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config(&cli.config) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Add API keys and adjust sources, then run subsweep again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = cli.validate() {
        eprintln!("❌ Invalid arguments: {}", e);
        std::process::exit(2);
    }

    let mut app_config = match AppConfig::load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(ConfigError::FileNotFound(path)) => {
            eprintln!("❌ Configuration file not found at: {}", path.display());
            eprintln!("   Run with --init to create a default configuration file.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Command-line overrides are checked against the same bounds as the file
    cli.apply_overrides(&mut app_config);
    if let Err(e) = app_config.validate() {
        eprintln!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    logger::init_tracing(VerbosityLevel::from_verbose_count(cli.verbose), cli.log_file.as_deref())?;

    let target = match Target::resolve(cli.target.as_deref().unwrap_or_default()) {
        Ok(target) => target,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let client = ApiClient::from_config(&app_config).context("Failed to build HTTP client")?;
    let collectors = build_collectors(&app_config, &cli.selected_sources(), &client)?;
    let orchestrator = match Orchestrator::new(collectors, app_config.limits.max_collector_tasks) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    let orchestrator = orchestrator.with_progress(!cli.no_progress && io::stderr().is_terminal());

    // First Ctrl-C stops pending sources and keeps what finished; a second one exits
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        if shutdown_tx.send_replace(true) {
            eprintln!("\n⚠️  Second interrupt received. Exiting without saving.");
            std::process::exit(130);
        }
        eprintln!("\n⚠️  Interrupt received. Cancelling pending sources...");
    })
    .unwrap_or_else(|e| {
        warn!("Failed to set Ctrl-C handler: {}. Interrupts will not be handled gracefully.", e);
    });

    let sources: Vec<&str> = orchestrator.sources().iter().map(|kind| kind.as_str()).collect();
    info!("Collecting subdomains for {} using: {}", target, sources.join(", "));

    let report = orchestrator.run(&target, shutdown_signal(shutdown_rx)).await;
    export::print_run_summary(&report);

    if report.is_empty() {
        info!("Nothing to save");
        return Ok(());
    }

    let sink = FileSink::new(&app_config.output.directory, app_config.output.format);
    let path = sink.persist(&report)?;
    println!("Results saved to: {}", path.display());

    Ok(())
}
