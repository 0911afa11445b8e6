// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! AI Files: a local AI downloads organizer
//!
//! Classifies new downloads with a local Ollama model and files them into a
//! category-structured library.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use aifiles::config::AppConfig;
use aifiles::ollama::{InferenceBackend, OllamaClient};
use aifiles::{Organizer, Report, Result};

/// AI Files CLI - local AI downloads organizer
#[derive(Parser, Debug)]
#[command(name = "aifiles")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Local AI-powered downloads organizer", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "aifiles.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for the run report
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Directory to organize (overrides config)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Ollama model to classify with (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Name of the AI Library folder (overrides config)
    #[arg(long)]
    library: Option<String>,

    /// Name of the Manual Library folder (overrides config)
    #[arg(long)]
    manual_library: Option<String>,

    /// Classify and show the planned moves without moving anything
    #[arg(long)]
    dry_run: bool,

    /// Keep watching the directory until interrupted
    #[arg(long)]
    monitor: bool,

    /// Handle at most this many files
    #[arg(long)]
    max_files: Option<usize>,

    /// Print the run report when done
    #[arg(long)]
    report: bool,

    /// Skip the Ollama health check on startup
    #[arg(long)]
    skip_health_check: bool,

    /// In monitor mode, also organize files present at startup
    #[arg(long)]
    process_existing: bool,
}

impl RunArgs {
    /// Command-line values win over the config file
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.path {
            config.watch_dir = path.clone();
        }
        if let Some(model) = &self.model {
            config.ai_engine.model = model.clone();
        }
        if let Some(library) = &self.library {
            config.library.ai_library = library.clone();
        }
        if let Some(manual) = &self.manual_library {
            config.library.manual_library = manual.clone();
        }
        if self.process_existing {
            config.monitor.process_existing = true;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show AI engine status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "aifiles.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = AppConfig::load(&cli.config)?;
    cli.run.apply(&mut config);

    match cli.command {
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action),
        None => run(config, &cli.run, &cli.format, cli.quiet).await,
    }
}

/// Organize the watched directory once, or keep monitoring it
async fn run(config: AppConfig, args: &RunArgs, format: &str, quiet: bool) -> Result<()> {
    config.validate()?;

    if !quiet {
        info!("AI Files v{} organizing {:?}", env!("CARGO_PKG_VERSION"), config.watch_dir);
    }
    if args.dry_run {
        warn!("DRY RUN MODE - nothing will be moved");
    }

    let client = Arc::new(OllamaClient::new(&config.ai_engine)?);
    if args.skip_health_check {
        warn!("Skipping Ollama health check");
    } else {
        check_engine(&client).await;
    }

    let backend: Arc<dyn InferenceBackend> = client;
    let mut organizer = Organizer::new(config, backend)?.with_dry_run(args.dry_run);

    let report = if args.monitor {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        spawn_signal_handler(shutdown_tx);

        info!("Monitor active. Press Ctrl+C to stop.");
        organizer.run_monitor(shutdown_rx, args.max_files).await?
    } else {
        organizer.organize_once(args.max_files).await?
    };

    if args.report || args.dry_run {
        print_report(&report, format)?;
    } else if !quiet {
        info!(
            "Done: {} moves, {} skipped, {} errors",
            report.moves(),
            report.skipped.len(),
            report.errors.len()
        );
    }
    if report.has_errors() {
        warn!("Some entries could not be organized; run with --report for details");
    }

    Ok(())
}

/// Failures here are warnings: files are still organized by extension
async fn check_engine(client: &OllamaClient) {
    info!("Checking Ollama availability...");
    if let Err(e) = client.health_check().await {
        warn!("{}. Files will be classified by extension until it is reachable", e);
        return;
    }
    info!("Ollama is running");

    match client.model_available().await {
        Ok(true) => info!("Model '{}' available", client.model()),
        Ok(false) => warn!("Model '{}' not found. Try: ollama pull {}", client.model(), client.model()),
        Err(e) => warn!("Could not list models: {}", e),
    }
}

/// Ctrl+C or SIGTERM flips the shutdown channel
fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }

        let _ = shutdown_tx.send(true);
    });
}

fn print_report(report: &Report, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        _ => println!("{}", report),
    }
    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    let client = OllamaClient::new(&config.ai_engine)?;

    println!("AI Files v{} Status", env!("CARGO_PKG_VERSION"));
    println!("====================");

    match client.health_check().await {
        Ok(()) => println!("Ollama ({}): Running", client.base_url()),
        Err(e) => println!("Ollama ({}): Error - {}", client.base_url(), e),
    }

    match client.list_models().await {
        Ok(models) => {
            println!("\nInstalled models:");
            for m in &models {
                let marker = if m == client.model() { "*" } else { " " };
                println!("  {} {}", marker, m);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    println!("\nConfiguration:");
    println!("  Watch directory: {:?}", config.watch_dir);
    println!("  AI Library: {}", config.library.ai_library);
    println!("  Manual Library: {}", config.library.manual_library);
    println!("  Model: {}", config.ai_engine.model);
    println!("  Timeout: {}s", config.ai_engine.timeout_secs);
    println!("  Cache entries: {}", config.cache.max_entries);
    println!("  Poll interval: {}ms", config.monitor.poll_interval_ms);

    Ok(())
}
