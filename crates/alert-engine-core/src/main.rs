//! Alert Engine CLI
//!
//! Command-line interface for the alert execution engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use alert_engine::alerting::{CancellationToken, Engine};
use alert_engine::config::LogFormat;
use alert_engine::models::AlertDefinition;
use alert_engine::transport::{AlertBackend, HttpBackend};
use alert_engine::Config;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

/// Alert Engine - threshold alerting over a metrics backend
#[derive(Parser)]
#[command(name = "alert-engine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "ALERT_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every alert until all supervisors stop or Ctrl+C
    Run,

    /// Inspect alert definitions
    Alerts {
        #[command(subcommand)]
        command: AlertsCommands,
    },
}

#[derive(Subcommand)]
enum AlertsCommands {
    /// List all alert definitions
    List,

    /// Show the severity a value would evaluate to
    Check {
        /// Alert name
        name: String,

        /// Metric value to evaluate
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let result = match cli.command {
        Commands::Run => run_engine(config).await,
        Commands::Alerts { command } => run_alerts(config, command, cli.format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn backend(config: &Config) -> anyhow::Result<Arc<HttpBackend>> {
    let backend = HttpBackend::new(&config.backend, config.retry.clone())
        .context("cannot create backend client")?;
    Ok(Arc::new(backend))
}

async fn run_engine(config: Config) -> anyhow::Result<()> {
    info!(backend = %config.backend.base_url, "Starting alert engine");

    let engine = Engine::new(backend(&config)?);
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down...");
            signal.request_cancellation();
        }
    });

    let report = engine
        .run(shutdown)
        .await
        .context("alert engine failed to start")?;

    let failed = report
        .exits
        .iter()
        .filter(|(_, exit)| exit.is_failed())
        .count();
    info!(
        supervisors = report.exits.len(),
        failed,
        skipped = report.skipped.len(),
        "Alert engine stopped"
    );
    Ok(())
}

async fn run_alerts(
    config: Config,
    command: AlertsCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let alerts = backend(&config)?
        .fetch_alert_definitions()
        .await
        .context("cannot fetch alert definitions")?;

    match command {
        AlertsCommands::List => print_alerts(&alerts, format)?,
        AlertsCommands::Check { name, value } => {
            let alert = alerts
                .iter()
                .find(|alert| alert.name.as_str() == name)
                .with_context(|| format!("no alert named '{name}'"))?;
            let severity = alert.thresholds.evaluate(value);
            match format {
                OutputFormat::Text => println!("{}: {value} -> {severity}", alert.name),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "alert": alert.name,
                        "value": value,
                        "severity": severity.label(),
                        "message": severity.message(),
                    })
                ),
            }
        }
    }
    Ok(())
}

fn print_alerts(alerts: &[AlertDefinition], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(alerts)?),
        OutputFormat::Text => {
            for alert in alerts {
                println!(
                    "{:<24} query={:<24} every={:?} repeat={:?} warn>={} critical>={}",
                    alert.name.as_str(),
                    alert.query.as_str(),
                    alert.poll_interval,
                    alert.repeat_interval,
                    alert.thresholds.warn.value,
                    alert.thresholds.critical.value,
                );
            }
        }
    }
    Ok(())
}
