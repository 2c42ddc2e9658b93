//! CLI entry point for report-export

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use report_export::api::HttpReportService;
use report_export::config::ExportConfig;
use report_export::db;
use report_export::runner::{ReportRunner, RunOutcome, RunnerOptions};

#[derive(Parser)]
#[command(name = "report-export")]
#[command(about = "Runs reports on a remote reporting service and loads the output into a database")]
#[command(version)]
struct Cli {
    /// Configuration file to load
    #[arg(long, default_value = "conf.json")]
    file: PathBuf,

    /// Seconds to allow a report file download before timing out
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Seconds to wait for a run to reach a terminal status (0 = no limit)
    #[arg(long, default_value_t = 3600)]
    poll_timeout: u64,

    /// Additional diagnostic logging
    #[arg(long)]
    debug: bool,

    /// Skip the insert/update of report records into the database
    #[arg(long)]
    skipdb: bool,
}

/// Log to stdout and to a timestamped file alongside the binary, mirroring
/// each run's output into a durable record.
fn init_tracing(debug: bool) {
    let default_filter = if debug { "report_export=debug,info" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let log_name = format!(
        "report_export_{}.log",
        chrono::Local::now().format("%Y%m%d%H%M%S")
    );
    match std::fs::File::create(&log_name) {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(std::sync::Arc::new(file)))
                .init();
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            warn!("Unable to create log file {}: {}", log_name, e);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    info!("Loading configuration from {}", cli.file.display());
    let config = ExportConfig::load(&cli.file).context("Unable to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let service = HttpReportService::new(&config.api.endpoint, &config.api.api_key, cli.timeout)
        .context("Unable to build report service client")?;

    let mut backend = if cli.skipdb {
        info!("Database work disabled; reports will be downloaded and parsed only");
        None
    } else {
        let backend = db::connect(&config.database)
            .await
            .context("Unable to connect to the target database")?;
        info!(
            driver = backend.backend_type(),
            server = %config.database.server,
            database = %config.database.database,
            "Connected to target database"
        );
        Some(backend)
    };

    let options = RunnerOptions {
        poll_timeout: Duration::from_secs(cli.poll_timeout),
        diagnostics: cli.debug,
        ..RunnerOptions::default()
    };

    // Reports run strictly in sequence; a failed run never stops the rest.
    for report in &config.reports {
        let mut runner = ReportRunner::new(
            &service,
            backend.as_deref_mut(),
            options.clone(),
        );
        match runner.run(report).await {
            RunOutcome::Succeeded(stats) => {
                info!(
                    report = %report.report_name,
                    success = stats.success,
                    failed = stats.failed,
                    rows_affected = stats.rows_affected,
                    "Report run complete"
                );
            }
            RunOutcome::Failed => {
                error!(report = %report.report_name, "Report run failed");
            }
        }
    }

    Ok(())
}
