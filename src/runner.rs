//! Report run controller
//!
//! Drives exactly one report definition through submission, polling, and a
//! terminal outcome, then hands completed output to ingestion. The controller
//! never retries submission or cleanup; the poll loop is a wait-and-recheck
//! against the service's status, bounded by a configurable deadline.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::api::{ReportService, RunDetails, RunStatus};
use crate::config::ReportDefinition;
use crate::db::{DatabaseBackend, UpsertEngine};
use crate::error::{ExportError, ExportResult};
use crate::parse;
use crate::stats::RunStats;

/// Fixed delay between status polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default bound on how long a run may stay non-terminal
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Controller tuning and mode flags
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub poll_interval: Duration,
    /// Zero disables the deadline and polls until a terminal status
    pub poll_timeout: Duration,
    /// Directory downloaded report files are materialized into
    pub reports_dir: PathBuf,
    /// Log built statements and bound values per row
    pub diagnostics: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            reports_dir: PathBuf::from("reports"),
            diagnostics: false,
        }
    }
}

/// Terminal outcome of one report run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Run completed and its output was ingested
    Succeeded(RunStats),
    /// Run failed; it contributes zero records
    Failed,
}

pub struct ReportRunner<'a, S: ReportService> {
    service: &'a S,
    backend: Option<&'a mut (dyn DatabaseBackend + 'static)>,
    options: RunnerOptions,
}

impl<'a, S: ReportService> ReportRunner<'a, S> {
    pub fn new(
        service: &'a S,
        backend: Option<&'a mut (dyn DatabaseBackend + 'static)>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            service,
            backend,
            options,
        }
    }

    /// Drive one report to a terminal outcome.
    ///
    /// Exactly one of `Succeeded` or `Failed` is returned per invocation;
    /// a failure here never affects other configured reports.
    pub async fn run(&mut self, report: &ReportDefinition) -> RunOutcome {
        info!(
            report = %report.report_name,
            report_id = report.report_id,
            "Running report"
        );

        let run_id = match self.service.submit_run(report.report_id).await {
            Ok(run_id) => run_id,
            Err(e) => {
                error!("Run submission failed: {}", e);
                return RunOutcome::Failed;
            }
        };
        if run_id == 0 {
            error!("No run id returned from the report service");
            return RunOutcome::Failed;
        }

        let details = match self.wait_for_completion(run_id).await {
            Ok(details) => details,
            Err(e) => {
                error!("Report run {} did not complete: {}", run_id, e);
                return RunOutcome::Failed;
            }
        };

        let stats = self.ingest_output(report, &details).await;

        if report.delete_run_instance {
            // Best effort; a cleanup failure never changes the outcome.
            info!(run_id, "Deleting report run instance");
            if let Err(e) = self.service.delete_run(run_id).await {
                warn!("Failed to delete run instance {}: {}", run_id, e);
            }
        }

        RunOutcome::Succeeded(stats)
    }

    /// Poll until the run reaches a terminal status.
    ///
    /// Returns the completed run's details; a failed or aborted run, a
    /// transport error, or deadline expiry are all terminal failures.
    async fn wait_for_completion(&self, run_id: u64) -> ExportResult<RunDetails> {
        let deadline = if self.options.poll_timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + self.options.poll_timeout)
        };

        loop {
            info!(run_id, "Checking report run for completion");
            let details = self.service.run_status(run_id).await?;

            match details.run.status {
                RunStatus::Completed => return Ok(details),
                RunStatus::Failed | RunStatus::Aborted => {
                    return Err(ExportError::Api(format!(
                        "Run ended with status '{}'",
                        details.run.status
                    )));
                }
                RunStatus::Pending | RunStatus::Started | RunStatus::Running => {}
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(ExportError::Api(format!(
                        "Run still '{}' after {:?}",
                        details.run.status, self.options.poll_timeout
                    )));
                }
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    /// Download, parse and ingest every output file matching the report's
    /// configured format.
    async fn ingest_output(&mut self, report: &ReportDefinition, details: &RunDetails) -> RunStats {
        let mut stats = RunStats::new();

        for file in &details.files {
            if file.format() != Some(report.format()) {
                continue;
            }

            let path = match self
                .service
                .download(&details.run, file, &self.options.reports_dir)
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    error!("Failed to retrieve {}: {}", file.name, e);
                    continue;
                }
            };

            let rows = match parse::parse_file(&path, report.format()) {
                Ok(rows) => rows,
                Err(e) => {
                    // A malformed file aborts its own ingestion only.
                    error!("{}", e);
                    self.remove_local_file(report, &path).await;
                    continue;
                }
            };

            if rows.is_empty() {
                info!(file = %file.name, "No records found");
            } else {
                info!(file = %file.name, records = rows.len(), "Processing records");
                self.ingest_rows(report, &rows, &mut stats).await;
                summarize(report, rows.len(), &stats);
            }

            self.remove_local_file(report, &path).await;
        }

        stats
    }

    async fn ingest_rows(
        &mut self,
        report: &ReportDefinition,
        rows: &[parse::Row],
        stats: &mut RunStats,
    ) {
        let backend = match self.backend.as_deref_mut() {
            Some(backend) => backend,
            None => {
                info!(records = rows.len(), "Database work skipped");
                return;
            }
        };

        let bar = ProgressBar::new(rows.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut engine = UpsertEngine::new(backend, &report.table, self.options.diagnostics);
        for row in rows {
            engine.apply(row, stats).await;
            bar.inc(1);
        }
        bar.finish_and_clear();
    }

    async fn remove_local_file(&self, report: &ReportDefinition, path: &std::path::Path) {
        if !report.delete_local_file {
            return;
        }
        info!(path = %path.display(), "Deleting local report file");
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to delete {}: {}", path.display(), e);
        }
    }
}

fn summarize(report: &ReportDefinition, total: usize, stats: &RunStats) {
    info!("==== Report processing statistics ====");
    info!(" * {} [{}]", report.report_name, report.report_id);
    info!(" * Total records found: {}", total);
    info!(" * Rows affected: {}", stats.rows_affected);
    info!(" * Successful queries: {}", stats.success);
    if stats.failed > 0 {
        warn!(" * Failed queries: {}", stats.failed);
    } else {
        info!(" * Failed queries: {}", stats.failed);
    }
}
