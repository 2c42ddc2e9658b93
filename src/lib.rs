//! Report export tool - runs reports on a remote reporting service and
//! reconciles the tabular output into a relational database.
//!
//! Provides:
//! - Report service client (submit, poll, download, delete)
//! - CSV/XLSX row parsing
//! - Dialect-aware upsert engine (MySQL atomic upsert, SQL Server
//!   check-then-branch) with per-record outcome accounting
//! - A run controller driving each report to exactly one terminal outcome

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod parse;
pub mod runner;
pub mod stats;

// Re-export commonly used types
pub use api::{HttpReportService, ReportFile, ReportRun, ReportService, RunDetails, RunStatus};
pub use config::{DatabaseConfig, ExportConfig, ReportDefinition, SqlDriver, TableMapping};
pub use db::{DatabaseBackend, UpsertEngine};
pub use error::{ExportError, ExportResult};
pub use parse::{ReportFormat, Row};
pub use runner::{ReportRunner, RunOutcome, RunnerOptions};
pub use stats::RunStats;
