//! Report service client
//!
//! Abstracts the remote reporting service behind a trait: submit a run, poll
//! its status, download the output files, and delete the run instance. The
//! runner only ever sees this surface, so tests drive the whole state machine
//! with a scripted fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ExportResult;
use crate::parse::ReportFormat;

pub mod http;

pub use http::HttpReportService;

/// Status of a report run on the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Started,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl RunStatus {
    /// A terminal status ends the poll loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Aborted)
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "started" => Ok(RunStatus::Started),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "aborted" => Ok(RunStatus::Aborted),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Started => "started",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// One report run, created by submission and mutated only by polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRun {
    pub run_id: u64,
    pub report_id: u32,
    pub status: RunStatus,
    #[serde(default)]
    pub download_link: Option<String>,
}

/// One output file of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFile {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

impl ReportFile {
    /// The file's format, if it is one this tool ingests.
    pub fn format(&self) -> Option<ReportFormat> {
        self.file_type.parse().ok()
    }
}

/// Poll response: run metadata plus the file list (empty until completed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetails {
    pub run: ReportRun,
    #[serde(default)]
    pub files: Vec<ReportFile>,
}

/// Remote reporting service operations
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Submit a run for the report, returning the service-assigned run id.
    async fn submit_run(&self, report_id: u32) -> ExportResult<u64>;

    /// Fetch the current status of a run.
    async fn run_status(&self, run_id: u64) -> ExportResult<RunDetails>;

    /// Delete a run instance on the service.
    async fn delete_run(&self, run_id: u64) -> ExportResult<()>;

    /// Download one output file into `dest_dir`, returning the local path.
    async fn download(
        &self,
        run: &ReportRun,
        file: &ReportFile,
        dest_dir: &Path,
    ) -> ExportResult<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Aborted.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Started.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("running".parse::<RunStatus>().unwrap(), RunStatus::Running);
        assert!("exploded".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_file_format() {
        let csv = ReportFile {
            name: "out.csv".to_string(),
            file_type: "csv".to_string(),
        };
        assert_eq!(csv.format(), Some(ReportFormat::Csv));

        let pdf = ReportFile {
            name: "out.pdf".to_string(),
            file_type: "pdf".to_string(),
        };
        assert_eq!(pdf.format(), None);
    }

    #[test]
    fn test_run_details_decodes_without_files() {
        let details: RunDetails = serde_json::from_str(
            r#"{"run": {"run_id": 7, "report_id": 1, "status": "running"}}"#,
        )
        .unwrap();
        assert_eq!(details.run.run_id, 7);
        assert_eq!(details.run.status, RunStatus::Running);
        assert!(details.files.is_empty());
    }
}
