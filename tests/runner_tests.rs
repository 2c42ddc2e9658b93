//! End-to-end tests for the report run controller
//!
//! Drive the full submit -> poll -> terminal-outcome machine with a scripted
//! service fake and a recording database fake; no network or database needed.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use report_export::api::{ReportFile, ReportRun, ReportService, RunDetails, RunStatus};
use report_export::config::{ReportDefinition, TableMapping};
use report_export::db::{BoundQuery, DatabaseBackend};
use report_export::error::{ExportError, ExportResult};
use report_export::runner::{ReportRunner, RunOutcome, RunnerOptions};

const RUN_ID: u64 = 77;

/// Service fake with a scripted poll sequence.
struct FakeService {
    /// Statuses returned by successive status polls
    statuses: Mutex<Vec<RunStatus>>,
    /// Files listed once the run completes
    files: Vec<ReportFile>,
    /// CSV payload written by every download
    payload: Vec<u8>,
    submit_fails: bool,
    submitted_run_id: u64,
    downloads: Mutex<Vec<String>>,
    deleted_runs: Mutex<Vec<u64>>,
}

impl FakeService {
    fn new(statuses: &[RunStatus], files: Vec<ReportFile>, payload: &[u8]) -> Self {
        let mut statuses: Vec<RunStatus> = statuses.to_vec();
        statuses.reverse();
        Self {
            statuses: Mutex::new(statuses),
            files,
            payload: payload.to_vec(),
            submit_fails: false,
            submitted_run_id: RUN_ID,
            downloads: Mutex::new(Vec::new()),
            deleted_runs: Mutex::new(Vec::new()),
        }
    }

    fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl ReportService for FakeService {
    async fn submit_run(&self, _report_id: u32) -> ExportResult<u64> {
        if self.submit_fails {
            return Err(ExportError::Api("connection refused".to_string()));
        }
        Ok(self.submitted_run_id)
    }

    async fn run_status(&self, run_id: u64) -> ExportResult<RunDetails> {
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ExportError::Api("status script exhausted".to_string()))?;
        let files = if status == RunStatus::Completed {
            self.files.clone()
        } else {
            Vec::new()
        };
        Ok(RunDetails {
            run: ReportRun {
                run_id,
                report_id: 1,
                status,
                download_link: None,
            },
            files,
        })
    }

    async fn delete_run(&self, run_id: u64) -> ExportResult<()> {
        self.deleted_runs.lock().unwrap().push(run_id);
        Ok(())
    }

    async fn download(
        &self,
        _run: &ReportRun,
        file: &ReportFile,
        dest_dir: &Path,
    ) -> ExportResult<PathBuf> {
        self.downloads.lock().unwrap().push(file.name.clone());
        std::fs::create_dir_all(dest_dir)?;
        let path = dest_dir.join(&file.name);
        std::fs::write(&path, &self.payload)?;
        Ok(path)
    }
}

/// Backend fake recording every executed statement.
struct FakeBackend {
    executed: Vec<BoundQuery>,
    /// Statements whose SQL contains this value fail
    fail_value: Option<String>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            executed: Vec::new(),
            fail_value: None,
        }
    }
}

#[async_trait]
impl DatabaseBackend for FakeBackend {
    async fn ping(&mut self) -> ExportResult<()> {
        Ok(())
    }

    async fn exists(
        &mut self,
        _table: &str,
        _pk_column: &str,
        _pk_value: &str,
    ) -> ExportResult<bool> {
        Ok(false)
    }

    async fn execute(&mut self, query: &BoundQuery) -> ExportResult<u64> {
        if let Some(value) = &self.fail_value {
            if query.params.iter().any(|p| &p.value == value) {
                return Err(ExportError::Database("duplicate key".to_string()));
            }
        }
        self.executed.push(query.clone());
        Ok(1)
    }

    fn supports_atomic_upsert(&self) -> bool {
        true
    }

    fn backend_type(&self) -> &'static str {
        "fake"
    }
}

fn report() -> ReportDefinition {
    ReportDefinition {
        report_id: 1,
        report_name: "All Users".to_string(),
        use_xlsx: false,
        delete_run_instance: false,
        delete_local_file: false,
        table: TableMapping {
            table_name: "users".to_string(),
            primary_key: "user_id".to_string(),
            mapping: BTreeMap::from([
                ("id".to_string(), "user_id".to_string()),
                ("name".to_string(), "name".to_string()),
            ]),
        },
    }
}

fn csv_file(name: &str) -> ReportFile {
    ReportFile {
        name: name.to_string(),
        file_type: "csv".to_string(),
    }
}

fn options(dir: &Path) -> RunnerOptions {
    RunnerOptions {
        poll_interval: Duration::ZERO,
        reports_dir: dir.to_path_buf(),
        ..RunnerOptions::default()
    }
}

#[tokio::test]
async fn completed_run_ingests_matching_files_only() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::new(
        &[RunStatus::Pending, RunStatus::Running, RunStatus::Completed],
        vec![
            csv_file("users.csv"),
            ReportFile {
                name: "users.xlsx".to_string(),
                file_type: "xlsx".to_string(),
            },
        ],
        b"id,name\n1,Alice\n2,Bob\n",
    );
    let mut backend = FakeBackend::new();

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    let outcome = runner.run(&report()).await;

    match outcome {
        RunOutcome::Succeeded(stats) => {
            assert_eq!(stats.success, 2);
            assert_eq!(stats.failed, 0);
            assert_eq!(stats.rows_affected, 2);
        }
        RunOutcome::Failed => panic!("run should succeed"),
    }
    // Only the CSV file matches the report's configured format.
    assert_eq!(service.download_count(), 1);
    assert_eq!(backend.executed.len(), 2);
}

#[tokio::test]
async fn aborted_run_fails_without_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::new(&[RunStatus::Aborted], vec![csv_file("users.csv")], b"");
    let mut backend = FakeBackend::new();

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    let outcome = runner.run(&report()).await;

    assert_eq!(outcome, RunOutcome::Failed);
    assert_eq!(service.download_count(), 0);
    assert!(backend.executed.is_empty());
}

#[tokio::test]
async fn submission_error_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = FakeService::new(&[RunStatus::Completed], vec![], b"");
    service.submit_fails = true;
    let mut backend = FakeBackend::new();

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    assert_eq!(runner.run(&report()).await, RunOutcome::Failed);
}

#[tokio::test]
async fn zero_run_id_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = FakeService::new(&[RunStatus::Completed], vec![], b"");
    service.submitted_run_id = 0;
    let mut backend = FakeBackend::new();

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    assert_eq!(runner.run(&report()).await, RunOutcome::Failed);
    assert_eq!(service.download_count(), 0);
}

#[tokio::test]
async fn poll_transport_error_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    // Script exhausts after one non-terminal status; the next poll errors.
    let service = FakeService::new(&[RunStatus::Running], vec![csv_file("users.csv")], b"");
    let mut backend = FakeBackend::new();

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    assert_eq!(runner.run(&report()).await, RunOutcome::Failed);
    assert_eq!(service.download_count(), 0);
}

#[tokio::test]
async fn poll_timeout_expiry_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::new(
        &[RunStatus::Running, RunStatus::Running, RunStatus::Completed],
        vec![csv_file("users.csv")],
        b"id,name\n1,Alice\n",
    );
    let mut backend = FakeBackend::new();

    let mut opts = options(dir.path());
    opts.poll_timeout = Duration::from_nanos(1);
    let mut runner = ReportRunner::new(&service, Some(&mut backend), opts);

    assert_eq!(runner.run(&report()).await, RunOutcome::Failed);
    assert_eq!(service.download_count(), 0);
}

#[tokio::test]
async fn failed_rows_are_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::new(
        &[RunStatus::Completed],
        vec![csv_file("users.csv")],
        b"id,name\n1,Alice\n2,Bob\n3,Carol\n",
    );
    let mut backend = FakeBackend::new();
    backend.fail_value = Some("Bob".to_string());

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    let outcome = runner.run(&report()).await;

    match outcome {
        RunOutcome::Succeeded(stats) => {
            assert_eq!(stats.success, 2);
            assert_eq!(stats.failed, 1);
            // Only the successful statements contribute affected counts.
            assert_eq!(stats.rows_affected, 2);
        }
        RunOutcome::Failed => panic!("partial failures keep the run succeeded"),
    }
}

#[tokio::test]
async fn malformed_file_aborts_its_ingestion_only() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::new(
        &[RunStatus::Completed],
        vec![csv_file("users.csv")],
        b"id,name\n1,Alice\n2\n",
    );
    let mut backend = FakeBackend::new();

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    let outcome = runner.run(&report()).await;

    // The run itself completed; the bad file just contributed no rows.
    match outcome {
        RunOutcome::Succeeded(stats) => {
            assert_eq!(stats.success, 0);
            assert_eq!(stats.failed, 0);
        }
        RunOutcome::Failed => panic!("run completion is independent of parse failures"),
    }
    assert!(backend.executed.is_empty());
}

#[tokio::test]
async fn cleanup_flags_delete_run_and_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::new(
        &[RunStatus::Completed],
        vec![csv_file("users.csv")],
        b"id,name\n1,Alice\n",
    );
    let mut backend = FakeBackend::new();

    let mut definition = report();
    definition.delete_run_instance = true;
    definition.delete_local_file = true;

    let mut runner = ReportRunner::new(&service, Some(&mut backend), options(dir.path()));
    runner.run(&definition).await;

    assert_eq!(*service.deleted_runs.lock().unwrap(), vec![RUN_ID]);
    assert!(!dir.path().join("users.csv").exists());
}

#[tokio::test]
async fn skip_database_downloads_and_parses_only() {
    let dir = tempfile::tempdir().unwrap();
    let service = FakeService::new(
        &[RunStatus::Completed],
        vec![csv_file("users.csv")],
        b"id,name\n1,Alice\n",
    );

    let mut runner: ReportRunner<'_, FakeService> =
        ReportRunner::new(&service, None, options(dir.path()));
    let outcome = runner.run(&report()).await;

    assert_eq!(service.download_count(), 1);
    match outcome {
        RunOutcome::Succeeded(stats) => assert_eq!(stats.total(), 0),
        RunOutcome::Failed => panic!("skip-database runs still succeed"),
    }
}
