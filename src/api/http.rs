//! HTTP implementation of the report service client

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::{ReportFile, ReportRun, ReportService, RunDetails};
use crate::error::{ExportError, ExportResult};

const API_KEY_HEADER: &str = "x-api-key";

/// Report service client over HTTP.
///
/// Every request carries the API key header. The client timeout covers file
/// downloads as well, so a stalled transfer fails rather than hanging the run.
pub struct HttpReportService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    run_id: u64,
}

impl HttpReportService {
    pub fn new(endpoint: &str, api_key: &str, timeout_secs: u64) -> ExportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExportError::Api(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn check_status(response: reqwest::Response) -> ExportResult<reqwest::Response> {
        if !response.status().is_success() {
            return Err(ExportError::Api(format!(
                "Invalid HTTP response: {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl ReportService for HttpReportService {
    async fn submit_run(&self, report_id: u32) -> ExportResult<u64> {
        let url = self.url(&format!("reports/{}/run", report_id));
        debug!(%url, "Submitting report run");
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ExportError::Api(format!("Run submission failed: {}", e)))?;
        let response = Self::check_status(response).await?;
        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ExportError::Api(format!("Invalid submission response: {}", e)))?;
        Ok(body.run_id)
    }

    async fn run_status(&self, run_id: u64) -> ExportResult<RunDetails> {
        let url = self.url(&format!("reports/runs/{}", run_id));
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ExportError::Api(format!("Status request failed: {}", e)))?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ExportError::Api(format!("Invalid status response: {}", e)))
    }

    async fn delete_run(&self, run_id: u64) -> ExportResult<()> {
        let url = self.url(&format!("reports/runs/{}", run_id));
        let response = self
            .client
            .delete(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ExportError::Api(format!("Run deletion failed: {}", e)))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn download(
        &self,
        run: &ReportRun,
        file: &ReportFile,
        dest_dir: &Path,
    ) -> ExportResult<PathBuf> {
        let url = self.url(&format!("reports/{}/files/{}", run.report_id, file.name));
        info!(file = %file.name, "Retrieving report file");

        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(&file.name);
        // Download into a sidecar first; a truncated transfer never leaves a
        // file that looks valid.
        let partial = dest_dir.join(format!("{}.part", file.name));

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ExportError::Api(format!("Download failed: {}", e)))?;
        let response = Self::check_status(response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::Api(format!("Download failed: {}", e)))?;
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &dest).await?;

        debug!(path = %dest.display(), bytes = bytes.len(), "Retrieved report file");
        Ok(dest)
    }
}
