//! Session control and report listing against the telemetry backend.
//!
//! The dashboard core only depends on the [`SessionControl`] and
//! [`ReportCatalog`] traits. [`HttpControl`] implements both over the
//! backend's JSON API.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hostpulse::control::{HttpControl, ReportCatalog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let control = HttpControl::builder()
//!         .endpoint("http://localhost:8000")
//!         .build()?;
//!
//!     for report in control.list().await? {
//!         println!("{} ({} bytes)", report.filename, report.size);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::source::MonitoringStatus;

/// Acknowledgment of a start request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionStarted {
    pub status: String,
    #[serde(default)]
    pub start_time: Option<String>,
}

/// Acknowledgment of a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionStopped {
    pub status: String,
    /// Report generated for the stopped session.
    #[serde(default)]
    pub pdf_path: Option<String>,
    #[serde(default)]
    pub data_points: u64,
}

/// One generated report as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDescriptor {
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// ISO-8601 creation time.
    pub created: String,
}

impl ReportDescriptor {
    /// Size in kilobytes, one decimal.
    pub fn size_kb(&self) -> String {
        format!("{:.1} KB", self.size as f64 / 1024.0)
    }
}

#[derive(Debug, Deserialize)]
struct ReportList {
    #[serde(default)]
    reports: Vec<ReportDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
}

/// Starts and stops timed monitoring sessions.
#[async_trait]
pub trait SessionControl: Send + Sync {
    async fn start(&self) -> Result<SessionStarted>;
    async fn stop(&self) -> Result<SessionStopped>;
    /// Current session status, as the stream would report it.
    async fn status(&self) -> Result<MonitoringStatus>;
}

/// Lists and fetches generated reports.
#[async_trait]
pub trait ReportCatalog: Send + Sync {
    /// Reports, newest first.
    async fn list(&self) -> Result<Vec<ReportDescriptor>>;
    /// Download `filename` into `dest_dir`, returning the written path.
    async fn download(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Everything the dashboard needs from the backend.
pub trait Backend: SessionControl + ReportCatalog {}

impl<T: SessionControl + ReportCatalog> Backend for T {}

/// Reject report names that could escape the report directory.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(Error::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// JSON/HTTP client for the telemetry backend.
#[derive(Debug, Clone)]
pub struct HttpControl {
    client: Client,
    endpoint: String,
}

impl HttpControl {
    /// Create a new builder for configuring the client.
    pub fn builder() -> HttpControlBuilder {
        HttpControlBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self.client.post(self.url(path)).send().await?;
        let response = check_status(response).await?;
        response.json().await.map_err(|e| Error::Decode(e.to_string()))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        let response = check_status(response).await?;
        response.json().await.map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Turn a non-2xx response into [`Error::Rejected`].
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = rejection_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    warn!(status = status.as_u16(), "Backend rejected request: {}", message);

    Err(Error::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Extract the `error` (or `detail`) message from a rejection body.
fn rejection_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.error.or(parsed.detail)
}

#[async_trait]
impl SessionControl for HttpControl {
    async fn start(&self) -> Result<SessionStarted> {
        let started: SessionStarted = self.post_json("/api/start-monitoring").await?;
        info!(start_time = ?started.start_time, "Monitoring start accepted");
        Ok(started)
    }

    async fn stop(&self) -> Result<SessionStopped> {
        let stopped: SessionStopped = self.post_json("/api/stop-monitoring").await?;
        info!(
            report = ?stopped.pdf_path,
            data_points = stopped.data_points,
            "Monitoring stop accepted"
        );
        Ok(stopped)
    }

    async fn status(&self) -> Result<MonitoringStatus> {
        self.get_json("/api/monitoring-status").await
    }
}

#[async_trait]
impl ReportCatalog for HttpControl {
    async fn list(&self) -> Result<Vec<ReportDescriptor>> {
        let list: ReportList = self.get_json("/api/reports").await?;
        debug!(count = list.reports.len(), "Fetched report list");
        Ok(list.reports)
    }

    async fn download(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf> {
        validate_filename(filename)?;

        let response = self
            .client
            .get(self.url(&format!("/api/download-report/{}", filename)))
            .send()
            .await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(filename);
        tokio::fs::write(&path, &bytes).await?;

        info!(path = %path.display(), bytes = bytes.len(), "Report downloaded");
        Ok(path)
    }
}

/// Builder for [`HttpControl`].
#[derive(Debug)]
pub struct HttpControlBuilder {
    endpoint: String,
    timeout: Duration,
}

impl Default for HttpControlBuilder {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpControlBuilder {
    /// Backend origin, e.g. `http://localhost:8000`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Request timeout. Stop requests wait for report generation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpControl> {
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(HttpControl {
            client,
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
        })
    }
}
