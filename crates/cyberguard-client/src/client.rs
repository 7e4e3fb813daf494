//! HTTP implementation of the scan service contract.

use std::time::Instant;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::ScanConfig;
use crate::error::ScanError;
use crate::service::ScanService;
use crate::types::{HealthStatus, PollResponse, UploadReceipt};

/// Scan service client over HTTP.
///
/// Endpoints, relative to the configured base URL:
/// - `POST /upload/` — multipart upload, field `file`
/// - `GET /scan/{scan_id}/` — scan status
/// - `GET /health/` — service health
/// - `GET /model-info/` — classifier metadata
#[derive(Debug, Clone)]
pub struct HttpScanService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpScanService {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::Config` if the base URL is empty, or
    /// `ScanError::Network` if the HTTP client cannot be constructed.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(ScanError::Config(
                "missing base URL — set CYBERGUARD_API_URL or pass base_url in config".to_owned(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("cyberguard-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ScanError::Network)?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /health/`.
    ///
    /// A 503 means the API is up but the model is not loaded; it is reported
    /// as `ok: false` rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or answers with any
    /// other non-success status.
    pub async fn health(&self) -> Result<HealthStatus, ScanError> {
        let start = Instant::now();
        let resp = self.client.get(self.url("/health/")).send().await?;
        let status = resp.status();
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            return Err(transport_error("Health check", status));
        }
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

        Ok(HealthStatus {
            ok: status.is_success(),
            status_code: status.as_u16(),
            latency_ms: start.elapsed().as_millis(),
            body,
        })
    }

    /// Fetch `GET /model-info/` as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-success status or a non-JSON body.
    pub async fn model_info(&self) -> Result<serde_json::Value, ScanError> {
        let resp = self.client.get(self.url("/model-info/")).send().await?;
        read_json(resp, "Model info request").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl ScanService for HttpScanService {
    async fn upload(&self, filename: &str, contents: Vec<u8>) -> Result<UploadReceipt, ScanError> {
        let url = self.url("/upload/");
        debug!(%url, filename, bytes = contents.len(), "uploading file");

        let part = Part::bytes(contents)
            .file_name(filename.to_owned())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let resp = self.client.post(&url).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(transport_error("Upload", status));
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(UploadReceipt::default());
        }
        serde_json::from_str(&text).map_err(ScanError::Json)
    }

    async fn poll(&self, scan_id: &str) -> Result<PollResponse, ScanError> {
        let url = self.url(&format!("/scan/{}/", urlencoding::encode(scan_id)));
        debug!(%url, "checking scan status");

        let resp = self.client.get(&url).send().await?;
        read_json(resp, "Status check").await
    }
}

async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    operation: &'static str,
) -> Result<T, ScanError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(transport_error(operation, status));
    }
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(ScanError::Json)
}

fn transport_error(operation: &'static str, status: StatusCode) -> ScanError {
    ScanError::Transport {
        operation,
        status: status.as_u16(),
        status_text: status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), ToOwned::to_owned),
    }
}
