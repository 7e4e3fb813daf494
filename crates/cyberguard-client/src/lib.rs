//! Client for the `CyberGuard` malware scanning service.
//!
//! Validate a `.jar`, `.class`, or `.zip` file locally, upload it to the scan
//! service, and poll until the asynchronous scan finishes. The
//! [`UploadController`] owns that lifecycle and publishes every phase change
//! so a UI can render progress while it runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use cyberguard_client::{HttpScanService, ScanConfig, ScanFile, UploadController};
//!
//! # async fn example() -> Result<(), cyberguard_client::ScanError> {
//! let config = ScanConfig::from_env();
//! let service = HttpScanService::new(&config)?;
//! let controller = UploadController::new(service, &config);
//!
//! let attempt = controller.submit(ScanFile::from_path("suspicious.jar").await?).await;
//! if let Some(result) = attempt.result() {
//!     println!("{}: {}", result.filename, result.probability_percent());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod controller;
mod error;
mod file;
mod service;
mod types;
mod validate;

pub use client::HttpScanService;
pub use controller::{Phase, PollPolicy, UploadAttempt, UploadController};
pub use error::{AttemptError, ErrorKind, ScanError, ValidationError};
pub use file::{FileInfo, ScanFile};
pub use service::ScanService;
pub use types::{HealthStatus, PollResponse, RiskLevel, ScanResult, ScanStatus, UploadReceipt};
pub use validate::{ALLOWED_EXTENSIONS, MAX_FILE_SIZE, ValidationLimits, extension_of, validate_file};

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Base URL used when neither the caller nor `CYBERGUARD_API_URL` sets one.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_POLLS: u32 = 30;

/// Configuration for the scan client and controller.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Scan service base URL. Default: `http://127.0.0.1:8000/api`.
    pub base_url: String,
    /// Per-request HTTP timeout. Default: 30 seconds.
    pub timeout: Duration,
    /// Status polling cadence. Default: every second, at most 30 polls.
    pub poll: PollPolicy,
    /// Local validation rules applied before any upload.
    pub limits: ValidationLimits,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            poll: PollPolicy::default(),
            limits: ValidationLimits::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    ///
    /// Environment variables:
    /// - `CYBERGUARD_API_URL` — scan service base URL
    /// - `CYBERGUARD_TIMEOUT_SECS` — per-request timeout in seconds
    /// - `CYBERGUARD_POLL_INTERVAL_MS` — delay between status polls
    /// - `CYBERGUARD_MAX_POLLS` — status polls before giving up
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("CYBERGUARD_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.base_url);

        let timeout = env_value::<u64>("CYBERGUARD_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map_or(defaults.timeout, Duration::from_secs);

        let interval = env_value::<u64>("CYBERGUARD_POLL_INTERVAL_MS")
            .map_or(defaults.poll.interval, Duration::from_millis);

        let max_attempts = env_value::<u32>("CYBERGUARD_MAX_POLLS")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.poll.max_attempts);

        Self {
            base_url,
            timeout,
            poll: PollPolicy {
                interval,
                max_attempts,
            },
            limits: defaults.limits,
        }
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    parse_setting(key, std::env::var(key).ok())
}

fn parse_setting<T: FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let config = ScanConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll.interval, Duration::from_secs(1));
        assert_eq!(config.poll.max_attempts, 30);
        assert_eq!(config.limits.max_file_size, 52_428_800);
    }

    #[test]
    fn parse_setting_reads_numbers() {
        assert_eq!(parse_setting::<u64>("K", Some(" 250 ".to_owned())), Some(250));
    }

    #[test]
    fn parse_setting_ignores_garbage_and_blanks() {
        assert_eq!(parse_setting::<u32>("K", Some("soon".to_owned())), None);
        assert_eq!(parse_setting::<u32>("K", Some("   ".to_owned())), None);
        assert_eq!(parse_setting::<u32>("K", None), None);
    }
}
