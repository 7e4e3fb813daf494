//! Scan service wire types and result helpers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ScanError;

/// Service-side state of a scan.
///
/// Any status other than the three known strings deserializes to `Unknown`,
/// which the controller treats as still pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A finished scan. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Scan identifier.
    pub id: String,
    /// Name of the scanned file, as the service recorded it.
    pub filename: String,
    /// The service's verdict.
    pub is_malicious: bool,
    /// Probability the file is malicious, in `[0, 1]`.
    pub malicious_probability: f64,
    /// When the scan finished.
    pub scan_date: DateTime<Utc>,
    /// Always `Completed` for results produced by the controller.
    pub status: ScanStatus,
}

impl ScanResult {
    /// Probability as a percentage with one decimal, e.g. `0.873` → `87.3%`.
    #[must_use]
    pub fn probability_percent(&self) -> String {
        format!("{:.1}%", self.malicious_probability * 100.0)
    }

    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_probability(self.malicious_probability)
    }
}

/// Coarse risk bucket derived from the malicious probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `>= 0.8` high, `>= 0.5` medium, `>= 0.3` low, otherwise safe.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.8 {
            Self::High
        } else if probability >= 0.5 {
            Self::Medium
        } else if probability >= 0.3 {
            Self::Low
        } else {
            Self::Safe
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Safe => "SAFE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        })
    }
}

/// Body of a successful `POST /upload/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub scan_id: Option<String>,
}

impl UploadReceipt {
    /// The scan identifier, if present and non-blank.
    #[must_use]
    pub fn into_scan_id(self) -> Option<String> {
        self.scan_id.filter(|id| !id.trim().is_empty())
    }
}

/// Body of a successful `GET /scan/{id}/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PollResponse {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: ScanStatus,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub is_malicious: Option<bool>,
    #[serde(default)]
    pub malicious_probability: Option<f64>,
    #[serde(default)]
    pub scan_date: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PollResponse {
    /// Build the final result from a `completed` response.
    ///
    /// A missing `id` falls back to the identifier that was polled.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::IncompleteResult`] if any other field is
    /// missing, the probability is outside `[0, 1]`, or the date does not
    /// parse.
    pub fn into_result(self, scan_id: &str) -> Result<ScanResult, ScanError> {
        let filename = self.filename.ok_or_else(|| missing("filename"))?;
        let is_malicious = self.is_malicious.ok_or_else(|| missing("is_malicious"))?;
        let malicious_probability = self
            .malicious_probability
            .ok_or_else(|| missing("malicious_probability"))?;
        if !(0.0..=1.0).contains(&malicious_probability) {
            return Err(ScanError::IncompleteResult(format!(
                "malicious_probability {malicious_probability} is outside [0, 1]"
            )));
        }
        let raw_date = self.scan_date.ok_or_else(|| missing("scan_date"))?;
        let scan_date = parse_scan_date(&raw_date).ok_or_else(|| {
            ScanError::IncompleteResult(format!("unparseable scan_date \"{raw_date}\""))
        })?;

        Ok(ScanResult {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| scan_id.to_owned()),
            filename,
            is_malicious,
            malicious_probability,
            scan_date,
            status: ScanStatus::Completed,
        })
    }
}

/// Accepts `null`, numbers, or any other JSON value in `status`.
fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ScanStatus, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value.as_ref().and_then(serde_json::Value::as_str) {
        Some("pending") => ScanStatus::Pending,
        Some("completed") => ScanStatus::Completed,
        Some("failed") => ScanStatus::Failed,
        _ => ScanStatus::Unknown,
    })
}

fn missing(field: &str) -> ScanError {
    ScanError::IncompleteResult(format!("missing {field}"))
}

/// RFC 3339, or a naive ISO 8601 timestamp taken as UTC.
fn parse_scan_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Result of a health probe.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the service answered 2xx.
    pub ok: bool,
    /// HTTP status returned.
    pub status_code: u16,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u128,
    /// Raw health document (`Null` if the body was not JSON).
    pub body: serde_json::Value,
}

impl HealthStatus {
    pub fn api_status(&self) -> Option<&str> {
        self.body.get("api_status").and_then(serde_json::Value::as_str)
    }

    pub fn model_status(&self) -> Option<&str> {
        self.body.get("model_status").and_then(serde_json::Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.body.get("version").and_then(serde_json::Value::as_str)
    }
}
