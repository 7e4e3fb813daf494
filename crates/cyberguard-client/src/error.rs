//! Error types for the `CyberGuard` client.

use serde::Serialize;

/// A file was rejected before any network call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The filename has no extension at all.
    #[error("\"{name}\" has no file extension: expected one of {allowed}")]
    MissingExtension {
        /// The rejected filename.
        name: String,
        /// Allowed extensions, formatted for display.
        allowed: String,
    },

    /// The extension is not one the scan service accepts.
    #[error("unsupported file type \".{extension}\": expected one of {allowed}")]
    UnsupportedExtension {
        /// The rejected extension, without the leading dot.
        extension: String,
        /// Allowed extensions, formatted for display.
        allowed: String,
    },

    /// The file exceeds the upload size cap.
    #[error("file is too large ({size} bytes): the maximum is {max} bytes")]
    TooLarge {
        /// Size of the rejected file.
        size: u64,
        /// Configured maximum.
        max: u64,
    },
}

/// All errors that can end a scan attempt or a client call.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Missing or invalid client configuration.
    #[error("cyberguard config error: {0}")]
    Config(String),

    /// The file failed local validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The scan service answered with a non-success HTTP status.
    #[error("{operation} failed: {status_text}")]
    Transport {
        /// Which call failed (`Upload`, `Status check`, ...).
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Canonical status text for the code.
        status_text: String,
    },

    /// The upload succeeded but the response carried no scan identifier.
    #[error("no scan identifier returned")]
    MissingScanId,

    /// A `completed` status response lacked fields needed for a result.
    #[error("incomplete scan result: {0}")]
    IncompleteResult(String),

    /// The scan service reported the scan itself as failed.
    #[error("{0}")]
    ServiceReported(String),

    /// The scan was still pending after the last allowed poll.
    #[error("scan timed out after {attempts} status checks")]
    Timeout {
        /// Number of polls issued before giving up.
        attempts: u32,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A success response body was not the JSON we expected.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading the local file failed.
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of a failed attempt, for display and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Validation,
    Transport,
    Protocol,
    ServiceReported,
    Timeout,
    Network,
    Io,
}

impl ScanError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::MissingScanId | Self::IncompleteResult(_) | Self::Json(_) => ErrorKind::Protocol,
            Self::ServiceReported(_) => ErrorKind::ServiceReported,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network(_) => ErrorKind::Network,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// The failure recorded on an [`UploadAttempt`](crate::UploadAttempt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ScanError> for AttemptError {
    fn from(err: &ScanError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
