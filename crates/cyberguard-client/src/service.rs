//! The seam between the controller and the remote scan service.

use crate::error::ScanError;
use crate::types::{PollResponse, UploadReceipt};

/// The two calls the upload controller makes against a scan service.
///
/// [`HttpScanService`](crate::HttpScanService) is the real implementation.
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait ScanService: Send + Sync + 'static {
    /// Submit a file for scanning.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Transport`] on a non-success status, or a
    /// network/body error if no usable response arrived.
    async fn upload(&self, filename: &str, contents: Vec<u8>) -> Result<UploadReceipt, ScanError>;

    /// Fetch the current state of a scan.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Transport`] on a non-success status, or a
    /// network/body error if no usable response arrived.
    async fn poll(&self, scan_id: &str) -> Result<PollResponse, ScanError>;
}
