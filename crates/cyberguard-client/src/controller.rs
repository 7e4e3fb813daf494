//! Upload/poll state machine for a single scan attempt.
//!
//! ```text
//! Idle ──select──▶ Validating ──valid──▶ Uploading ──scan id──▶ Polling ──completed──▶ Completed
//!                      │                     │                    │ ▲
//!                      └──invalid──▶ Failed ◀┴──HTTP error/no id  │ └─pending (wait, ≤ max polls)
//!                                      ▲                          │
//!                                      └───failed/HTTP error/timeout
//! ```
//!
//! Every attempt carries a generation number. `reset()` and a new `submit()`
//! bump it, and every mutation from an in-flight attempt is applied only if
//! its generation is still current, so a late response can never overwrite
//! newer state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ScanConfig;
use crate::error::{AttemptError, ScanError, ValidationError};
use crate::file::{FileInfo, ScanFile};
use crate::service::ScanService;
use crate::types::{ScanResult, ScanStatus};
use crate::validate::{ValidationLimits, validate_file};

/// Where an attempt is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    Uploading,
    Polling,
    Completed,
    Failed,
}

impl Phase {
    /// `Completed` or `Failed`: only `reset` or a new submission leaves these.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// A request is (or is about to be) in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Validating | Self::Uploading | Self::Polling)
    }
}

/// How often and how many times to ask for a scan's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between consecutive polls.
    pub interval: Duration,
    /// Total polls before the attempt times out.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 30,
        }
    }
}

/// Snapshot of the live attempt.
///
/// `result` is present exactly when the phase is `Completed`, `error` exactly
/// when it is `Failed`, and `scan_id` only once an upload has succeeded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadAttempt {
    #[serde(skip)]
    generation: u64,
    file: Option<FileInfo>,
    phase: Phase,
    scan_id: Option<String>,
    attempt_count: u32,
    max_attempts: u32,
    error: Option<AttemptError>,
    result: Option<ScanResult>,
}

impl UploadAttempt {
    fn fresh(generation: u64, max_attempts: u32) -> Self {
        Self {
            generation,
            max_attempts,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file(&self) -> Option<&FileInfo> {
        self.file.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scan_id(&self) -> Option<&str> {
        self.scan_id.as_deref()
    }

    /// Status polls issued so far.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Status polls allowed before the attempt times out.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn error(&self) -> Option<&AttemptError> {
        self.error.as_ref()
    }

    pub fn result(&self) -> Option<&ScanResult> {
        self.result.as_ref()
    }

    /// One line describing the current phase, for progress displays.
    #[must_use]
    pub fn progress_text(&self) -> String {
        match self.phase {
            Phase::Idle => "Select a .jar, .class, or .zip file to scan".to_owned(),
            Phase::Validating => "Validating file...".to_owned(),
            Phase::Uploading => match &self.file {
                Some(file) => format!("Uploading {}...", file.name),
                None => "Uploading file...".to_owned(),
            },
            Phase::Polling => format!(
                "Scanning file... (attempt {}/{})",
                self.attempt_count, self.max_attempts
            ),
            Phase::Completed => "Scan complete".to_owned(),
            Phase::Failed => match &self.error {
                Some(err) => format!("Scan failed: {err}"),
                None => "Scan failed".to_owned(),
            },
        }
    }

    fn complete(&mut self, result: ScanResult) {
        self.phase = Phase::Completed;
        self.result = Some(result);
        self.error = None;
    }

    fn fail(&mut self, error: AttemptError) {
        self.phase = Phase::Failed;
        self.error = Some(error);
        self.result = None;
    }
}

/// Drives one scan attempt at a time from file selection to a terminal phase.
///
/// Cloning yields another handle to the same attempt, so one task can run
/// `submit` while another calls `reset` or watches progress.
pub struct UploadController<S> {
    service: Arc<S>,
    policy: PollPolicy,
    limits: ValidationLimits,
    state: Arc<watch::Sender<UploadAttempt>>,
}

impl<S> Clone for UploadController<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            policy: self.policy,
            limits: self.limits.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: ScanService> UploadController<S> {
    /// Create a controller using the poll policy and limits from `config`.
    pub fn new(service: S, config: &ScanConfig) -> Self {
        Self::with_policy(service, config.poll, config.limits.clone())
    }

    pub fn with_policy(service: S, policy: PollPolicy, limits: ValidationLimits) -> Self {
        let (state, _) = watch::channel(UploadAttempt::fresh(0, policy.max_attempts));
        Self {
            service: Arc::new(service),
            policy,
            limits,
            state: Arc::new(state),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Clone of the current attempt.
    pub fn snapshot(&self) -> UploadAttempt {
        self.state.borrow().clone()
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<UploadAttempt> {
        self.state.subscribe()
    }

    /// Select `file` and check it without uploading.
    ///
    /// Starts a new attempt for `file`, discarding any previous one. A file
    /// that passes stays selected with the attempt back in `Idle`.
    ///
    /// # Errors
    ///
    /// Returns the broken rule; the attempt is then `Failed`.
    pub fn validate(&self, file: &ScanFile) -> Result<(), ValidationError> {
        let generation = self.begin(file);
        match validate_file(file.name(), file.size(), &self.limits) {
            Ok(()) => {
                self.update(generation, |attempt| attempt.phase = Phase::Idle);
                Ok(())
            }
            Err(err) => {
                self.fail(generation, &ScanError::from(err.clone()));
                Err(err)
            }
        }
    }

    /// Validate, upload, and poll `file` until the attempt ends.
    ///
    /// Supersedes any attempt already in flight. Returns the state as of
    /// the moment this call finished: a terminal phase, or whatever newer
    /// state replaced it if a reset or another submission intervened.
    pub async fn submit(&self, file: ScanFile) -> UploadAttempt {
        let generation = self.begin(&file);

        if let Err(err) = validate_file(file.name(), file.size(), &self.limits) {
            self.fail(generation, &ScanError::from(err));
            return self.snapshot();
        }

        if let Err(err) = self.run(generation, file).await {
            self.fail(generation, &err);
        }
        self.snapshot()
    }

    /// Drop the current attempt and return to `Idle`.
    ///
    /// Safe in any phase. An in-flight upload or poll keeps running until its
    /// response arrives, then discards it.
    pub fn reset(&self) {
        let max_attempts = self.policy.max_attempts;
        self.state.send_modify(|attempt| {
            let generation = attempt.generation.wrapping_add(1);
            debug!(generation, "resetting upload attempt");
            *attempt = UploadAttempt::fresh(generation, max_attempts);
        });
    }

    async fn run(&self, generation: u64, file: ScanFile) -> Result<(), ScanError> {
        let filename = file.name().to_owned();
        let contents = file.into_contents(self.limits.max_file_size).await?;
        if !self.update(generation, |attempt| attempt.phase = Phase::Uploading) {
            debug!(generation, file = %filename, "attempt superseded before upload");
            return Ok(());
        }

        let receipt = self.service.upload(&filename, contents).await;
        if !self.is_current(generation) {
            warn!(generation, file = %filename, "discarding upload response for a superseded attempt");
            return Ok(());
        }

        let scan_id = receipt?.into_scan_id().ok_or(ScanError::MissingScanId)?;
        debug!(generation, %scan_id, "upload accepted");

        let recorded = scan_id.clone();
        if !self.update(generation, move |attempt| {
            attempt.scan_id = Some(recorded);
            attempt.phase = Phase::Polling;
        }) {
            return Ok(());
        }

        self.poll(generation, &scan_id).await
    }

    async fn poll(&self, generation: u64, scan_id: &str) -> Result<(), ScanError> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if !self.update(generation, |a| a.attempt_count = attempt) {
                return Ok(());
            }

            debug!(scan_id, attempt, max_attempts, "polling scan status");
            let response = self.service.poll(scan_id).await;
            if !self.is_current(generation) {
                warn!(generation, scan_id, "discarding poll response for a superseded attempt");
                return Ok(());
            }

            let response = response?;
            match response.status {
                ScanStatus::Completed => {
                    let result = response.into_result(scan_id)?;
                    info!(
                        scan_id,
                        malicious = result.is_malicious,
                        probability = result.malicious_probability,
                        "scan completed"
                    );
                    self.update(generation, move |a| a.complete(result));
                    return Ok(());
                }
                ScanStatus::Failed => {
                    let message = response
                        .error
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| "scan failed".to_owned());
                    return Err(ScanError::ServiceReported(message));
                }
                ScanStatus::Pending | ScanStatus::Unknown => {
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.interval).await;
                    }
                }
            }
        }

        Err(ScanError::Timeout {
            attempts: max_attempts,
        })
    }

    fn begin(&self, file: &ScanFile) -> u64 {
        let max_attempts = self.policy.max_attempts;
        let info = file.info();
        let mut generation = 0;
        self.state.send_modify(|attempt| {
            generation = attempt.generation.wrapping_add(1);
            *attempt = UploadAttempt {
                file: Some(info),
                phase: Phase::Validating,
                ..UploadAttempt::fresh(generation, max_attempts)
            };
        });
        debug!(generation, file = file.name(), size = file.size(), "starting upload attempt");
        generation
    }

    fn fail(&self, generation: u64, err: &ScanError) {
        let recorded = AttemptError::from(err);
        if self.update(generation, move |attempt| attempt.fail(recorded)) {
            info!(generation, kind = ?err.kind(), error = %err, "upload attempt failed");
        }
    }

    /// Apply `change` only if `generation` is still the live attempt.
    fn update(&self, generation: u64, change: impl FnOnce(&mut UploadAttempt)) -> bool {
        self.state.send_if_modified(|attempt| {
            if attempt.generation != generation {
                return false;
            }
            change(attempt);
            true
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.borrow().generation == generation
    }
}
