//! Integration tests for the `cyberguard` CLI binary.
//!
//! These tests run the CLI as a subprocess and check exit codes, stdout,
//! and stderr. Tests that need a scan service start a local `mockito`
//! server; everything else points at an address nothing listens on.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const UNREACHABLE: &str = "http://127.0.0.1:19999";

/// Helper: locate the `cyberguard` binary built by `cargo test`.
fn cyberguard_bin() -> String {
    let path = env!("CARGO_BIN_EXE_cyberguard");
    assert!(
        Path::new(path).exists(),
        "cyberguard binary not found at {path}"
    );
    path.to_owned()
}

/// Helper: run cyberguard against `url` and return (`exit_code`, stdout, stderr).
fn run_against(url: &str, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(cyberguard_bin())
        .args(args)
        .env("CYBERGUARD_API_URL", url)
        .env("CYBERGUARD_POLL_INTERVAL_MS", "10")
        .env("CYBERGUARD_TIMEOUT_SECS", "5")
        .env_remove("CYBERGUARD_MAX_POLLS")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute cyberguard");

    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn run(args: &[&str]) -> (i32, String, String) {
    run_against(UNREACHABLE, args)
}

/// Helper: write `size` bytes to `name` inside `dir`.
fn write_file(dir: &tempfile::TempDir, name: &str, size: usize) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, vec![0x50u8; size]).expect("write failed");
    path
}

fn completed_body(malicious: bool, probability: f64) -> String {
    serde_json::json!({
        "status": "completed",
        "id": "abc123",
        "filename": "trojan.jar",
        "is_malicious": malicious,
        "malicious_probability": probability,
        "scan_date": "2025-07-24T10:00:00Z"
    })
    .to_string()
}

// ── Version & help ───────────────────────────────────────────────────

#[test]
fn test_version_flag() {
    let (code, stdout, _) = run(&["--version"]);
    assert_eq!(code, 0, "cyberguard --version should exit 0");
    assert!(
        stdout.contains("cyberguard"),
        "version output should contain 'cyberguard': {stdout}"
    );
}

#[test]
fn test_help_flag() {
    let (code, stdout, _) = run(&["--help"]);
    assert_eq!(code, 0, "cyberguard --help should exit 0");
    assert!(stdout.contains("CyberGuard CLI"), "help should mention CyberGuard CLI");
    for sub in ["scan", "validate", "health", "model-info"] {
        assert!(stdout.contains(sub), "help should list '{sub}' command");
    }
}

#[test]
fn test_subcommand_help() {
    for sub in ["scan", "validate", "health", "model-info"] {
        let (code, stdout, _) = run(&[sub, "--help"]);
        assert_eq!(code, 0, "{sub} --help should exit 0");
        assert!(!stdout.is_empty(), "{sub} --help should produce output");
    }
}

// ── Validate command (no server needed) ──────────────────────────────

#[test]
fn test_validate_accepts_jar() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "trojan.jar", 10 * 1024);

    let (code, stdout, stderr) = run(&["validate", path.to_str().unwrap()]);
    assert_eq!(code, 0, "valid jar should pass: {stderr}");
    assert!(
        stdout.contains("trojan.jar is ready to scan (10.0 KiB)"),
        "should confirm the file: {stdout}"
    );
}

#[test]
fn test_validate_rejects_unsupported_extension() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "notes.txt", 16);

    let (code, _, stderr) = run(&["validate", path.to_str().unwrap()]);
    assert_ne!(code, 0, "txt file should be rejected");
    assert!(
        stderr.contains("unsupported file type"),
        "should explain the rejection: {stderr}"
    );
}

#[test]
fn test_validate_rejects_oversized_file() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("huge.zip");
    let file = fs::File::create(&path).expect("create failed");
    file.set_len(52_428_801).expect("set_len failed");
    drop(file);

    let (code, _, stderr) = run(&["validate", path.to_str().unwrap()]);
    assert_ne!(code, 0, "oversized file should be rejected");
    assert!(stderr.contains("too large"), "should report size: {stderr}");
}

#[test]
fn test_validate_missing_file() {
    let (code, _, stderr) = run(&["validate", "/tmp/cyberguard-test-nonexistent.jar"]);
    assert_ne!(code, 0, "missing file should fail");
    assert!(stderr.contains("cannot open"), "should report missing file: {stderr}");
}

// ── Scan command ─────────────────────────────────────────────────────

#[test]
fn test_scan_rejects_bad_extension_without_network() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "setup.exe", 64);

    let (code, _, stderr) = run(&["scan", path.to_str().unwrap()]);
    assert_eq!(code, 1, "scan of .exe should fail");
    assert!(
        stderr.contains("unsupported file type"),
        "should fail validation, not the network: {stderr}"
    );
}

#[test]
fn test_scan_malicious_file_end_to_end() {
    let mut server = mockito::Server::new();
    let upload = server
        .mock("POST", "/upload/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"scan_id": "abc123"}"#)
        .create();
    let poll = server
        .mock("GET", "/scan/abc123/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completed_body(true, 0.92))
        .expect(1)
        .create();

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "trojan.jar", 10 * 1024);

    let (code, stdout, stderr) = run_against(&server.url(), &["scan", path.to_str().unwrap()]);

    upload.assert();
    poll.assert();
    assert_eq!(code, 2, "malicious verdict should exit 2: {stderr}");
    assert!(stdout.contains("MALICIOUS"), "should show verdict: {stdout}");
    assert!(stdout.contains("92.0%"), "should show probability: {stdout}");
    assert!(stdout.contains("abc123"), "should show scan id: {stdout}");

    let validating = stdout.find("Validating file...").expect("validating line");
    let uploading = stdout.find("Uploading trojan.jar...").expect("uploading line");
    let polling = stdout
        .find("Scanning file... (attempt 1/30)")
        .expect("polling line");
    assert!(validating < uploading && uploading < polling, "progress out of order: {stdout}");
}

#[test]
fn test_scan_json_output_for_clean_file() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/upload/")
        .with_status(200)
        .with_body(r#"{"scan_id": "abc123"}"#)
        .create();
    server
        .mock("GET", "/scan/abc123/")
        .with_status(200)
        .with_body(completed_body(false, 0.873))
        .create();

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "trojan.jar", 128);

    let (code, stdout, stderr) =
        run_against(&server.url(), &["scan", path.to_str().unwrap(), "--json"]);
    assert_eq!(code, 0, "clean verdict should exit 0: {stderr}");

    let attempt: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(attempt["phase"], "completed");
    assert_eq!(attempt["scan_id"], "abc123");
    assert_eq!(attempt["attempt_count"], 1);
    assert_eq!(attempt["result"]["is_malicious"], false);
    assert_eq!(attempt["result"]["malicious_probability"], 0.873);
    assert!(attempt["error"].is_null());
}

#[test]
fn test_scan_upload_failure_reports_status_text() {
    let mut server = mockito::Server::new();
    server.mock("POST", "/upload/").with_status(500).create();
    let poll = server.mock("GET", mockito::Matcher::Any).expect(0).create();

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "a.zip", 32);

    let (code, _, stderr) = run_against(&server.url(), &["scan", path.to_str().unwrap()]);
    poll.assert();
    assert_eq!(code, 1);
    assert!(
        stderr.contains("Upload failed: Internal Server Error"),
        "should surface status text: {stderr}"
    );
}

#[test]
fn test_scan_missing_scan_id() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/upload/")
        .with_status(200)
        .with_body("{}")
        .create();

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "a.class", 32);

    let (code, _, stderr) = run_against(&server.url(), &["scan", path.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(
        stderr.contains("no scan identifier returned"),
        "should report protocol error: {stderr}"
    );
}

#[test]
fn test_scan_times_out_after_max_polls() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/upload/")
        .with_status(200)
        .with_body(r#"{"scan_id": "slow"}"#)
        .create();
    let poll = server
        .mock("GET", "/scan/slow/")
        .with_status(200)
        .with_body(r#"{"status": "pending"}"#)
        .expect(3)
        .create();

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "slow.jar", 32);

    let output = Command::new(cyberguard_bin())
        .args(["scan", path.to_str().unwrap()])
        .env("CYBERGUARD_API_URL", server.url())
        .env("CYBERGUARD_POLL_INTERVAL_MS", "5")
        .env("CYBERGUARD_MAX_POLLS", "3")
        .output()
        .expect("failed to execute cyberguard");

    poll.assert();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1));
    for n in 1..=3 {
        let line = format!("Scanning file... (attempt {n}/3)");
        assert_eq!(stdout.matches(&line).count(), 1, "expected '{line}' once: {stdout}");
    }
    assert!(
        stderr.contains("scan timed out after 3 status checks"),
        "should report timeout: {stderr}"
    );
}

#[test]
fn test_scan_service_reported_failure() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/upload/")
        .with_status(200)
        .with_body(r#"{"scan_id": "broken"}"#)
        .create();
    server
        .mock("GET", "/scan/broken/")
        .with_status(200)
        .with_body(r#"{"status": "failed", "error": "archive is encrypted"}"#)
        .create();

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = write_file(&dir, "broken.zip", 32);

    let (code, _, stderr) = run_against(&server.url(), &["scan", path.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(stderr.contains("archive is encrypted"), "should relay service message: {stderr}");
}

// ── Service commands ─────────────────────────────────────────────────

#[test]
fn test_health_unreachable_server() {
    let (code, _, stderr) = run(&["health"]);
    assert_ne!(code, 0, "health against nothing should fail");
    assert!(stderr.contains("unreachable"), "should say unreachable: {stderr}");
}

#[test]
fn test_health_degraded_service() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/health/")
        .with_status(503)
        .with_body(r#"{"api_status": "operational", "model_status": "not_loaded", "version": "1.0-basic"}"#)
        .create();

    let (code, stdout, _) = run_against(&server.url(), &["health"]);
    assert_eq!(code, 1, "degraded service should exit 1");
    assert!(stdout.contains("not_loaded"), "should show model status: {stdout}");
    assert!(stdout.contains("degraded"), "should warn about degradation: {stdout}");
}

#[test]
fn test_model_info_prints_json() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/model-info/")
        .with_status(200)
        .with_body(r#"{"api_version": "1.0-basic", "model_info": {"is_loaded": false}}"#)
        .create();

    let (code, stdout, stderr) = run_against(&server.url(), &["model-info"]);
    assert_eq!(code, 0, "model-info should succeed: {stderr}");
    let info: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    assert_eq!(info["api_version"], "1.0-basic");
}
