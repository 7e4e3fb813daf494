//! `CyberGuard` CLI — scan Java archives and class files for malware.
//!
//! A thin terminal front end over `cyberguard-client`: pick a file, watch the
//! upload and scan progress, and read the verdict.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cyberguard_client::{
    DEFAULT_BASE_URL, HttpScanService, Phase, ScanConfig, ScanFile, ScanResult, UploadAttempt,
    UploadController, validate_file,
};
use serde_json::Value;
use tracing::debug;

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";
const BG_RED: &str = "\x1b[41m";
const BG_GREEN: &str = "\x1b[42m";

const BANNER_SMALL: &str = "⛨ CyberGuard";

/// Exit code for a completed scan that flagged the file as malicious.
const EXIT_MALICIOUS: u8 = 2;

// ── CLI structure ────────────────────────────────────────────────────

/// CyberGuard — malware scanning for Java archives.
#[derive(Parser)]
#[command(
    name = "cyberguard",
    version,
    about = "CyberGuard CLI — scan .jar, .class, and .zip files for malware",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         CYBERGUARD_API_URL           Scan service base URL (default: {DEFAULT_BASE_URL})\n  \
         CYBERGUARD_TIMEOUT_SECS      Per-request timeout (default: 30)\n  \
         CYBERGUARD_POLL_INTERVAL_MS  Delay between status checks (default: 1000)\n  \
         CYBERGUARD_MAX_POLLS         Status checks before timing out (default: 30)\n  \
         CYBERGUARD_LOG               Log filter when RUST_LOG is unset (default: warn)\n\n\
         {DIM}Examples:{RESET}\n  \
         cyberguard scan ./suspicious.jar\n  \
         cyberguard scan ./Payload.class --json\n  \
         cyberguard validate ./bundle.zip\n  \
         cyberguard health"
    ),
)]
struct Cli {
    /// Scan service base URL.
    #[arg(long, env = "CYBERGUARD_API_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and wait for its scan verdict.
    Scan {
        /// Path to a .jar, .class, or .zip file.
        file: String,
        /// Print the final attempt as JSON instead of a report.
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Check a file against the upload rules without sending it.
    Validate {
        /// Path to the file to check.
        file: String,
    },
    /// Show scan service health.
    Health,
    /// Show metadata about the scan service's classifier.
    #[command(name = "model-info")]
    ModelInfo,
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn print_json(value: &Value) {
    if value.is_null() {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to format JSON: {e}"),
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn print_scan_result(result: &ScanResult) {
    println!();
    header("🛡", "Scan Result");

    let verdict = if result.is_malicious {
        format!("{BG_RED}{WHITE}{BOLD} MALICIOUS {RESET}")
    } else {
        format!("{BG_GREEN}{WHITE}{BOLD} CLEAN {RESET}")
    };
    kv_line("Verdict", &verdict);
    kv_line("Probability", &result.probability_percent());
    kv_line("Risk Level", &result.risk_level().to_string());
    kv_line("File", &result.filename);
    kv_line("Scan Date", &result.scan_date.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    kv_line("Scan ID", &result.id);
    println!();
}

// ── Logging ──────────────────────────────────────────────────────────

fn init_logging() {
    let fallback = std::env::var("CYBERGUARD_LOG").unwrap_or_else(|_| "warn".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&fallback)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let mut config = ScanConfig::from_env();
    config.base_url = cli.url;

    match run(config, cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ScanConfig, cmd: Commands) -> Result<ExitCode> {
    match cmd {
        Commands::Scan { file, json } => cmd_scan(&config, &file, json).await,
        Commands::Validate { file } => cmd_validate(&config, &file).await,
        Commands::Health => cmd_health(&config).await,
        Commands::ModelInfo => cmd_model_info(&config).await,
    }
}

async fn open_file(path: &str) -> Result<ScanFile> {
    ScanFile::from_path(Path::new(path))
        .await
        .with_context(|| format!("cannot open {path}"))
}

// ── Scan commands ────────────────────────────────────────────────────

async fn cmd_scan(config: &ScanConfig, path: &str, json: bool) -> Result<ExitCode> {
    let file = open_file(path).await?;
    let service = HttpScanService::new(config).context("invalid scan service configuration")?;
    debug!(base_url = service.base_url(), "using scan service");
    let controller = UploadController::new(service, config);

    if !json {
        println!();
        println!("  {BANNER_SMALL} {DIM}scanning {}...{RESET}", file.name());
        println!();
    }

    let progress = (!json).then(|| {
        let mut rx = controller.subscribe();
        tokio::spawn(async move {
            let mut log = ProgressLog::default();
            while rx.changed().await.is_ok() {
                let attempt = rx.borrow_and_update().clone();
                log.print(&attempt);
            }
            log
        })
    });

    let attempt = controller.submit(file).await;
    drop(controller);
    if let Some(task) = progress {
        // The channel is closed now, so the task drains the last state and exits.
        let mut log = task.await.unwrap_or_default();
        log.print(&attempt);
    }

    if json {
        print_json(&serde_json::to_value(&attempt).context("failed to serialize attempt")?);
    }
    finish_scan(&attempt, json)
}

/// Progress lines already printed for one attempt.
///
/// The watch channel only keeps the latest state, so a step can be skipped
/// between two observations. `advance` emits every step the attempt has
/// passed that was not shown yet, in order.
#[derive(Debug, Default)]
struct ProgressLog {
    validated: bool,
    uploaded: bool,
    polls: u32,
}

impl ProgressLog {
    fn advance(&mut self, attempt: &UploadAttempt) -> Vec<String> {
        let mut lines = Vec::new();
        let Some(file) = attempt.file() else {
            return lines;
        };
        if attempt.phase() == Phase::Idle {
            return lines;
        }

        if !self.validated {
            self.validated = true;
            lines.push("Validating file...".to_owned());
        }
        let uploaded = attempt.phase() == Phase::Uploading || attempt.scan_id().is_some();
        if uploaded && !self.uploaded {
            self.uploaded = true;
            lines.push(format!("Uploading {}...", file.name));
        }
        while self.polls < attempt.attempt_count() {
            self.polls += 1;
            lines.push(format!(
                "Scanning file... (attempt {}/{})",
                self.polls,
                attempt.max_attempts()
            ));
        }
        lines
    }

    fn print(&mut self, attempt: &UploadAttempt) {
        for line in self.advance(attempt) {
            println!("  {DIM}›{RESET} {line}");
        }
    }
}

fn finish_scan(attempt: &UploadAttempt, json: bool) -> Result<ExitCode> {
    match attempt.phase() {
        Phase::Completed => {
            let Some(result) = attempt.result() else {
                bail!("scan completed without a result");
            };
            if !json {
                print_scan_result(result);
            }
            if result.is_malicious {
                Ok(ExitCode::from(EXIT_MALICIOUS))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Phase::Failed => {
            let message = attempt
                .error()
                .map_or_else(|| "scan failed".to_owned(), ToString::to_string);
            bail!("{message}")
        }
        other => bail!("scan ended unexpectedly in phase {other:?}"),
    }
}

async fn cmd_validate(config: &ScanConfig, path: &str) -> Result<ExitCode> {
    let file = open_file(path).await?;
    validate_file(file.name(), file.size(), &config.limits)?;
    success(&format!(
        "{} is ready to scan ({})",
        file.name(),
        format_size(file.size())
    ));
    Ok(ExitCode::SUCCESS)
}

// ── Service commands ─────────────────────────────────────────────────

async fn cmd_health(config: &ScanConfig) -> Result<ExitCode> {
    let service = HttpScanService::new(config).context("invalid scan service configuration")?;
    let health = service
        .health()
        .await
        .with_context(|| format!("scan service at {} is unreachable", service.base_url()))?;

    println!();
    header("🩺", "Scan Service Health");
    kv_line("Endpoint", service.base_url());
    kv_line("API", health.api_status().unwrap_or("unknown"));
    kv_line("Model", health.model_status().unwrap_or("unknown"));
    if let Some(version) = health.version() {
        kv_line("Version", version);
    }
    kv_line("Latency", &format!("{}ms", health.latency_ms));
    println!();

    if health.ok {
        success("scan service is healthy");
        Ok(ExitCode::SUCCESS)
    } else {
        warning(&format!(
            "scan service is degraded (HTTP {})",
            health.status_code
        ));
        Ok(ExitCode::FAILURE)
    }
}

async fn cmd_model_info(config: &ScanConfig) -> Result<ExitCode> {
    let service = HttpScanService::new(config).context("invalid scan service configuration")?;
    let info = service.model_info().await?;
    print_json(&info);
    Ok(ExitCode::SUCCESS)
}
