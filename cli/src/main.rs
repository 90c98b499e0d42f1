//! Sentinel: a pre-deployment gate for infrastructure-as-code.
//!
//! Each JSON resource description is sent to a reasoning backend, the reply
//! is normalized into a verdict, every verdict is audited, and the process
//! exits non-zero when any resource is rejected or could not be analyzed.
//!
//! Usage:
//!   sentinel infra/                  scan every *.json file in infra/
//!   sentinel --format json a.json    machine-readable report
//!   sentinel history --limit 20      recent audit records
//!   sentinel archive <RECORD_ID>     hide a record from the active view
//!   sentinel reset                   remove every audit record

mod commands;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sentinel_config::ConfigLayer;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Sentinel: block deployments of risky infrastructure definitions.
///
/// Exit codes: 0 all resources approved, 1 deployment blocked, 2 fatal error.
#[derive(Parser)]
#[command(
    name = "sentinel",
    version,
    about = "Pre-deployment security gate for infrastructure-as-code",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    scan: ScanArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Scan resources (the default when no subcommand is given).
    Scan(ScanArgs),
    /// List audit records, newest first.
    History(HistoryArgs),
    /// Mark one audit record as archived.
    Archive(ArchiveArgs),
    /// Remove every audit record.
    Reset(StoreArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct StoreArgs {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ScanArgs {
    /// Files or directories to scan. Defaults to the current directory.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Number of resources analyzed concurrently.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Minimum delay between backend calls of one worker, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub pacing_ms: Option<u64>,

    /// Extra attempts after a transport failure.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Stop starting new analyses after the first blocking verdict.
    #[arg(long)]
    pub fail_fast: bool,

    /// Keep audit records in memory only.
    #[arg(long)]
    pub no_audit: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

impl ScanArgs {
    /// The flags that override configuration.
    pub fn config_layer(&self) -> ConfigLayer {
        ConfigLayer {
            workers: self.workers,
            pacing_ms: self.pacing_ms,
            max_retries: self.max_retries,
            ..ConfigLayer::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct HistoryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Only records of this category.
    #[arg(long)]
    pub category: Option<String>,

    /// Only records still in the active view.
    #[arg(long, conflicts_with = "archived")]
    pub active: bool,

    /// Only archived records.
    #[arg(long)]
    pub archived: bool,

    /// At most this many records.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Check the audit ledger; exit 1 if it does not verify.
    #[arg(long)]
    pub verify: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ArchiveArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// The record to archive, as shown by `history`.
    #[arg(value_name = "RECORD_ID")]
    pub record_id: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum Format {
    #[default]
    Text,
    Json,
}

/// Exit code for configuration and usage failures.
const EXIT_FATAL: u8 = 2;

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Logs go to stderr so stdout carries only the report. RUST_LOG=debug for
    // verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Scan(args)) => commands::scan(&args),
        Some(Command::History(args)) => commands::history(&args),
        Some(Command::Archive(args)) => commands::archive(&args),
        Some(Command::Reset(args)) => commands::reset(&args),
        None => commands::scan(&cli.scan),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
