//! # sentinel-config
//!
//! Configuration for the Sentinel IaC gate.
//!
//! Settings are resolved once at startup from four layers, lowest first:
//! built-in defaults, an optional TOML file, the environment (after loading
//! `.env`), and command-line flags. The resulting [`ScanConfig`] is passed
//! explicitly to everything that needs it.

pub mod layer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use sentinel_contracts::error::{SentinelError, SentinelResult};

pub use layer::ConfigLayer;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PACING_MS: u64 = 2_000;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_MAX_RETRIES: u32 = 0;
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 256 * 1024;
pub const DEFAULT_AUDIT_TABLE: &str = "SentinelMonitor";
pub const DEFAULT_AUDIT_DIR: &str = ".sentinel";
pub const DEFAULT_CATEGORY: &str = "IAC";
pub const DEFAULT_ORIGIN: &str = "cli";

/// Fully resolved settings for one process.
#[derive(Clone, PartialEq, Eq)]
pub struct ScanConfig {
    api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub pacing: Duration,
    pub workers: usize,
    pub max_retries: u32,
    pub max_resource_bytes: usize,
    pub audit_table: String,
    pub audit_dir: PathBuf,
    pub category: String,
    pub origin: String,
}

impl ScanConfig {
    /// Resolve `layer` (already stacked) over the built-in defaults.
    pub fn from_layer(layer: ConfigLayer) -> SentinelResult<Self> {
        let config = Self {
            api_key: layer.api_key.filter(|k| !k.trim().is_empty()),
            endpoint: layer.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: layer.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            pacing: Duration::from_millis(layer.pacing_ms.unwrap_or(DEFAULT_PACING_MS)),
            workers: layer.workers.unwrap_or(DEFAULT_WORKERS),
            max_retries: layer.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            max_resource_bytes: layer
                .max_resource_bytes
                .unwrap_or(DEFAULT_MAX_RESOURCE_BYTES),
            audit_table: layer
                .audit_table
                .unwrap_or_else(|| DEFAULT_AUDIT_TABLE.to_string()),
            audit_dir: layer
                .audit_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_DIR)),
            category: layer.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            origin: layer.origin.unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Stack `cli` over the environment (read through `env`) over `file`.
    pub fn resolve(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        cli: ConfigLayer,
    ) -> SentinelResult<Self> {
        let file_layer = match file {
            Some(path) => ConfigLayer::from_file(path)?,
            None => ConfigLayer::default(),
        };
        let env_layer = ConfigLayer::from_env(env)?;
        Self::from_layer(cli.over(env_layer).over(file_layer))
    }

    /// Load `.env` from the working directory, then resolve against the
    /// process environment. Variables already set are never overridden.
    pub fn load(file: Option<&Path>, cli: ConfigLayer) -> SentinelResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(SentinelError::ConfigError {
                    reason: format!("failed to load .env: {e}"),
                })
            }
        }
        Self::resolve(file, |name| std::env::var(name).ok(), cli)
    }

    fn validate(&self) -> SentinelResult<()> {
        let invalid = |reason: &str| {
            Err(SentinelError::ConfigError {
                reason: reason.to_string(),
            })
        };
        if self.workers == 0 {
            return invalid("workers must be at least 1");
        }
        if self.timeout.is_zero() {
            return invalid("timeout_secs must be at least 1");
        }
        if self.max_resource_bytes == 0 {
            return invalid("max_resource_bytes must be at least 1");
        }
        if self.endpoint.trim().is_empty() {
            return invalid("endpoint must not be empty");
        }
        if self.model.trim().is_empty() {
            return invalid("model must not be empty");
        }
        if self.audit_table.trim().is_empty() {
            return invalid("audit_table must not be empty");
        }
        Ok(())
    }

    /// The backend credential. Only scans need it, so its absence is
    /// reported here rather than at load time.
    pub fn api_key(&self) -> SentinelResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SentinelError::ConfigError {
                reason: "no API key configured: set GOOGLE_API_KEY (or SENTINEL_API_KEY)"
                    .to_string(),
            })
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("pacing", &self.pacing)
            .field("workers", &self.workers)
            .field("max_retries", &self.max_retries)
            .field("max_resource_bytes", &self.max_resource_bytes)
            .field("audit_table", &self.audit_table)
            .field("audit_dir", &self.audit_dir)
            .field("category", &self.category)
            .field("origin", &self.origin)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
