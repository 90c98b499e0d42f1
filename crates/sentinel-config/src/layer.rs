//! One source of settings: a TOML file, the environment, or CLI flags.
//!
//! Every field is optional. Layers are stacked with [`ConfigLayer::over`]
//! and resolved into a `ScanConfig` once all sources are known.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use sentinel_contracts::error::{SentinelError, SentinelResult};

/// Settings from a single source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub pacing_ms: Option<u64>,
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub max_resource_bytes: Option<usize>,
    pub audit_table: Option<String>,
    pub audit_dir: Option<PathBuf>,
    pub category: Option<String>,
    pub origin: Option<String>,
}

impl ConfigLayer {
    /// Parse TOML text. Unknown keys are rejected.
    pub fn from_toml_str(s: &str) -> SentinelResult<Self> {
        toml::from_str(s).map_err(|e| SentinelError::ConfigError {
            reason: format!("failed to parse config TOML: {e}"),
        })
    }

    pub fn from_file(path: &Path) -> SentinelResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SentinelError::ConfigError {
            reason: format!("failed to read config file '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Read the `SENTINEL_*` variables (and the key variables) through
    /// `lookup`. Empty values count as unset.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> SentinelResult<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_key: var("GOOGLE_API_KEY").or_else(|| var("SENTINEL_API_KEY")),
            endpoint: var("SENTINEL_ENDPOINT"),
            model: var("SENTINEL_MODEL"),
            timeout_secs: parse_var("SENTINEL_TIMEOUT_SECS", var("SENTINEL_TIMEOUT_SECS"))?,
            pacing_ms: parse_var("SENTINEL_PACING_MS", var("SENTINEL_PACING_MS"))?,
            workers: parse_var("SENTINEL_WORKERS", var("SENTINEL_WORKERS"))?,
            max_retries: parse_var("SENTINEL_MAX_RETRIES", var("SENTINEL_MAX_RETRIES"))?,
            max_resource_bytes: parse_var(
                "SENTINEL_MAX_RESOURCE_BYTES",
                var("SENTINEL_MAX_RESOURCE_BYTES"),
            )?,
            audit_table: var("SENTINEL_AUDIT_TABLE"),
            audit_dir: var("SENTINEL_AUDIT_DIR").map(PathBuf::from),
            category: var("SENTINEL_CATEGORY"),
            origin: var("SENTINEL_ORIGIN").or_else(|| {
                var("GITHUB_ACTIONS")
                    .filter(|v| v.trim().eq_ignore_ascii_case("true"))
                    .map(|_| "github-actions".to_string())
            }),
        })
    }

    /// `self` stacked over `lower`: each field set here wins.
    pub fn over(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            api_key: self.api_key.or(lower.api_key),
            endpoint: self.endpoint.or(lower.endpoint),
            model: self.model.or(lower.model),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            pacing_ms: self.pacing_ms.or(lower.pacing_ms),
            workers: self.workers.or(lower.workers),
            max_retries: self.max_retries.or(lower.max_retries),
            max_resource_bytes: self.max_resource_bytes.or(lower.max_resource_bytes),
            audit_table: self.audit_table.or(lower.audit_table),
            audit_dir: self.audit_dir.or(lower.audit_dir),
            category: self.category.or(lower.category),
            origin: self.origin.or(lower.origin),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> SentinelResult<Option<T>> {
    value
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| SentinelError::ConfigError {
                reason: format!("{name} must be a non-negative integer, got '{raw}'"),
            })
        })
        .transpose()
}
