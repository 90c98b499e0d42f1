//! Error types for the Sentinel scan pipeline.
//!
//! Per-resource failures never abort a run: the scanner converts each one
//! into an `ERROR` verdict via [`SentinelError::kind`]. Only configuration
//! errors are fatal, and only at process start.

use thiserror::Error;

use crate::verdict::ErrorKind;

/// The unified error type for the Sentinel crates.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// The resource could not be loaded, parsed, or serialized.
    #[error("read error: {reason}")]
    ReadError { reason: String },

    /// The backend was unreachable or answered with a non-success status.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The backend answered, but no valid verdict could be recovered.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The audit store could not persist or update a record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// The audit store exists but could not be loaded.
    #[error("audit store unreadable: {reason}")]
    AuditReadFailed { reason: String },

    /// No audit record has the requested id.
    #[error("record not found: {reason}")]
    RecordNotFound { reason: String },

    /// Anything that does not fit the categories above.
    #[error("unexpected error: {reason}")]
    Unknown { reason: String },
}

impl SentinelError {
    /// Map this error onto the verdict error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SentinelError::ReadError { .. } => ErrorKind::ReadError,
            SentinelError::Transport { .. } => ErrorKind::TransportError,
            SentinelError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            SentinelError::ConfigError { .. }
            | SentinelError::AuditWriteFailed { .. }
            | SentinelError::AuditReadFailed { .. }
            | SentinelError::RecordNotFound { .. }
            | SentinelError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// The bare reason, without the category prefix of `Display`.
    pub fn reason(&self) -> &str {
        match self {
            SentinelError::ReadError { reason }
            | SentinelError::Transport { reason }
            | SentinelError::MalformedResponse { reason }
            | SentinelError::ConfigError { reason }
            | SentinelError::AuditWriteFailed { reason }
            | SentinelError::AuditReadFailed { reason }
            | SentinelError::RecordNotFound { reason }
            | SentinelError::Unknown { reason } => reason,
        }
    }
}

/// Convenience alias used throughout the Sentinel crates.
pub type SentinelResult<T> = Result<T, SentinelError>;
