//! Errors raised while loading settings.

use std::path::PathBuf;

use thiserror::Error;

/// Why a settings file could not become a [`crate::ChatSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid settings JSON.
    #[error("invalid settings in {}: {source}", .path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A numeric setting the client cannot work with.
    #[error("{key} must be within {min}..={max}, got {value}")]
    OutOfRange {
        /// Settings key, as written in the file.
        key: &'static str,
        /// Rejected value.
        value: u64,
        /// Smallest accepted value.
        min: u64,
        /// Largest accepted value.
        max: u64,
    },

    /// `logging.level` is not a tracing level.
    #[error("unknown log level {0:?}")]
    UnknownLevel(String),

    /// `host` is blank.
    #[error("host must not be empty")]
    EmptyHost,
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
