// src/error.rs

//! Error types for pkgwatch
//!
//! A single crate-wide error enum. Per-record and per-source failures are
//! normally recovered close to where they happen; only database setup
//! failures are expected to reach the caller unhandled.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bulk package visibility was not granted
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An inventory source, external process or platform service failed
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single record could not be parsed or derived
    #[error("Corrupt record '{package}': {reason}")]
    RecordCorrupt { package: String, reason: String },

    /// Persistent store operation failed
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Database could not be opened or migrated
    #[error("Initialization error: {0}")]
    InitError(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for a corrupt-record error
    pub fn corrupt(package: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::RecordCorrupt {
            package: package.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only affects a single record
    pub fn is_record_level(&self) -> bool {
        matches!(self, Error::RecordCorrupt { .. })
    }
}
