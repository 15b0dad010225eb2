// src/config.rs

//! Sync engine configuration
//!
//! All fields have defaults, so an empty TOML file (or no file at all)
//! yields a usable configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default freshness window of the inventory cache
pub const DEFAULT_FRESHNESS_WINDOW_MS: u64 = 5_000;

/// Look-back window shown on the very first observation (7 days)
pub const DEFAULT_NEW_APP_LOOKBACK_MS: i64 = 604_800_000;

/// Usage statistics window for "recently used" (5 minutes)
pub const DEFAULT_RECENTLY_USED_WINDOW_MS: i64 = 300_000;

/// Name of the package this engine runs inside of
pub const DEFAULT_SELF_PACKAGE: &str = "com.madness.collision";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Database path
    pub db_path: PathBuf,
    /// Age up to which a cached inventory is served
    pub freshness_window_ms: u64,
    /// Look-back window used while the engine is brand new
    pub new_app_lookback_ms: i64,
    /// Window queried from usage statistics
    pub recently_used_window_ms: i64,
    /// Maximum number of recently used packages
    pub recently_used_limit: usize,
    /// Timeout for each external listing process
    pub process_timeout_ms: u64,
    /// Timeout for each platform service call
    pub service_timeout_ms: u64,
    /// Upper bound for per-package fan-out
    pub max_concurrent: usize,
    /// Full listing command (program followed by arguments)
    pub listing_command: Vec<String>,
    /// Extra arguments for the special-component partition listing
    pub special_listing_args: Vec<String>,
    /// Make a second pass for archived packages
    pub include_archived: bool,
    /// Own package name, excluded from "recently used"
    pub self_package: String,
    /// Days after which empty diff records are purged
    pub diff_retention_days: i64,
    /// List version-code upgrades that kept their target API separately
    pub split_api_upgrades: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            freshness_window_ms: DEFAULT_FRESHNESS_WINDOW_MS,
            new_app_lookback_ms: DEFAULT_NEW_APP_LOOKBACK_MS,
            recently_used_window_ms: DEFAULT_RECENTLY_USED_WINDOW_MS,
            recently_used_limit: 10,
            process_timeout_ms: 10_000,
            service_timeout_ms: 5_000,
            max_concurrent: 8,
            listing_command: vec![
                "pm".to_string(),
                "list".to_string(),
                "packages".to_string(),
                "-f".to_string(),
            ],
            special_listing_args: vec!["--apex-only".to_string()],
            include_archived: true,
            self_package: DEFAULT_SELF_PACKAGE.to_string(),
            diff_retention_days: 60,
            split_api_upgrades: false,
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: SyncConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.listing_command.is_empty() {
            return Err(Error::ConfigError(
                "listing_command must name a program".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(Error::ConfigError(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_millis(self.freshness_window_ms)
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }
}

/// Default database location under the platform data directory
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("pkgwatch")
        .join("pkgwatch.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.freshness_window(), Duration::from_millis(5000));
        assert_eq!(config.new_app_lookback_ms, 7 * 24 * 60 * 60 * 1000);
        assert_eq!(config.recently_used_limit, 10);
        assert_eq!(config.listing_command[0], "pm");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "freshness_window_ms = 250\nmax_concurrent = 2").unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.freshness_window_ms, 250);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.diff_retention_days, 60);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent = 0").unwrap();

        let err = SyncConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config =
            SyncConfig::load_or_default(Some(Path::new("/nonexistent/pkgwatch.toml"))).unwrap();
        assert_eq!(config.max_concurrent, 8);
    }
}
