// src/commands/mod.rs
//! Command handlers for the pkgwatch CLI

mod diffs;
mod init;
mod list;
mod load;
mod shell_list;
mod sync;
mod updates;

pub use diffs::cmd_diffs;
pub use init::cmd_init;
pub use list::cmd_list;
pub use load::cmd_load;
pub use shell_list::cmd_shell_list;
pub use sync::cmd_sync;
pub use updates::cmd_updates;

use anyhow::{Context, Result};
use pkgwatch::SyncConfig;
use std::path::Path;

/// Load the configuration, applying the command-line database override
pub fn load_config(config: Option<&Path>, db_path: Option<&Path>) -> Result<SyncConfig> {
    let mut config =
        SyncConfig::load_or_default(config).context("Failed to load configuration")?;
    if let Some(path) = db_path {
        config.db_path = path.to_path_buf();
    }
    Ok(config)
}
