// src/commands/init.rs
//! Database initialization

use anyhow::Result;
use pkgwatch::SyncConfig;
use tracing::info;

pub fn cmd_init(config: &SyncConfig) -> Result<()> {
    let db_path = &config.db_path;
    info!("Initializing pkgwatch database at: {}", db_path.display());
    pkgwatch::db::init(db_path)?;
    println!("Database initialized successfully at: {}", db_path.display());
    Ok(())
}
