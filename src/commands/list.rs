// src/commands/list.rs
//! List stored packages

use crate::cli::UnitArg;
use anyhow::{Context, Result};
use pkgwatch::SyncConfig;
use pkgwatch::db::models::{AppUnit, StoredApp};

pub fn cmd_list(config: &SyncConfig, unit: Option<UnitArg>) -> Result<()> {
    let conn = pkgwatch::db::open(&config.db_path).context("Failed to open package database")?;

    let apps = match unit {
        Some(UnitArg::User) => StoredApp::find_by_unit(&conn, AppUnit::User)?,
        Some(UnitArg::System) => StoredApp::find_by_unit(&conn, AppUnit::System)?,
        Some(UnitArg::Archive) => StoredApp::find_by_unit(&conn, AppUnit::Archive)?,
        None => StoredApp::list_all(&conn)?,
    };

    if apps.is_empty() {
        println!("No packages stored.");
        return Ok(());
    }

    println!("{:50}  {:>12}  {:>8}  {:>15}", "PACKAGE", "VERSION", "UNIT", "UPDATED");
    println!("{}", "-".repeat(92));
    for app in &apps {
        let updated = chrono::DateTime::from_timestamp_millis(app.update_time)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| app.update_time.to_string());
        println!(
            "{:50}  {:>12}  {:>8}  {:>15}",
            app.package_name,
            app.ver_code,
            app.unit.as_str(),
            updated
        );
    }
    println!();
    println!("Total: {} package(s)", apps.len());
    Ok(())
}
