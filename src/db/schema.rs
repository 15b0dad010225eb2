// src/db/schema.rs

//! Database schema definitions and migrations for pkgwatch
//!
//! This module defines the SQLite schema for the app metadata table and
//! its companions, and provides a migration system to evolve the schema.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Initial schema - Version 1
///
/// - app: last known metadata per installed package
/// - settings: scalar watermarks and cursors
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        -- One row per package identifier
        CREATE TABLE app (
            package_name TEXT PRIMARY KEY NOT NULL,
            ver_name TEXT NOT NULL,
            ver_code INTEGER NOT NULL,
            target_api INTEGER NOT NULL,
            min_api INTEGER NOT NULL,
            api_unit TEXT NOT NULL CHECK(api_unit IN ('user', 'system', 'archive')),
            update_time INTEGER NOT NULL,
            apk_paths TEXT NOT NULL DEFAULT '[]',
            native_libs_retrieved INTEGER NOT NULL DEFAULT 0,
            native_libs TEXT NOT NULL DEFAULT '[]',
            is_launchable INTEGER NOT NULL DEFAULT 0,
            icon_info TEXT
        );

        CREATE INDEX idx_app_unit ON app(api_unit);
        CREATE INDEX idx_app_update_time ON app(update_time);

        -- Scalar preference values
        CREATE TABLE settings (
            key TEXT PRIMARY KEY NOT NULL,
            value INTEGER NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Version 2 - maintenance diff records
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE diff_change (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            diff_id TEXT NOT NULL,
            diff_time INTEGER NOT NULL,
            package_name TEXT NOT NULL,
            change_type TEXT NOT NULL CHECK(change_type IN ('none', 'add', 'remove', 'change')),
            column_name TEXT NOT NULL DEFAULT '',
            old_value TEXT NOT NULL DEFAULT '',
            new_value TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX idx_diff_change_time ON diff_change(diff_time);
        CREATE INDEX idx_diff_change_package ON diff_change(package_name);
        ",
    )?;

    Ok(())
}
