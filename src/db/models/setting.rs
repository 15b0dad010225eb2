// src/db/models/setting.rs

//! Scalar settings - watermarks and cursors keyed by name

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, params};

/// Persisted watermark of the updates session
pub const PACKAGE_CHANGED_TIMESTAMP: &str = "package_changed_timestamp";
/// Time of the last successful maintenance update
pub const LAST_MAINTENANCE_TIME: &str = "last_maintenance_time";
/// Time of the last maintenance diff pass
pub const PACKAGE_CHANGED_DIFF_TIME: &str = "package_changed_diff_time";
/// Changed-package sequence cursor
pub const PACKAGE_CHANGED_SEQUENCE_NO: &str = "package_changed_sequence_no";
/// Boot count the sequence cursor belongs to
pub const PACKAGE_CHANGED_BOOT_COUNT: &str = "package_changed_boot_count";

pub struct Setting;

impl Setting {
    /// Read a value
    pub fn get(conn: &Connection, key: &str) -> Result<Option<i64>> {
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a value, replacing any previous one
    pub fn set(conn: &Connection, key: &str, value: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a value
    pub fn delete(conn: &Connection, key: &str) -> Result<()> {
        conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }
}
