// src/db/models/app.rs

//! App model - last known metadata for one installed package

use crate::error::{Error, Result};
use crate::packages::PackageRecord;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Classification of a stored app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppUnit {
    User,
    System,
    /// Archived by the platform, code removed but data kept
    Archive,
}

impl AppUnit {
    pub fn as_str(&self) -> &str {
        match self {
            AppUnit::User => "user",
            AppUnit::System => "system",
            AppUnit::Archive => "archive",
        }
    }

    /// Unit for a freshly enumerated record
    pub fn of(record: &PackageRecord) -> Self {
        if record.archived {
            AppUnit::Archive
        } else if record.is_system() {
            AppUnit::System
        } else {
            AppUnit::User
        }
    }
}

impl FromStr for AppUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(AppUnit::User),
            "system" => Ok(AppUnit::System),
            "archive" => Ok(AppUnit::Archive),
            _ => Err(format!("Invalid app unit: {s}")),
        }
    }
}

/// Icon descriptor persisted as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconInfo {
    pub res: i32,
    /// Base package path the icon resource lives in
    pub source: String,
}

/// A row of the `app` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredApp {
    pub package_name: String,
    pub ver_name: String,
    pub ver_code: i64,
    pub target_api: i32,
    pub min_api: i32,
    pub unit: AppUnit,
    pub update_time: i64,
    pub apk_paths: Vec<String>,
    pub native_libs_retrieved: bool,
    pub native_libs: Vec<bool>,
    pub is_launchable: bool,
    pub icon_info: Option<IconInfo>,
}

const COLUMNS: &str = "package_name, ver_name, ver_code, target_api, min_api, api_unit, update_time, apk_paths, native_libs_retrieved, native_libs, is_launchable, icon_info";

impl StoredApp {
    /// Derive a full row from a freshly enumerated record
    ///
    /// Native library flags are not scanned here; the row is marked as not
    /// yet retrieved.
    pub fn derive(record: &PackageRecord) -> Result<Self> {
        let name = record.package_name.as_str();
        if name.is_empty() {
            return Err(Error::corrupt(name, "empty package identifier"));
        }
        if name.contains('/') || name.chars().any(char::is_whitespace) {
            return Err(Error::corrupt(name, "identifier contains illegal characters"));
        }
        if record.last_update_time < 0 {
            return Err(Error::corrupt(
                name,
                format!("negative update time {}", record.last_update_time),
            ));
        }

        let icon_info = (record.icon_res > 0).then(|| IconInfo {
            res: record.icon_res,
            source: record.base_path().to_string(),
        });

        Ok(Self {
            package_name: record.package_name.clone(),
            ver_name: record.version_name.clone(),
            ver_code: record.version_code,
            target_api: record.target_api,
            min_api: record.min_api,
            unit: AppUnit::of(record),
            update_time: record.last_update_time,
            apk_paths: record.apk_paths.clone(),
            native_libs_retrieved: false,
            native_libs: Vec::new(),
            is_launchable: false,
            icon_info,
        })
    }

    /// Base package path, empty when unknown
    pub fn base_path(&self) -> &str {
        self.apk_paths.first().map(String::as_str).unwrap_or("")
    }

    /// Insert this row, replacing any existing row with the same identifier
    pub fn upsert(&self, conn: &Connection) -> Result<()> {
        let apk_paths = serde_json::to_string(&self.apk_paths)?;
        let native_libs = serde_json::to_string(&self.native_libs)?;
        let icon_info = self
            .icon_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            &format!("INSERT OR REPLACE INTO app ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
            params![
                &self.package_name,
                &self.ver_name,
                self.ver_code,
                self.target_api,
                self.min_api,
                self.unit.as_str(),
                self.update_time,
                apk_paths,
                self.native_libs_retrieved,
                native_libs,
                self.is_launchable,
                icon_info,
            ],
        )?;
        Ok(())
    }

    /// Find a row by package identifier
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM app WHERE package_name = ?1"
        ))?;

        let app = stmt.query_row([name], Self::from_row).optional()?;
        Ok(app)
    }

    /// Find rows for several identifiers, in caller order, omitting misses
    pub fn find_many(conn: &Connection, names: &[String]) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM app WHERE package_name = ?1"
        ))?;

        let mut apps = Vec::with_capacity(names.len());
        for name in names {
            if let Some(app) = stmt.query_row([name], Self::from_row).optional()? {
                apps.push(app);
            }
        }
        Ok(apps)
    }

    /// List rows of one unit
    pub fn find_by_unit(conn: &Connection, unit: AppUnit) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM app WHERE api_unit = ?1 ORDER BY package_name"
        ))?;

        let apps = stmt
            .query_map([unit.as_str()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(apps)
    }

    /// List all rows
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM app ORDER BY package_name"
        ))?;

        let apps = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(apps)
    }

    /// Stored update time for one identifier
    pub fn update_time_of(conn: &Connection, name: &str) -> Result<Option<i64>> {
        let time = conn
            .query_row(
                "SELECT update_time FROM app WHERE package_name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(time)
    }

    /// Number of stored rows
    pub fn count(conn: &Connection) -> Result<u64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM app", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Delete one row
    pub fn delete(conn: &Connection, name: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM app WHERE package_name = ?1", [name])?;
        Ok(deleted > 0)
    }

    /// Delete every row whose identifier is not in `keep`
    ///
    /// Returns the identifiers that were deleted.
    pub fn delete_absent(conn: &Connection, keep: &HashSet<&str>) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT package_name FROM app")?;
        let stale: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|name| !keep.contains(name.as_str()))
            .collect();

        let mut delete = conn.prepare("DELETE FROM app WHERE package_name = ?1")?;
        for name in &stale {
            delete.execute([name])?;
        }
        Ok(stale)
    }

    /// Convert a database row to a StoredApp
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let unit_str: String = row.get(5)?;
        let unit = unit_str.parse::<AppUnit>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        let apk_paths: String = row.get(7)?;
        let native_libs: String = row.get(9)?;
        let icon_info: Option<String> = row.get(11)?;

        Ok(Self {
            package_name: row.get(0)?,
            ver_name: row.get(1)?,
            ver_code: row.get(2)?,
            target_api: row.get(3)?,
            min_api: row.get(4)?,
            unit,
            update_time: row.get(6)?,
            apk_paths: parse_json_column(7, &apk_paths)?,
            native_libs_retrieved: row.get(8)?,
            native_libs: parse_json_column(9, &native_libs)?,
            is_launchable: row.get(10)?,
            icon_info: icon_info
                .map(|s| parse_json_column(11, &s))
                .transpose()?,
        })
    }
}

fn parse_json_column<T: serde::de::DeserializeOwned>(idx: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
