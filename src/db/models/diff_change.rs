// src/db/models/diff_change.rs

//! DiffChange model - one event of a maintenance diff pass

use crate::error::Result;
use rusqlite::{Connection, Row, params};
use strum_macros::{AsRefStr, Display, EnumString};

/// Kind of difference between fresh and stored data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DiffType {
    /// Marker row for a pass that found nothing
    None,
    Add,
    Remove,
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffChange {
    pub id: Option<i64>,
    pub diff_id: String,
    pub diff_time: i64,
    pub package_name: String,
    pub change_type: DiffType,
    pub column_name: String,
    pub old_value: String,
    pub new_value: String,
}

impl DiffChange {
    pub fn new(
        diff_id: impl Into<String>,
        diff_time: i64,
        package_name: impl Into<String>,
        change_type: DiffType,
    ) -> Self {
        Self {
            id: None,
            diff_id: diff_id.into(),
            diff_time,
            package_name: package_name.into(),
            change_type,
            column_name: String::new(),
            old_value: String::new(),
            new_value: String::new(),
        }
    }

    /// Attach a changed column with its old and new values
    pub fn with_column(
        mut self,
        column: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        self.column_name = column.into();
        self.old_value = old_value.into();
        self.new_value = new_value.into();
        self
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO diff_change (diff_id, diff_time, package_name, change_type, column_name, old_value, new_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.diff_id,
                self.diff_time,
                &self.package_name,
                self.change_type.as_ref(),
                &self.column_name,
                &self.old_value,
                &self.new_value,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// All rows recorded by one diff pass
    pub fn find_by_diff(conn: &Connection, diff_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, diff_id, diff_time, package_name, change_type, column_name, old_value, new_value
             FROM diff_change WHERE diff_id = ?1 ORDER BY id",
        )?;

        let changes = stmt
            .query_map([diff_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(changes)
    }

    /// Rows recorded at or after `since`, newest first
    pub fn list_since(conn: &Connection, since: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, diff_id, diff_time, package_name, change_type, column_name, old_value, new_value
             FROM diff_change WHERE diff_time >= ?1 ORDER BY diff_time DESC, id",
        )?;

        let changes = stmt
            .query_map([since], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(changes)
    }

    /// Purge `none` marker rows older than `cutoff`
    pub fn delete_empty_before(conn: &Connection, cutoff: i64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM diff_change WHERE change_type = ?1 AND diff_time < ?2",
            params![DiffType::None.as_ref(), cutoff],
        )?;
        Ok(deleted)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let type_str: String = row.get(4)?;
        let change_type = type_str.parse::<DiffType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                )),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            diff_id: row.get(1)?,
            diff_time: row.get(2)?,
            package_name: row.get(3)?,
            change_type,
            column_name: row.get(5)?,
            old_value: row.get(6)?,
            new_value: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_diff_type_strings() {
        assert_eq!(DiffType::Change.as_ref(), "change");
        assert_eq!("remove".parse::<DiffType>().unwrap(), DiffType::Remove);
        assert!("bogus".parse::<DiffType>().is_err());
    }

    #[test]
    fn test_insert_and_purge() {
        let conn = db::open_in_memory().unwrap();

        DiffChange::new("d1", 100, "", DiffType::None)
            .insert(&conn)
            .unwrap();
        DiffChange::new("d2", 500, "com.a", DiffType::Change)
            .with_column("ver_code", "1", "2")
            .insert(&conn)
            .unwrap();

        let rows = DiffChange::find_by_diff(&conn, "d2").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].column_name, "ver_code");
        assert_eq!(rows[0].new_value, "2");

        // Only the marker row is old enough to be purged
        assert_eq!(DiffChange::delete_empty_before(&conn, 1_000).unwrap(), 1);
        assert_eq!(DiffChange::list_since(&conn, 0).unwrap().len(), 1);
    }
}
