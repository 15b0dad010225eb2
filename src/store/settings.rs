// src/store/settings.rs

//! Scalar settings over the shared store connection

use super::AppStore;
use crate::db::models::Setting;
use crate::error::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<AppStore>,
}

impl SettingsStore {
    pub fn new(store: Arc<AppStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, key: &str) -> Result<Option<i64>> {
        self.store.with_conn(|conn| Setting::get(conn, key))
    }

    /// Read a value, falling back to `default` when unset
    pub fn get_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub fn set(&self, key: &str, value: i64) -> Result<()> {
        self.store.with_conn(|conn| Setting::set(conn, key, value))
    }

    /// Raise a value to `value` if it is larger than the stored one
    ///
    /// Returns the value in effect afterwards.
    pub fn advance(&self, key: &str, value: i64) -> Result<i64> {
        self.store.with_conn(|conn| {
            let current = Setting::get(conn, key)?;
            let next = current.map_or(value, |c| c.max(value));
            if current != Some(next) {
                Setting::set(conn, key, next)?;
            }
            Ok(next)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::setting::LAST_MAINTENANCE_TIME;

    #[test]
    fn test_advance_is_monotonic() {
        let settings = SettingsStore::new(Arc::new(AppStore::open_in_memory().unwrap()));

        assert_eq!(settings.get_or(LAST_MAINTENANCE_TIME, -1).unwrap(), -1);
        assert_eq!(settings.advance(LAST_MAINTENANCE_TIME, 50).unwrap(), 50);
        assert_eq!(settings.advance(LAST_MAINTENANCE_TIME, 40).unwrap(), 50);
        assert_eq!(settings.advance(LAST_MAINTENANCE_TIME, 70).unwrap(), 70);
    }
}
