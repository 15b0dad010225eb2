// src/updates/session.rs

//! Two-timestamp updates session
//!
//! The persisted watermark records when changes were last taken in. A
//! consumer supplies a logical session timestamp with every check; only
//! when that timestamp moves to a new session is the watermark advanced.
//! Repeated checks within one session compare against the same point, so
//! polling never re-walks history.

use super::detector::{PackageChanges, PackageUpdateDetector};
use crate::clock::Clock;
use crate::db::models::setting::PACKAGE_CHANGED_TIMESTAMP;
use crate::error::Result;
use crate::packages::PackageRecord;
use crate::store::SettingsStore;
use std::sync::Arc;
use tracing::debug;

/// Watermark value before anything was ever recorded
pub const UNSET_TIMESTAMP: i64 = -1;

/// Per-consumer session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatesSession {
    /// Point changes are compared against, set at a session boundary
    pub app_timestamp: i64,
    /// Logical timestamp of the current session
    pub session_timestamp: i64,
    pub last_retrieval_time: i64,
    pub second_last_retrieval_time: i64,
    /// Non-zero only during the very first session in the store's lifetime
    pub new_app_timestamp: i64,
    pub is_brand_new_session: bool,
}

impl UpdatesSession {
    /// Whether a fixed look-back window is shown instead of real history
    pub fn is_new_app(&self) -> bool {
        self.new_app_timestamp > 0
    }

    pub fn is_new_session(&self, main_timestamp: i64) -> bool {
        self.session_timestamp == 0 || self.session_timestamp != main_timestamp
    }
}

/// Detects changed packages for successive checks of one consumer
pub struct ChangeTracker {
    session: UpdatesSession,
    settings: SettingsStore,
    detector: PackageUpdateDetector,
    clock: Arc<dyn Clock>,
    look_back_ms: i64,
}

impl ChangeTracker {
    pub fn new(
        settings: SettingsStore,
        detector: PackageUpdateDetector,
        clock: Arc<dyn Clock>,
        look_back_ms: i64,
    ) -> Self {
        Self {
            session: UpdatesSession::default(),
            settings,
            detector,
            clock,
            look_back_ms,
        }
    }

    pub fn session(&self) -> &UpdatesSession {
        &self.session
    }

    /// Detect changes in `all` for the session identified by `main_timestamp`
    pub fn changed_packages(
        &mut self,
        main_timestamp: i64,
        all: &[PackageRecord],
    ) -> Result<PackageChanges> {
        let session = &mut self.session;
        let mut watermark = self.settings.get_or(PACKAGE_CHANGED_TIMESTAMP, UNSET_TIMESTAMP)?;

        if watermark == UNSET_TIMESTAMP {
            // First observation ever; stays a new-app session until reopened
            session.new_app_timestamp = self.clock.now_millis();
        } else if main_timestamp > session.new_app_timestamp {
            session.new_app_timestamp = 0;
        }
        if session.is_new_app() {
            watermark = self.clock.now_millis() - self.look_back_ms;
        }

        let is_valid = watermark < main_timestamp;
        // A logical timestamp older than the current session never opens a new one
        let regressed = session.session_timestamp != 0 && main_timestamp < session.session_timestamp;
        session.is_brand_new_session = session.is_new_session(main_timestamp) && is_valid && !regressed;

        let now = self.clock.now_millis();
        session.second_last_retrieval_time = session.last_retrieval_time;
        session.last_retrieval_time = now;

        if session.is_brand_new_session {
            let changes = self.detector.detect_changes(all, watermark);
            self.settings.set(PACKAGE_CHANGED_TIMESTAMP, now)?;
            session.app_timestamp = watermark;
            session.session_timestamp = main_timestamp;
            debug!("New updates session {} from {}", main_timestamp, watermark);
            Ok(changes)
        } else {
            Ok(self.detector.detect_changes(all, session.app_timestamp))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{AppStore, SafeAppStore};

    const DAY: i64 = 86_400_000;

    fn tracker(clock: Arc<ManualClock>) -> (SettingsStore, ChangeTracker) {
        let store = Arc::new(AppStore::open_in_memory().unwrap());
        let settings = SettingsStore::new(store.clone());
        let detector = PackageUpdateDetector::new(SafeAppStore::new(store));
        let tracker = ChangeTracker::new(settings.clone(), detector, clock, 7 * DAY);
        (settings, tracker)
    }

    #[test]
    fn test_first_run_uses_look_back_window() {
        let now = 2_000_000_000_000;
        let clock = Arc::new(ManualClock::new(now));
        let (settings, mut tracker) = tracker(clock);

        tracker.changed_packages(now - 10, &[]).unwrap();
        // Watermark (now - 7d) < main, and no session yet
        assert!(tracker.session().is_brand_new_session);
        assert!(tracker.session().is_new_app());
        assert_eq!(tracker.session().app_timestamp, now - 7 * DAY);
        assert_eq!(settings.get(PACKAGE_CHANGED_TIMESTAMP).unwrap(), Some(now));
    }

    #[test]
    fn test_same_session_keeps_watermark() {
        let start = 2_000_000_000_000;
        let clock = Arc::new(ManualClock::new(start));
        let (settings, mut tracker) = tracker(clock.clone());
        settings.set(PACKAGE_CHANGED_TIMESTAMP, start - DAY).unwrap();

        let main = start + 5;
        tracker.changed_packages(main, &[]).unwrap();
        let first = tracker.session().app_timestamp;
        assert_eq!(first, start - DAY);

        clock.advance(60_000);
        tracker.changed_packages(main, &[]).unwrap();
        assert!(!tracker.session().is_brand_new_session);
        assert_eq!(tracker.session().app_timestamp, first);
        assert_eq!(tracker.session().second_last_retrieval_time, start);
        assert_eq!(tracker.session().last_retrieval_time, start + 60_000);
    }

    #[test]
    fn test_next_session_advances_watermark() {
        let start = 2_000_000_000_000;
        let clock = Arc::new(ManualClock::new(start));
        let (settings, mut tracker) = tracker(clock.clone());
        settings.set(PACKAGE_CHANGED_TIMESTAMP, start - DAY).unwrap();

        tracker.changed_packages(start, &[]).unwrap();

        clock.advance(DAY);
        tracker.changed_packages(start + DAY, &[]).unwrap();
        assert!(tracker.session().is_brand_new_session);
        // The watermark persisted at the first boundary
        assert_eq!(tracker.session().app_timestamp, start);
        assert_eq!(tracker.session().session_timestamp, start + DAY);
    }

    #[test]
    fn test_regressed_timestamp_is_not_a_boundary() {
        let start = 2_000_000_000_000;
        let clock = Arc::new(ManualClock::new(start));
        let (settings, mut tracker) = tracker(clock.clone());
        settings.set(PACKAGE_CHANGED_TIMESTAMP, start - 2 * DAY).unwrap();

        tracker.changed_packages(start, &[]).unwrap();
        let app_timestamp = tracker.session().app_timestamp;

        clock.advance(1_000);
        tracker.changed_packages(start - DAY, &[]).unwrap();
        assert!(!tracker.session().is_brand_new_session);
        assert_eq!(tracker.session().app_timestamp, app_timestamp);
        assert_eq!(tracker.session().session_timestamp, start);
    }
}
