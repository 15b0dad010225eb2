// src/updates/used.rs

//! Recently used packages

use crate::platform::{LauncherResolver, UsageStatsSource};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::warn;

/// Packages that never count as "recently used"
const KNOWN_EXCLUSIONS: [&str; 3] = [
    "android",
    // Instant apps share this package name
    "android.instant_app",
    "com.google.android.permissioncontroller",
];

pub struct UsedPackages {
    usage: Arc<dyn UsageStatsSource>,
    launcher: Arc<dyn LauncherResolver>,
    self_package: String,
    window_ms: i64,
    limit: usize,
    timeout: Duration,
    exclusions: OnceCell<HashSet<String>>,
}

impl UsedPackages {
    pub fn new(
        usage: Arc<dyn UsageStatsSource>,
        launcher: Arc<dyn LauncherResolver>,
        self_package: impl Into<String>,
        window_ms: i64,
        limit: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            usage,
            launcher,
            self_package: self_package.into(),
            window_ms,
            limit,
            timeout,
            exclusions: OnceCell::new(),
        }
    }

    /// Self, platform packages and the default home app; resolved once
    async fn exclusions(&self) -> &HashSet<String> {
        self.exclusions
            .get_or_init(|| async {
                let mut set: HashSet<String> =
                    KNOWN_EXCLUSIONS.iter().map(|s| s.to_string()).collect();
                set.insert(self.self_package.clone());
                match tokio::time::timeout(self.timeout, self.launcher.resolve_default_launcher()).await {
                    Ok(Some(launcher)) => {
                        set.insert(launcher);
                    }
                    Ok(None) => {}
                    Err(_) => warn!("Resolving the default launcher timed out"),
                }
                set
            })
            .await
    }

    /// Most recently used packages, newest first
    ///
    /// An unavailable usage source yields an empty list.
    pub async fn get(&self) -> Vec<String> {
        let entries = match tokio::time::timeout(
            self.timeout,
            self.usage.query_recently_used(self.window_ms),
        )
        .await
        {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!("Usage statistics unavailable: {}", e);
                return Vec::new();
            }
            Err(_) => {
                warn!("Usage statistics query timed out");
                return Vec::new();
            }
        };

        let mut entries: Vec<_> = entries.into_iter().filter(|e| e.last_used > 0).collect();
        entries.sort_by(|a, b| b.last_used.cmp(&a.last_used));

        let exclusions = self.exclusions().await;
        let mut seen = HashSet::new();
        entries
            .into_iter()
            .map(|e| e.package_name)
            .filter(|name| !exclusions.contains(name))
            .filter(|name| seen.insert(name.clone()))
            .take(self.limit)
            .collect()
    }
}
