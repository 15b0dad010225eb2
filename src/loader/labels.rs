// src/loader/labels.rs

//! Display label cache

use crate::platform::LabelResolver;
use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Order display names case-insensitively, falling back to exact order
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Resolved labels, keyed by package identifier
pub struct LabelProvider {
    resolver: Arc<dyn LabelResolver>,
    labels: RwLock<HashMap<String, String>>,
    timeout: Duration,
}

impl LabelProvider {
    pub fn new(resolver: Arc<dyn LabelResolver>, timeout: Duration) -> Self {
        Self {
            resolver,
            labels: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn label(&self, name: &str) -> Option<String> {
        self.labels.read().ok()?.get(name).cloned()
    }

    /// Label when it has visible content, the identifier otherwise
    pub fn label_or_pkg(&self, name: &str) -> String {
        match self.label(name) {
            Some(label) if !label.trim().is_empty() => label,
            _ => name.to_string(),
        }
    }

    /// Whether the package shows its identifier instead of a real label
    pub fn looks_unlabeled(&self, name: &str) -> bool {
        let label = self.label_or_pkg(name);
        label == name || label.starts_with(&format!("{name}."))
    }

    /// Compare packages by label, then identifier
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        compare_names(&self.label_or_pkg(a), &self.label_or_pkg(b)).then_with(|| a.cmp(b))
    }

    pub fn put_labels(&self, labels: impl IntoIterator<Item = (String, String)>) {
        if let Ok(mut map) = self.labels.write() {
            map.extend(labels);
        }
    }

    async fn load(&self, name: String) -> Option<(String, String)> {
        let label = tokio::time::timeout(self.timeout, self.resolver.load_label(&name))
            .await
            .ok()
            .flatten()?;
        Some((name, label))
    }

    fn missing(&self, names: &[String]) -> Vec<String> {
        match self.labels.read() {
            Ok(map) => names.iter().filter(|n| !map.contains_key(*n)).cloned().collect(),
            Err(_) => names.to_vec(),
        }
    }

    /// Resolve labels one package at a time
    pub async fn retrieve_sequential(&self, names: &[String]) {
        let mut loaded = Vec::new();
        for name in self.missing(names) {
            if let Some(entry) = self.load(name).await {
                loaded.push(entry);
            }
        }
        self.put_labels(loaded);
    }

    /// Resolve labels with up to `max_concurrent` lookups in flight
    pub async fn retrieve_concurrent(&self, names: &[String], max_concurrent: usize) {
        let loaded: Vec<(String, String)> = stream::iter(self.missing(names))
            .map(|name| self.load(name))
            .buffer_unordered(max_concurrent.max(1))
            .filter_map(|entry| async move { entry })
            .collect()
            .await;
        self.put_labels(loaded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformSnapshot, SnapshotPlatform};

    #[tokio::test]
    async fn test_label_or_pkg() {
        let platform = SnapshotPlatform::new(PlatformSnapshot {
            labels: [
                ("com.a".to_string(), "Alpha".to_string()),
                ("com.blank".to_string(), "  ".to_string()),
                ("com.sub".to_string(), "com.sub.service".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        });
        let provider = LabelProvider::new(Arc::new(platform), Duration::from_secs(1));

        let names: Vec<String> = ["com.a", "com.blank", "com.sub", "com.none"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        provider.retrieve_concurrent(&names, 2).await;

        assert_eq!(provider.label_or_pkg("com.a"), "Alpha");
        assert_eq!(provider.label_or_pkg("com.blank"), "com.blank");
        assert!(provider.looks_unlabeled("com.sub"));
        assert!(provider.looks_unlabeled("com.none"));
        assert!(!provider.looks_unlabeled("com.a"));
    }

    #[test]
    fn test_compare_names_ignores_case() {
        assert_eq!(compare_names("apple", "Banana"), Ordering::Less);
        assert_eq!(compare_names("Apple", "apple"), Ordering::Less);
    }
}
