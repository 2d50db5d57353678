use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// A selector refused this many times in a row is treated as known-dead
/// and skipped without a probe.
const BLOCK_AFTER_FAILURES: u64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelectorRecord {
    pub last_working_selector: String,
    #[serde(default)]
    pub healed_selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainHistory {
    /// original selector -> record of what last worked for it.
    #[serde(default)]
    pub working: HashMap<String, SelectorRecord>,
    /// selector -> consecutive-failure count; `>= BLOCK_AFTER_FAILURES`
    /// selectors are refused up front.
    #[serde(default)]
    pub failed: HashMap<String, u64>,
    #[serde(default)]
    pub last_updated: Option<i64>,
}

impl DomainHistory {
    fn is_blocked(&self, selector: &str) -> bool {
        self.failed.get(selector).is_some_and(|&count| count >= BLOCK_AFTER_FAILURES)
    }
}

/// Per-domain selector history, loaded at startup and written back
/// best-effort on every success/failure. A missing file means "empty
/// history"; a corrupted file logs a warning and is treated as empty.
pub struct HistoryStore {
    path: Option<PathBuf>,
    domains: Mutex<HashMap<String, DomainHistory>>,
}

impl HistoryStore {
    pub fn new(path: Option<impl Into<PathBuf>>) -> Self {
        Self { path: path.map(Into::into), domains: Mutex::new(HashMap::new()) }
    }

    pub async fn load(path: Option<impl Into<PathBuf>>) -> Self {
        let store = Self::new(path);
        store.reload().await;
        store
    }

    async fn reload(&self) {
        let Some(path) = &self.path else { return };
        let Ok(contents) = tokio::fs::read_to_string(path).await else { return };
        match serde_json::from_str::<HashMap<String, DomainHistory>>(&contents) {
            Ok(domains) => {
                #[cfg(feature = "tracing")]
                tracing::info!(target: "qa_healing", domains = domains.len(), "loaded selector history");
                *self.domains.lock().await = domains;
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(target: "qa_healing", error = %_err, "corrupted selector history, starting empty");
            }
        }
    }

    /// Returns the last working selector for `original`, if `domain` has
    /// one recorded and it isn't itself blocked.
    pub async fn last_working(&self, domain: &str, original: &str) -> Option<String> {
        let domains = self.domains.lock().await;
        let history = domains.get(domain)?;
        let record = history.working.get(original)?;
        if history.is_blocked(&record.last_working_selector) {
            return None;
        }
        Some(record.last_working_selector.clone())
    }

    pub async fn is_blocked(&self, domain: &str, selector: &str) -> bool {
        let domains = self.domains.lock().await;
        domains.get(domain).is_some_and(|h| h.is_blocked(selector))
    }

    pub async fn record_success(&self, domain: &str, original: &str, healed: &str, now_unix: i64) {
        {
            let mut domains = self.domains.lock().await;
            let history = domains.entry(domain.to_string()).or_default();
            let record = history.working.entry(original.to_string()).or_default();
            record.last_working_selector = healed.to_string();
            if !record.healed_selectors.iter().any(|s| s == healed) {
                record.healed_selectors.push(healed.to_string());
            }
            history.failed.remove(healed);
            history.last_updated = Some(now_unix);
        }
        self.save().await;
    }

    pub async fn record_failure(&self, domain: &str, selector: &str, now_unix: i64) {
        {
            let mut domains = self.domains.lock().await;
            let history = domains.entry(domain.to_string()).or_default();
            *history.failed.entry(selector.to_string()).or_insert(0) += 1;
            history.last_updated = Some(now_unix);
        }
        self.save().await;
    }

    async fn save(&self) {
        let Some(path) = &self.path else { return };
        let domains = self.domains.lock().await.clone();
        if let Err(_err) = write_history(path, &domains).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(target: "qa_healing", error = %_err, "failed to save selector history");
        }
    }
}

async fn write_history(path: &Path, domains: &HashMap<String, DomainHistory>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(domains).unwrap_or_default();
    tokio::fs::write(path, body).await
}

/// Site-specific selectors known to be permanently broken, independent of
/// any one domain's learned failure history.
pub fn global_known_dead() -> &'static HashSet<&'static str> {
    static SET: std::sync::OnceLock<HashSet<&'static str>> = std::sync::OnceLock::new();
    SET.get_or_init(HashSet::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_empty_history() {
        let store = HistoryStore::load(Some("/nonexistent/path/history.json")).await;
        assert!(store.last_working("example.com", "#old").await.is_none());
    }

    #[tokio::test]
    async fn record_success_then_reload_recovers_last_working_selector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let store = HistoryStore::new(Some(path.clone()));
        store.record_success("example.com", "#old-id", "[data-testid='save']", 1_700_000_000).await;

        let reloaded = HistoryStore::load(Some(path)).await;
        let last = reloaded.last_working("example.com", "#old-id").await;
        assert_eq!(last.as_deref(), Some("[data-testid='save']"));
    }

    #[tokio::test]
    async fn selector_is_blocked_after_repeated_failures() {
        let store = HistoryStore::new(None::<PathBuf>);
        for _ in 0..3 {
            store.record_failure("example.com", ".flaky-legacy-class", 0).await;
        }
        assert!(store.is_blocked("example.com", ".flaky-legacy-class").await);
    }
}
