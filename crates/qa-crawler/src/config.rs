use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use derive_builder::Builder;
use regex::Regex;

/// Crawl priority for a URL; lower sorts first in the crawl queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum UrlPriority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
    Deferred = 5,
}

/// Default regex source strings, in priority-table declaration order. Kept
/// as raw strings (rather than only compiled) so user-supplied patterns can
/// override a default entry by matching its source string.
pub const DEFAULT_PRIORITY_PATTERN_SOURCES: &[(&str, UrlPriority)] = &[
    (r"(login|signin|sign-in|auth)", UrlPriority::Critical),
    (r"(checkout|payment|purchase)", UrlPriority::Critical),
    (r"(register|signup|sign-up)", UrlPriority::Critical),
    (r"(dashboard|admin|account)", UrlPriority::High),
    (r"(home|index|main)", UrlPriority::High),
    (r"(search|product|item)", UrlPriority::Medium),
    (r"(about|contact|help|faq)", UrlPriority::Low),
    (r"(terms|privacy|legal)", UrlPriority::Deferred),
    (r"\.(pdf|doc|zip|exe)$", UrlPriority::Deferred),
];

/// Default regex -> priority table, checked in declaration order before any
/// user-supplied patterns.
pub static DEFAULT_PRIORITY_PATTERNS: LazyLock<Vec<(Regex, UrlPriority)>> = LazyLock::new(|| {
    DEFAULT_PRIORITY_PATTERN_SOURCES
        .iter()
        .map(|(pattern, priority)| (Regex::new(&format!("(?i){pattern}")).expect("static pattern compiles"), *priority))
        .collect()
});

/// Merges `user` patterns into the default table: a user pattern whose
/// source string matches a default entry overrides that entry's priority
/// in place; any other user pattern is appended.
pub fn merge_priority_patterns(user: &HashMap<String, UrlPriority>) -> Vec<(Regex, UrlPriority)> {
    let mut merged: Vec<(String, UrlPriority)> =
        DEFAULT_PRIORITY_PATTERN_SOURCES.iter().map(|(pattern, priority)| (pattern.to_string(), *priority)).collect();

    for (pattern, priority) in user {
        if let Some(entry) = merged.iter_mut().find(|(existing, _)| existing == pattern) {
            entry.1 = *priority;
        } else {
            merged.push((pattern.clone(), *priority));
        }
    }

    merged
        .into_iter()
        .filter_map(|(pattern, priority)| Regex::new(&format!("(?i){pattern}")).ok().map(|re| (re, priority)))
        .collect()
}

/// Extensions never crawled regardless of include/exclude patterns.
pub const BLOCKED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "zip", "exe", "dmg"];

/// Credentials supplied for authentication-flow handling.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Bounds and rules for a single crawl.
#[derive(Clone, Builder)]
#[builder(
    name = "CrawlConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct CrawlConfig {
    #[builder(default = "3")]
    pub max_depth: u32,
    #[builder(default = "50")]
    pub max_pages: usize,
    #[builder(default = "300")]
    pub max_duration_seconds: u64,
    #[builder(default = "true")]
    pub same_domain_only: bool,
    #[builder(default = "Duration::from_millis(500)")]
    pub rate_limit: Duration,
    #[builder(default = "Duration::from_secs(30)")]
    pub navigation_timeout: Duration,
    #[builder(default = "Duration::from_millis(2000)")]
    pub wait_after_navigation: Duration,
    #[builder(default = "2")]
    pub max_retries: u32,
    #[builder(default)]
    pub exclude_patterns: Vec<String>,
    #[builder(default)]
    pub include_patterns: Vec<String>,
    /// Overrides/extends [`DEFAULT_PRIORITY_PATTERNS`]; checked before the
    /// default table.
    #[builder(default)]
    pub priority_patterns: HashMap<String, UrlPriority>,
    #[builder(default, setter(strip_option))]
    pub authentication: Option<Credentials>,
}

impl std::fmt::Debug for CrawlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlConfig")
            .field("max_depth", &self.max_depth)
            .field("max_pages", &self.max_pages)
            .field("max_duration_seconds", &self.max_duration_seconds)
            .field("same_domain_only", &self.same_domain_only)
            .field("rate_limit", &self.rate_limit)
            .field("navigation_timeout", &self.navigation_timeout)
            .field("wait_after_navigation", &self.wait_after_navigation)
            .field("max_retries", &self.max_retries)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("include_patterns", &self.include_patterns)
            .field("priority_patterns", &self.priority_patterns)
            .field("authentication", &self.authentication.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CrawlConfigBuilder {
    fn validate_config(&self) -> Result<(), String> {
        if self.max_pages.unwrap_or(50) == 0 {
            return Err("max_pages must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl CrawlConfig {
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder::default()
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 50,
            max_duration_seconds: 300,
            same_domain_only: true,
            rate_limit: Duration::from_millis(500),
            navigation_timeout: Duration::from_secs(30),
            wait_after_navigation: Duration::from_millis(2000),
            max_retries: 2,
            exclude_patterns: Vec::new(),
            include_patterns: Vec::new(),
            priority_patterns: HashMap::new(),
            authentication: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_max_pages() {
        let result = CrawlConfig::builder().with_max_pages(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn default_priority_table_matches_login_before_generic_patterns() {
        let (_, priority) = DEFAULT_PRIORITY_PATTERNS.iter().find(|(re, _)| re.is_match("https://example.com/login")).unwrap();
        assert_eq!(*priority, UrlPriority::Critical);
    }

    #[test]
    fn user_pattern_overrides_default_entry_with_same_source() {
        let mut overrides = HashMap::new();
        overrides.insert(r"(login|signin|sign-in|auth)".to_string(), UrlPriority::Low);
        let merged = merge_priority_patterns(&overrides);
        let (_, priority) = merged.iter().find(|(re, _)| re.is_match("https://example.com/login")).unwrap();
        assert_eq!(*priority, UrlPriority::Low);
    }

    #[test]
    fn novel_user_pattern_is_appended() {
        let mut extra = HashMap::new();
        extra.insert("billing".to_string(), UrlPriority::Critical);
        let merged = merge_priority_patterns(&extra);
        assert!(merged.iter().any(|(re, p)| re.is_match("https://example.com/billing") && *p == UrlPriority::Critical));
    }
}
