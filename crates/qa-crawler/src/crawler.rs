use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use qa_pool::Pool;
use qa_transport::Transport;
use regex::Regex;
use url::Url;

use crate::config::{merge_priority_patterns, CrawlConfig, UrlPriority, BLOCKED_EXTENSIONS};
use crate::discover::{content_fingerprint, detect_authentication_form, discover_forms, discover_urls, page_title, DiscoveredForm};
use crate::error::CrawlerError;
use crate::queue::CrawlQueueItem;

/// Final disposition of one crawled URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Completed,
    Failed,
    Skipped,
}

/// Per-URL crawl outcome, appended to [`CrawlResult::pages_crawled`] (or
/// `_failed`) once the pipeline finishes with it.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub depth: u32,
    pub state: CrawlState,
    pub discovered_urls: Vec<String>,
    pub forms_found: Vec<DiscoveredForm>,
    pub errors: Vec<String>,
    pub crawl_time: Duration,
}

/// Aggregate result of a complete crawl.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub start_url: String,
    pub pages_crawled: Vec<CrawledPage>,
    pub pages_failed: Vec<CrawledPage>,
    pub pages_skipped: Vec<String>,
    pub total_duration: Duration,
    pub urls_discovered: usize,
    pub forms_found: usize,
    pub authentication_detected: bool,
    pub authentication_completed: bool,
    pub coverage_score: f64,
}

/// Priority-queue-driven same-origin crawler: one browser context is held
/// for the whole crawl, reused across every navigated page.
pub struct IntelligentCrawler {
    transport: Transport,
    pool: Arc<Pool>,
    config: CrawlConfig,
    priority_patterns: Vec<(Regex, UrlPriority)>,
    exclude_patterns: Vec<Regex>,
    include_patterns: Vec<Regex>,
}

const USERNAME_SELECTORS: &[&str] =
    &["input[type='email']", "input[name*='user']", "input[name*='email']", "input[id*='user']", "input[id*='email']"];

const AUTH_SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const AUTH_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

impl IntelligentCrawler {
    pub fn new(transport: Transport, pool: Arc<Pool>, config: CrawlConfig) -> Result<Self, CrawlerError> {
        let exclude_patterns = compile_all(&config.exclude_patterns)?;
        let include_patterns = compile_all(&config.include_patterns)?;
        let priority_patterns = merge_priority_patterns(&config.priority_patterns);

        Ok(Self {
            transport,
            pool,
            config,
            priority_patterns,
            exclude_patterns,
            include_patterns,
        })
    }

    /// Runs the crawl starting from `start_url`.
    pub async fn crawl(&self, start_url: &str) -> Result<CrawlResult, CrawlerError> {
        if start_url.is_empty() {
            return Err(CrawlerError::MissingStartUrl);
        }
        let seed = Url::parse(start_url).map_err(CrawlerError::InvalidStartUrl)?;
        let base_domain = seed.host_str().unwrap_or_default().to_string();
        let base_scheme = seed.scheme().to_string();

        let start = Instant::now();
        let sequence = AtomicU64::new(0);

        let mut queue: BinaryHeap<CrawlQueueItem> = BinaryHeap::new();
        let mut visited_urls: HashSet<String> = HashSet::new();
        let mut visited_hashes: HashSet<u64> = HashSet::new();
        let mut crawled_pages = Vec::new();
        let mut failed_pages = Vec::new();
        let mut skipped_urls = Vec::new();
        let mut urls_discovered = 0usize;
        let mut forms_found = 0usize;
        let mut auth_detected = false;
        let mut auth_completed = false;
        let mut last_request: Option<Instant> = None;

        enqueue(
            &mut queue,
            &visited_urls,
            &self.config,
            &self.exclude_patterns,
            &self.include_patterns,
            &base_domain,
            &base_scheme,
            start_url,
            UrlPriority::High,
            0,
            None,
            &sequence,
        );

        let guard = self.pool.acquire(Some("crawler".to_string()), Some("crawler".to_string())).await.map_err(|e| CrawlerError::PoolFailure(e.into()))?;
        let context_id = guard.remote_id().to_string();

        while let Some(mut item) = queue.pop() {
            if should_stop(crawled_pages.len(), &self.config, start) {
                break;
            }

            let Ok(parsed) = Url::parse(&item.url) else { continue };
            let normalized = crate::normalize::normalize_url(&parsed);
            if visited_urls.contains(&normalized) {
                continue;
            }

            apply_rate_limit(&mut last_request, self.config.rate_limit).await;

            let page = self.crawl_page(&context_id, &item, &base_domain, &base_scheme, &mut visited_hashes).await;

            match page.state {
                CrawlState::Completed => {
                    urls_discovered += page.discovered_urls.len();
                    forms_found += page.forms_found.len();
                    if detect_authentication_form(&page.forms_found) {
                        auth_detected = true;
                        if self.config.authentication.is_some() {
                            auth_completed = self.handle_authentication(&context_id).await;
                        }
                    }

                    for url in &page.discovered_urls {
                        let priority = self.determine_priority(url);
                        enqueue(
                            &mut queue,
                            &visited_urls,
                            &self.config,
                            &self.exclude_patterns,
                            &self.include_patterns,
                            &base_domain,
                            &base_scheme,
                            url,
                            priority,
                            item.depth + 1,
                            Some(item.url.clone()),
                            &sequence,
                        );
                    }

                    visited_urls.insert(normalized);
                    crawled_pages.push(page);
                }
                CrawlState::Failed => {
                    if item.retry_count < self.config.max_retries {
                        item.retry_count += 1;
                        queue.push(item);
                    } else {
                        failed_pages.push(page);
                    }
                }
                CrawlState::Skipped => {
                    skipped_urls.push(item.url.clone());
                }
            }
        }

        guard.release().await;

        let coverage_score = calculate_coverage_score(&crawled_pages, forms_found, auth_detected, auth_completed, &self.config);

        Ok(CrawlResult {
            start_url: start_url.to_string(),
            pages_crawled: crawled_pages,
            pages_failed: failed_pages,
            pages_skipped: skipped_urls,
            total_duration: start.elapsed(),
            urls_discovered,
            forms_found,
            authentication_detected: auth_detected,
            authentication_completed: auth_completed,
            coverage_score,
        })
    }

    async fn crawl_page(
        &self,
        context_id: &str,
        item: &CrawlQueueItem,
        base_domain: &str,
        base_scheme: &str,
        visited_hashes: &mut HashSet<u64>,
    ) -> CrawledPage {
        let start = Instant::now();
        let mut page = CrawledPage {
            url: item.url.clone(),
            final_url: item.url.clone(),
            title: String::new(),
            depth: item.depth,
            state: CrawlState::Failed,
            discovered_urls: Vec::new(),
            forms_found: Vec::new(),
            errors: Vec::new(),
            crawl_time: Duration::ZERO,
        };

        if let Err(err) = self.navigate(context_id, &item.url).await {
            page.errors.push(err.to_string());
            page.crawl_time = start.elapsed();
            return page;
        }

        tokio::time::sleep(self.config.wait_after_navigation).await;

        let final_url = self.current_url(context_id).await.unwrap_or_else(|| item.url.clone());
        page.final_url = final_url.clone();

        let html = match self.page_html(context_id).await {
            Some(html) => html,
            None => {
                page.errors.push("failed to read page HTML".to_string());
                page.crawl_time = start.elapsed();
                return page;
            }
        };

        // Duplicate-content check happens before title/URL/form extraction:
        // a repeat page contributes nothing new to the crawl.
        if !visited_hashes.insert(content_fingerprint(&html)) {
            page.state = CrawlState::Skipped;
            page.crawl_time = start.elapsed();
            return page;
        }

        page.title = page_title(&html).unwrap_or_else(|| "Untitled".to_string());

        let Ok(base) = Url::parse(&final_url) else {
            page.errors.push(format!("final URL is not parseable: {final_url}"));
            page.crawl_time = start.elapsed();
            return page;
        };

        page.discovered_urls = discover_urls(&html, &base)
            .into_iter()
            .filter(|url| {
                Url::parse(url)
                    .is_ok_and(|parsed| should_crawl_url(&parsed, &self.config, &self.exclude_patterns, &self.include_patterns, base_domain, base_scheme))
            })
            .collect();
        page.forms_found = discover_forms(&html, &final_url);
        page.state = CrawlState::Completed;
        page.crawl_time = start.elapsed();
        page
    }

    async fn navigate(&self, context_id: &str, url: &str) -> Result<(), qa_transport::TransportError> {
        let mut params = serde_json::Map::new();
        params.insert("context_id".to_string(), serde_json::Value::String(context_id.to_string()));
        params.insert("url".to_string(), serde_json::Value::String(url.to_string()));
        params.insert("timeout_ms".to_string(), serde_json::Value::from(self.config.navigation_timeout.as_millis() as u64));
        self.transport.execute_tool("navigate", params).await.map(|_| ())
    }

    async fn current_url(&self, context_id: &str) -> Option<String> {
        let mut params = serde_json::Map::new();
        params.insert("context_id".to_string(), serde_json::Value::String(context_id.to_string()));
        let result = self.transport.execute_tool("getCurrentURL", params).await.ok().flatten()?;
        extract_string(&result, &["url", "current_url", "currentUrl"])
    }

    async fn page_html(&self, context_id: &str) -> Option<String> {
        let mut params = serde_json::Map::new();
        params.insert("context_id".to_string(), serde_json::Value::String(context_id.to_string()));
        let result = self.transport.execute_tool("getHTML", params).await.ok().flatten()?;
        extract_string(&result, &["html", "content"])
    }

    async fn handle_authentication(&self, context_id: &str) -> bool {
        let Some(creds) = &self.config.authentication else { return false };
        if creds.username.is_empty() || creds.password.is_empty() {
            return false;
        }

        let mut typed_username = false;
        for selector in USERNAME_SELECTORS {
            if self.type_into(context_id, selector, &creds.username).await.is_ok() {
                typed_username = true;
                break;
            }
        }
        if !typed_username {
            return false;
        }

        if self.type_into(context_id, "input[type='password']", &creds.password).await.is_err() {
            return false;
        }

        let before_submit = self.current_url(context_id).await;
        let mut params = serde_json::Map::new();
        params.insert("context_id".to_string(), serde_json::Value::String(context_id.to_string()));
        params.insert("selector".to_string(), serde_json::Value::String("button[type='submit'], input[type='submit']".to_string()));
        if self.transport.execute_tool("click", params).await.is_err() {
            return false;
        }

        self.wait_for_url_change(context_id, before_submit.as_deref()).await;
        true
    }

    async fn type_into(&self, context_id: &str, selector: &str, text: &str) -> Result<(), qa_transport::TransportError> {
        let mut params = serde_json::Map::new();
        params.insert("context_id".to_string(), serde_json::Value::String(context_id.to_string()));
        params.insert("selector".to_string(), serde_json::Value::String(selector.to_string()));
        params.insert("text".to_string(), serde_json::Value::String(text.to_string()));
        self.transport.execute_tool("type", params).await.map(|_| ())
    }

    /// Bounded condition wait on URL change after submitting credentials,
    /// replacing a fixed post-submit sleep.
    async fn wait_for_url_change(&self, context_id: &str, before: Option<&str>) {
        let deadline = Instant::now() + AUTH_SETTLE_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(current) = self.current_url(context_id).await
                && Some(current.as_str()) != before
            {
                return;
            }
            tokio::time::sleep(AUTH_SETTLE_POLL_INTERVAL).await;
        }
    }

    fn determine_priority(&self, url: &str) -> UrlPriority {
        self.priority_patterns.iter().find(|(pattern, _)| pattern.is_match(url)).map(|(_, priority)| *priority).unwrap_or(UrlPriority::Medium)
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, CrawlerError> {
    patterns.iter().map(|p| Regex::new(&format!("(?i){p}")).map_err(|e| CrawlerError::InvalidPattern(format!("{p}: {e}")))).collect()
}

#[allow(clippy::too_many_arguments)]
fn should_crawl_url(url: &Url, config: &CrawlConfig, exclude: &[Regex], include: &[Regex], base_domain: &str, base_scheme: &str) -> bool {
    let _ = base_scheme;
    if config.same_domain_only && url.host_str().unwrap_or_default() != base_domain {
        return false;
    }
    if exclude.iter().any(|p| p.is_match(url.as_str())) {
        return false;
    }
    if !include.is_empty() && !include.iter().any(|p| p.is_match(url.as_str())) {
        return false;
    }
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let lower = url.as_str().to_lowercase();
    if BLOCKED_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{ext}"))) {
        return false;
    }
    true
}

#[allow(clippy::too_many_arguments)]
fn enqueue(
    queue: &mut BinaryHeap<CrawlQueueItem>,
    visited: &HashSet<String>,
    config: &CrawlConfig,
    exclude: &[Regex],
    include: &[Regex],
    base_domain: &str,
    base_scheme: &str,
    url: &str,
    priority: UrlPriority,
    depth: u32,
    parent: Option<String>,
    sequence: &AtomicU64,
) {
    let Ok(parsed) = Url::parse(url) else { return };
    let normalized = crate::normalize::normalize_url(&parsed);
    if visited.contains(&normalized) {
        return;
    }
    if depth > config.max_depth {
        return;
    }
    if !should_crawl_url(&parsed, config, exclude, include, base_domain, base_scheme) {
        return;
    }
    let seq = sequence.fetch_add(1, Ordering::Relaxed);
    queue.push(CrawlQueueItem::new(url, priority, depth, parent, seq));
}

fn should_stop(crawled_count: usize, config: &CrawlConfig, start: Instant) -> bool {
    if crawled_count >= config.max_pages {
        return true;
    }
    start.elapsed() >= Duration::from_secs(config.max_duration_seconds)
}

async fn apply_rate_limit(last_request: &mut Option<Instant>, rate_limit: Duration) {
    if let Some(last) = *last_request {
        let elapsed = last.elapsed();
        if elapsed < rate_limit {
            tokio::time::sleep(rate_limit - elapsed).await;
        }
    }
    *last_request = Some(Instant::now());
}

fn calculate_coverage_score(pages: &[CrawledPage], forms_found: usize, auth_detected: bool, auth_completed: bool, config: &CrawlConfig) -> f64 {
    if pages.is_empty() {
        return 0.0;
    }

    let pages_factor = (pages.len() as f64 / config.max_pages as f64).min(1.0);
    let max_depth_reached = pages.iter().map(|p| p.depth).max().unwrap_or(0);
    let depth_factor = (max_depth_reached as f64 / config.max_depth as f64).min(1.0);
    let form_factor = if forms_found > 0 { (forms_found as f64 / 10.0).min(1.0) } else { 0.0 };
    let auth_factor = if !auth_detected || auth_completed { 1.0 } else { 0.5 };

    let coverage = 0.4 * pages_factor + 0.3 * depth_factor + 0.2 * form_factor + 0.1 * auth_factor;
    (coverage * 1000.0).round() / 1000.0
}

fn extract_string(value: &serde_json::Value, keys: &[&str]) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(obj) => keys.iter().find_map(|k| obj.get(*k)).and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}
