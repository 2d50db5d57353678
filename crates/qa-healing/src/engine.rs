use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use qa_transport::Transport;
use tokio::sync::Mutex;

use crate::candidates::{attribute_fallback_candidates, attribute_fuzzy_candidates, css_variation_candidates, text_match_candidates, xpath_fallback_candidates};
use crate::history::{HistoryStore, global_known_dead};
use crate::parse::extract_text_hint;
use crate::strategy::{HealingResult, HealingStrategy, SelectorCandidate};

const MAX_CANDIDATES: usize = 15;
const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;
const CACHE_CONFIDENCE: f64 = 0.98;
const PERSISTED_CONFIDENCE: f64 = 0.95;

/// Deterministic, history-backed engine that resolves a failing selector
/// to a working alternative without any LLM involvement.
pub struct SelfHealingEngine {
    transport: Transport,
    history: HistoryStore,
    cache: Mutex<HashMap<String, String>>,
    min_confidence: f64,
    enable_learning: bool,
}

impl SelfHealingEngine {
    /// Creates an engine with no persisted history (or a not-yet-loaded
    /// one); prefer [`SelfHealingEngine::load`] when `history_path` should
    /// be read from disk at startup.
    pub fn new(transport: Transport, history_path: Option<PathBuf>) -> Self {
        Self {
            transport,
            history: HistoryStore::new(history_path),
            cache: Mutex::new(HashMap::new()),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            enable_learning: true,
        }
    }

    /// Creates an engine and loads `history_path` from disk, if present.
    pub async fn load(transport: Transport, history_path: Option<PathBuf>) -> Self {
        Self {
            transport,
            history: HistoryStore::load(history_path).await,
            cache: Mutex::new(HashMap::new()),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            enable_learning: true,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_learning(mut self, enable: bool) -> Self {
        self.enable_learning = enable;
        self
    }

    /// Attempts to heal `original_selector` against `context_remote_id`,
    /// scoped to `domain` for history lookups.
    pub async fn heal(
        &self,
        domain: &str,
        context_remote_id: &str,
        original_selector: &str,
        element_description: Option<&str>,
    ) -> HealingResult {
        let start = Instant::now();

        if let Some(cached) = self.cache.lock().await.get(original_selector).cloned()
            && self.probe(context_remote_id, &cached).await
        {
            return self.success(original_selector, cached, HealingStrategy::CachedHistory, CACHE_CONFIDENCE, 0, start.elapsed(), domain).await;
        }

        if let Some(persisted) = self.history.last_working(domain, original_selector).await
            && persisted != original_selector
            && self.probe(context_remote_id, &persisted).await
        {
            return self
                .success(original_selector, persisted, HealingStrategy::CachedHistory, PERSISTED_CONFIDENCE, 0, start.elapsed(), domain)
                .await;
        }

        let mut candidates = self.generate_candidates(original_selector, element_description);
        candidates = self.drop_blocked(domain, candidates).await;
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(MAX_CANDIDATES);
        let evaluated = candidates.len();

        for candidate in candidates {
            if candidate.confidence < self.min_confidence {
                continue;
            }
            if self.probe(context_remote_id, &candidate.selector).await {
                return self
                    .success(original_selector, candidate.selector, candidate.strategy, candidate.confidence, evaluated, start.elapsed(), domain)
                    .await;
            }
        }

        if self.enable_learning {
            self.history.record_failure(domain, original_selector, now_unix()).await;
        }

        HealingResult::failure(original_selector, evaluated, start.elapsed())
    }

    async fn success(
        &self,
        original: &str,
        healed: String,
        strategy: HealingStrategy,
        confidence: f64,
        evaluated: usize,
        elapsed: Duration,
        domain: &str,
    ) -> HealingResult {
        if self.enable_learning {
            self.history.record_success(domain, original, &healed, now_unix()).await;
            self.cache.lock().await.insert(original.to_string(), healed.clone());
        }
        HealingResult {
            success: true,
            original_selector: original.to_string(),
            healed_selector: Some(healed),
            strategy_used: Some(strategy),
            confidence,
            candidates_evaluated: evaluated,
            healing_time: elapsed,
            error: None,
        }
    }

    fn generate_candidates(&self, original: &str, element_description: Option<&str>) -> Vec<SelectorCandidate> {
        let mut candidates = attribute_fallback_candidates(original);

        let text_hint = element_description.map(str::to_string).or_else(|| extract_text_hint(original));
        if let Some(hint) = text_hint {
            candidates.extend(text_match_candidates(&hint));
        }

        candidates.extend(attribute_fuzzy_candidates(original));
        candidates.extend(xpath_fallback_candidates(original));
        candidates.extend(css_variation_candidates(original));
        candidates
    }

    async fn drop_blocked(&self, domain: &str, candidates: Vec<SelectorCandidate>) -> Vec<SelectorCandidate> {
        let dead = global_known_dead();
        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if dead.contains(candidate.selector.as_str()) {
                continue;
            }
            if self.history.is_blocked(domain, &candidate.selector).await {
                continue;
            }
            kept.push(candidate);
        }
        kept
    }

    async fn probe(&self, context_remote_id: &str, selector: &str) -> bool {
        let mut params = serde_json::Map::new();
        params.insert("context_id".to_string(), serde_json::Value::String(context_remote_id.to_string()));
        params.insert("selector".to_string(), serde_json::Value::String(selector.to_string()));
        match self.transport.execute_tool("isVisible", params).await {
            Ok(Some(serde_json::Value::Object(obj))) => obj.get("visible").and_then(|v| v.as_bool()).unwrap_or(false),
            Ok(Some(serde_json::Value::Bool(visible))) => visible,
            _ => false,
        }
    }
}

fn now_unix() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
mod tests {
    use qa_transport::RemoteConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn transport_against(server: &MockServer) -> Transport {
        let config = RemoteConfig::builder().with_base_url(server.uri()).with_max_concurrent(4usize).build().unwrap();
        Transport::new(config).unwrap()
    }

    async fn mock_visible(server: &MockServer, selector: &str, visible: bool) {
        Mock::given(method("POST"))
            .and(path("/execute/browser_is_visible"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({"selector": selector})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {"visible": visible},
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn heals_via_data_testid_fallback_when_id_is_gone() {
        let server = MockServer::start().await;
        mock_visible(&server, "#old-id", false).await;
        mock_visible(&server, "[data-testid='save']", true).await;

        let engine = SelfHealingEngine::new(transport_against(&server).await, None);
        let result = engine.heal("example.com", "ctx-1", "#old-id[data-testid='save']", None).await;

        assert!(result.success);
        assert_eq!(result.strategy_used, Some(HealingStrategy::DataTestId));
    }

    #[tokio::test]
    async fn reports_failure_when_no_candidate_is_visible() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute/browser_is_visible"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {"visible": false},
            })))
            .mount(&server)
            .await;

        let engine = SelfHealingEngine::new(transport_against(&server).await, None);
        let result = engine.heal("example.com", "ctx-1", "#totally-gone", None).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn a_successful_heal_is_served_from_cache_on_the_next_call() {
        let server = MockServer::start().await;
        mock_visible(&server, "#old-id", false).await;
        mock_visible(&server, "[data-testid='save']", true).await;

        let engine = SelfHealingEngine::new(transport_against(&server).await, None);
        let first = engine.heal("example.com", "ctx-1", "#old-id[data-testid='save']", None).await;
        assert!(first.success);

        let second = engine.heal("example.com", "ctx-1", "#old-id[data-testid='save']", None).await;
        assert!(second.success);
        assert_eq!(second.strategy_used, Some(HealingStrategy::CachedHistory));
        assert!(second.confidence >= 0.95);
    }
}
