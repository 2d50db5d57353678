use serde::{Deserialize, Serialize};

/// Deterministic strategy that produced (or would produce) a healed
/// selector. No strategy here depends on an LLM or any learned model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealingStrategy {
    /// A previously successful healing for this exact original, either
    /// still warm in this engine's in-memory cache or reloaded from the
    /// on-disk history.
    CachedHistory,
    IdFallback,
    NameFallback,
    DataTestId,
    AriaLabel,
    PlaceholderFallback,
    TextMatch,
    AttributeFuzzy,
    XpathFallback,
    CssVariations,
}

/// A selector proposed as a replacement, with the confidence that it
/// addresses the originally intended element.
#[derive(Debug, Clone)]
pub struct SelectorCandidate {
    pub selector: String,
    pub strategy: HealingStrategy,
    pub confidence: f64,
}

impl SelectorCandidate {
    pub fn new(selector: impl Into<String>, strategy: HealingStrategy, confidence: f64) -> Self {
        Self { selector: selector.into(), strategy, confidence }
    }
}

/// Outcome of a single [`crate::SelfHealingEngine::heal`] call.
#[derive(Debug, Clone)]
pub struct HealingResult {
    pub success: bool,
    pub original_selector: String,
    pub healed_selector: Option<String>,
    pub strategy_used: Option<HealingStrategy>,
    pub confidence: f64,
    pub candidates_evaluated: usize,
    pub healing_time: std::time::Duration,
    pub error: Option<String>,
}

impl HealingResult {
    pub fn failure(original_selector: impl Into<String>, candidates_evaluated: usize, healing_time: std::time::Duration) -> Self {
        Self {
            success: false,
            original_selector: original_selector.into(),
            healed_selector: None,
            strategy_used: None,
            confidence: 0.0,
            candidates_evaluated,
            healing_time,
            error: Some("no suitable replacement selector found".to_string()),
        }
    }
}
