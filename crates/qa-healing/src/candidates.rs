use crate::parse::{leading_tag, parse_selector_attributes};
use crate::strategy::{HealingStrategy, SelectorCandidate};

/// Strategy 3: attribute-presence fallbacks (`id`, `name`, `data-testid`,
/// `aria-label`, `placeholder`), exact and prefix variants.
pub fn attribute_fallback_candidates(original: &str) -> Vec<SelectorCandidate> {
    let attrs = parse_selector_attributes(original);
    let mut out = Vec::new();

    if let Some(id) = attrs.get("id") {
        out.push(SelectorCandidate::new(format!("#{id}"), HealingStrategy::IdFallback, 0.95));
        out.push(SelectorCandidate::new(format!("[id='{id}']"), HealingStrategy::IdFallback, 0.94));
        out.push(SelectorCandidate::new(format!("[id*='{id}']"), HealingStrategy::IdFallback, 0.80));
    }
    if let Some(name) = attrs.get("name") {
        out.push(SelectorCandidate::new(format!("[name='{name}']"), HealingStrategy::NameFallback, 0.90));
        out.push(SelectorCandidate::new(format!("[name*='{name}']"), HealingStrategy::NameFallback, 0.75));
    }
    if let Some(testid) = attrs.get("data-testid") {
        out.push(SelectorCandidate::new(format!("[data-testid='{testid}']"), HealingStrategy::DataTestId, 0.92));
        out.push(SelectorCandidate::new(format!("[data-testid*='{testid}']"), HealingStrategy::DataTestId, 0.78));
    }
    if let Some(label) = attrs.get("aria-label") {
        out.push(SelectorCandidate::new(format!("[aria-label='{label}']"), HealingStrategy::AriaLabel, 0.88));
        out.push(SelectorCandidate::new(format!("[aria-label*='{label}']"), HealingStrategy::AriaLabel, 0.72));
    }
    if let Some(placeholder) = attrs.get("placeholder") {
        out.push(SelectorCandidate::new(format!("[placeholder='{placeholder}']"), HealingStrategy::PlaceholderFallback, 0.85));
        out.push(SelectorCandidate::new(format!("[placeholder*='{placeholder}']"), HealingStrategy::PlaceholderFallback, 0.70));
    }

    out.retain(|c| c.selector != original);
    out
}

/// Strategy 4: text-content matching, given a hint extracted from the
/// selector or supplied by the caller as an element description.
pub fn text_match_candidates(text_hint: &str) -> Vec<SelectorCandidate> {
    let safe = text_hint.replace('\'', "\\'");
    let normalized = text_hint.to_lowercase().replace([' ', '_'], "-");

    vec![
        SelectorCandidate::new(format!("//*[normalize-space(text())='{safe}']"), HealingStrategy::TextMatch, 0.90),
        SelectorCandidate::new(format!("//*[contains(text(), '{safe}')]"), HealingStrategy::TextMatch, 0.82),
        SelectorCandidate::new(format!("//*[contains(normalize-space(), '{safe}')]"), HealingStrategy::TextMatch, 0.78),
        SelectorCandidate::new(format!("button[contains(., '{safe}')]"), HealingStrategy::TextMatch, 0.85),
        SelectorCandidate::new(format!("a[contains(., '{safe}')]"), HealingStrategy::TextMatch, 0.83),
        SelectorCandidate::new(format!("[data-testid*='{normalized}']"), HealingStrategy::TextMatch, 0.80),
        SelectorCandidate::new(format!("[aria-label*='{text_hint}']"), HealingStrategy::TextMatch, 0.79),
        SelectorCandidate::new(format!("[title*='{text_hint}']"), HealingStrategy::TextMatch, 0.75),
        SelectorCandidate::new(format!("[placeholder*='{text_hint}']"), HealingStrategy::TextMatch, 0.74),
        SelectorCandidate::new(format!("[value='{text_hint}']"), HealingStrategy::TextMatch, 0.82),
    ]
}

/// Strategy 5: exact/substring/prefix variants over every attribute the
/// original selector exposed, regardless of which ones strategy 3 already
/// covered by name.
pub fn attribute_fuzzy_candidates(original: &str) -> Vec<SelectorCandidate> {
    let attrs = parse_selector_attributes(original);
    let mut out = Vec::new();

    for (name, value) in &attrs {
        if name == "class" {
            continue;
        }
        out.push(SelectorCandidate::new(format!("[{name}='{value}']"), HealingStrategy::AttributeFuzzy, 0.85));
        out.push(SelectorCandidate::new(format!("[{name}*='{value}']"), HealingStrategy::AttributeFuzzy, 0.75));
        if value.len() > 4 {
            let half = &value[..value.len() / 2];
            // self_healing.py:416 branches confidence on `"*=" in selector`, so the
            // `^=` prefix form falls into the same `else` arm as the exact match (0.85).
            out.push(SelectorCandidate::new(format!("[{name}^='{half}']"), HealingStrategy::AttributeFuzzy, 0.85));
        }
    }

    out.retain(|c| c.selector != original);
    out
}

/// Strategy 6: convert an `#id` or `.class` selector into the equivalent
/// XPath expression.
pub fn xpath_fallback_candidates(original: &str) -> Vec<SelectorCandidate> {
    let mut out = Vec::new();
    if original.starts_with("//") || original.starts_with('/') {
        return out;
    }

    if let Some(rest) = original.strip_prefix('#') {
        let id = rest.split(['[', '.']).next().unwrap_or(rest);
        out.push(SelectorCandidate::new(format!("//*[@id='{id}']"), HealingStrategy::XpathFallback, 0.90));
    }

    if original.contains('.') {
        let attrs = parse_selector_attributes(original);
        if let Some(class) = attrs.get("class").and_then(|c| c.split_whitespace().next()) {
            out.push(SelectorCandidate::new(format!("//*[contains(@class, '{class}')]"), HealingStrategy::XpathFallback, 0.70));
        }
    }

    out
}

/// Strategy 7: tag + class + common-attribute combinations.
pub fn css_variation_candidates(original: &str) -> Vec<SelectorCandidate> {
    let attrs = parse_selector_attributes(original);
    let tag = leading_tag(original);
    let mut out = Vec::new();

    if let Some(classes) = attrs.get("class") {
        for class in classes.split_whitespace().take(3) {
            out.push(SelectorCandidate::new(format!("{tag}.{class}"), HealingStrategy::CssVariations, 0.75));
            out.push(SelectorCandidate::new(format!(".{class}"), HealingStrategy::CssVariations, 0.70));
            out.push(SelectorCandidate::new(format!("[class*='{class}']"), HealingStrategy::CssVariations, 0.65));
        }
    }

    if let Some(id) = attrs.get("id")
        && id.len() > 5
    {
        let partial = &id[..id.len() / 2];
        out.push(SelectorCandidate::new(format!("[id^='{partial}']"), HealingStrategy::CssVariations, 0.72));
    }

    for attr in ["type", "role", "data-type"] {
        if let Some(value) = attrs.get(attr) {
            out.push(SelectorCandidate::new(format!("{tag}[{attr}='{value}']"), HealingStrategy::CssVariations, 0.68));
        }
    }

    out.retain(|c| c.selector != original);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_fallback_prefers_id_exact_match() {
        let candidates = attribute_fallback_candidates("div[id='old-save-button']");
        let best = candidates.iter().max_by(|a, b| a.confidence.total_cmp(&b.confidence)).unwrap();
        assert_eq!(best.selector, "#old-save-button");
        assert_eq!(best.strategy, HealingStrategy::IdFallback);
    }

    #[test]
    fn text_match_escapes_quotes() {
        let candidates = text_match_candidates("Dan's button");
        assert!(candidates.iter().any(|c| c.selector.contains("Dan\\'s button")));
    }

    #[test]
    fn xpath_fallback_converts_id_selector() {
        let candidates = xpath_fallback_candidates("#old-id");
        assert_eq!(candidates[0].selector, "//*[@id='old-id']");
    }

    #[test]
    fn css_variation_uses_first_three_classes_only() {
        let candidates = css_variation_candidates("div.a.b.c.d");
        let classes_used: std::collections::HashSet<_> =
            candidates.iter().filter(|c| c.strategy == HealingStrategy::CssVariations && c.selector.starts_with('.')).map(|c| c.selector.clone()).collect();
        assert!(classes_used.len() <= 3);
    }
}
