use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static ATTR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[([a-zA-Z-]+)([*~^$|]?=)['"]([^'"]+)['"]\]"#).unwrap());
static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#([a-zA-Z0-9_-]+)").unwrap());
static CLASS_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.([a-zA-Z0-9_-]+)").unwrap());
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9]*)").unwrap());

static TEXT_HINT_PATTERNS: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        Regex::new(r#"contains\(text\(\),\s*['"]([^'"]+)['"]\)"#).unwrap(),
        Regex::new(r#"contains\(\.,\s*['"]([^'"]+)['"]\)"#).unwrap(),
        Regex::new(r#"\[aria-label[*~^$]?=['"]([^'"]+)['"]\]"#).unwrap(),
        Regex::new(r#"\[title[*~^$]?=['"]([^'"]+)['"]\]"#).unwrap(),
        Regex::new(r#"\[placeholder[*~^$]?=['"]([^'"]+)['"]\]"#).unwrap(),
    ]
});

/// Extracts `id`, `class`, and any `[attr='value']` pairs from a CSS-like
/// selector. `class` collects every `.foo` token space-joined.
pub fn parse_selector_attributes(selector: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();

    for caps in ATTR_PATTERN.captures_iter(selector) {
        attrs.insert(caps[1].to_string(), caps[3].to_string());
    }
    if let Some(caps) = ID_PATTERN.captures(selector) {
        attrs.insert("id".to_string(), caps[1].to_string());
    }
    let classes: Vec<&str> = CLASS_PATTERN.captures_iter(selector).map(|c| c.get(1).unwrap().as_str()).collect();
    if !classes.is_empty() {
        attrs.insert("class".to_string(), classes.join(" "));
    }

    attrs
}

/// The leading tag name of a selector, or `*` if none is present.
pub fn leading_tag(selector: &str) -> String {
    TAG_PATTERN.captures(selector).map(|c| c[1].to_string()).unwrap_or_else(|| "*".to_string())
}

/// Pulls a text hint for text-match candidates out of an already-broken
/// selector (e.g. `[aria-label*='Submit']` yields `Submit`).
pub fn extract_text_hint(selector: &str) -> Option<String> {
    TEXT_HINT_PATTERNS.iter().find_map(|re| re.captures(selector).map(|c| c[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_class_and_bracket_attributes() {
        let attrs = parse_selector_attributes("button#submit.btn.btn-primary[data-testid='go']");
        assert_eq!(attrs.get("id").map(String::as_str), Some("submit"));
        assert_eq!(attrs.get("class").map(String::as_str), Some("btn btn-primary"));
        assert_eq!(attrs.get("data-testid").map(String::as_str), Some("go"));
    }

    #[test]
    fn leading_tag_defaults_to_wildcard() {
        assert_eq!(leading_tag("#submit"), "*");
        assert_eq!(leading_tag("button.btn"), "button");
    }

    #[test]
    fn extracts_text_hint_from_aria_label() {
        let hint = extract_text_hint("[aria-label*='Submit order']");
        assert_eq!(hint.as_deref(), Some("Submit order"));
    }
}
