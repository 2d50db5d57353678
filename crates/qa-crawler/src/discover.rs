use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));
static FORM_ACTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form[action]").expect("static selector"));
static DATA_URL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-href], [data-url], [data-link]").expect("static selector"));
static FORM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").expect("static selector"));
static FORM_INPUT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input, select, textarea").expect("static selector"));
static SUBMIT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("button[type='submit'], input[type='submit']").expect("static selector"));
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("static selector"));
static STRUCTURE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2, h3, main, article").expect("static selector"));

/// Metadata captured for one `<input>`/`<select>`/`<textarea>` in a form.
#[derive(Debug, Clone)]
pub struct FormField {
    pub field_type: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub required: bool,
    pub placeholder: Option<String>,
}

/// A discovered `<form>`, with enough metadata to classify it as an
/// authentication flow or a safe-to-explore form.
#[derive(Debug, Clone)]
pub struct DiscoveredForm {
    pub id: String,
    pub action: String,
    pub method: String,
    pub fields: Vec<FormField>,
    pub has_password: bool,
    pub has_email: bool,
    pub has_search: bool,
    pub submit_text: Option<String>,
}

/// Extracts every absolute, crawlable-looking URL from `html`: anchor
/// `href`s, form `action`s, and `data-href`/`data-url`/`data-link`
/// attributes. Relative URLs are resolved against `base`.
pub fn discover_urls(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        if let Some(href) = element.value().attr("href") {
            push_resolved(&mut urls, base, href);
        }
    }
    for element in document.select(&FORM_ACTION_SELECTOR) {
        if let Some(action) = element.value().attr("action") {
            push_resolved(&mut urls, base, action);
        }
    }
    for element in document.select(&DATA_URL_SELECTOR) {
        let value = element
            .value()
            .attr("data-href")
            .or_else(|| element.value().attr("data-url"))
            .or_else(|| element.value().attr("data-link"));
        if let Some(value) = value {
            push_resolved(&mut urls, base, value);
        }
    }

    urls.sort_unstable();
    urls.dedup();
    urls
}

fn push_resolved(out: &mut Vec<String>, base: &Url, href: &str) {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") {
        return;
    }
    if let Ok(resolved) = base.join(href) {
        out.push(resolved.to_string());
    }
}

/// Extracts every `<form>` on the page with its input metadata.
pub fn discover_forms(html: &str, current_url: &str) -> Vec<DiscoveredForm> {
    let document = Html::parse_document(html);
    let mut forms = Vec::new();

    for (index, form) in document.select(&FORM_SELECTOR).enumerate() {
        let fields: Vec<FormField> = form
            .select(&FORM_INPUT_SELECTOR)
            .map(|input| {
                let value = input.value();
                let field_type = value.attr("type").map(str::to_lowercase).unwrap_or_else(|| value.name().to_lowercase());
                FormField {
                    field_type,
                    name: value.attr("name").map(str::to_string),
                    id: value.attr("id").map(str::to_string),
                    required: value.attr("required").is_some(),
                    placeholder: value.attr("placeholder").map(str::to_string),
                }
            })
            .collect();

        let submit_text = form.select(&SUBMIT_SELECTOR).next().map(|submit| {
            let text: String = submit.text().collect();
            let text = text.trim();
            if !text.is_empty() {
                text.to_string()
            } else {
                submit.value().attr("value").unwrap_or_default().to_string()
            }
        });

        let id = form.value().attr("id").map(str::to_string).unwrap_or_else(|| format!("form_{index}"));
        let action = form.value().attr("action").map(str::to_string).unwrap_or_else(|| current_url.to_string());
        let method = form.value().attr("method").map(str::to_uppercase).unwrap_or_else(|| "GET".to_string());

        forms.push(DiscoveredForm {
            id,
            action,
            method,
            has_password: fields.iter().any(|f| f.field_type == "password"),
            has_email: fields.iter().any(|f| f.field_type == "email"),
            has_search: fields.iter().any(|f| f.field_type == "search"),
            fields,
            submit_text,
        });
    }

    forms
}

/// Returns the page `<title>`, if present.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(&TITLE_SELECTOR).next().map(|el| el.text().collect::<String>().trim().to_string()).filter(|t| !t.is_empty())
}

/// Detects whether `forms` includes an authentication flow: a password
/// field present, or submit text suggesting "login"/"sign in"/"log in".
pub fn detect_authentication_form(forms: &[DiscoveredForm]) -> bool {
    forms.iter().any(|form| {
        if form.has_password {
            return true;
        }
        let submit = form.submit_text.as_deref().unwrap_or_default().to_lowercase();
        ["login", "sign in", "log in"].iter().any(|word| submit.contains(word))
    })
}

/// A stable fingerprint of visible-ish content: a hash of the first ~1000
/// characters of body text plus the count of heading/article/main
/// elements, so that near-duplicate shells (same text, no structure) and
/// identical text with different structure both distinguish correctly.
pub fn content_fingerprint(html: &str) -> u64 {
    let document = Html::parse_document(html);
    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    let sample: String = text.chars().take(1000).collect();
    let structure_count = document.select(&STRUCTURE_SELECTOR).count();

    let mut hasher = DefaultHasher::new();
    sample.hash(&mut hasher);
    structure_count.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn discover_urls_resolves_relative_links_and_skips_javascript() {
        let html = r#"<a href="/about">About</a><a href="javascript:void(0)">Noop</a><a href="https://other.com/x">X</a>"#;
        let urls = discover_urls(html, &base());
        assert!(urls.contains(&"https://example.com/about".to_string()));
        assert!(urls.contains(&"https://other.com/x".to_string()));
        assert!(!urls.iter().any(|u| u.starts_with("javascript:")));
    }

    #[test]
    fn discover_forms_flags_password_fields() {
        let html = r#"<form id="login" method="post" action="/login">
            <input type="email" name="email">
            <input type="password" name="password">
            <button type="submit">Log In</button>
        </form>"#;
        let forms = discover_forms(html, "https://example.com/page");
        assert_eq!(forms.len(), 1);
        assert!(forms[0].has_password);
        assert!(forms[0].has_email);
        assert_eq!(forms[0].submit_text.as_deref(), Some("Log In"));
        assert!(detect_authentication_form(&forms));
    }

    #[test]
    fn non_auth_form_is_not_flagged() {
        let html = r#"<form><input type="search" name="q"></form>"#;
        let forms = discover_forms(html, "https://example.com/page");
        assert!(!detect_authentication_form(&forms));
    }

    #[test]
    fn identical_content_hashes_equal() {
        let a = content_fingerprint("<html><body><h1>Hi</h1><p>Same text</p></body></html>");
        let b = content_fingerprint("<html><body><h1>Hi</h1><p>Same text</p></body></html>");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_hashes_differ() {
        let a = content_fingerprint("<html><body><h1>Hi</h1></body></html>");
        let b = content_fingerprint("<html><body><h1>Bye</h1></body></html>");
        assert_ne!(a, b);
    }
}
