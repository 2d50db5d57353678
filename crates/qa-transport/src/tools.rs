//! SDK verb <-> server tool name mapping, and the long-running tool set.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Tools whose expected latency exceeds the base timeout: navigation, waits,
/// page-wide analysis, and CAPTCHA solvers.
static LONG_RUNNING_TOOLS: LazyLock<[&str; 10]> = LazyLock::new(|| {
    [
        "browser_navigate",
        "browser_reload",
        "browser_wait",
        "browser_wait_for_selector",
        "browser_query_page",
        "browser_summarize_page",
        "browser_nla",
        "browser_solve_captcha",
        "browser_solve_text_captcha",
        "browser_solve_image_captcha",
    ]
});

/// SDK verb -> server tool name. Verbs absent from this table map to
/// `browser_<verb>` by convention.
static TOOL_NAME_MAP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("createContext", "browser_create_context"),
        ("releaseContext", "browser_close_context"),
        ("listContexts", "browser_list_contexts"),
        ("navigate", "browser_navigate"),
        ("reload", "browser_reload"),
        ("goBack", "browser_go_back"),
        ("goForward", "browser_go_forward"),
        ("click", "browser_click"),
        ("type", "browser_type"),
        ("pick", "browser_pick"),
        ("pressKey", "browser_press_key"),
        ("submitForm", "browser_submit_form"),
        ("highlight", "browser_highlight"),
        ("extractText", "browser_extract_text"),
        ("screenshot", "browser_screenshot"),
        ("getHTML", "browser_get_html"),
        ("getMarkdown", "browser_get_markdown"),
        ("extractJSON", "browser_extract_json"),
        ("detectWebsiteType", "browser_detect_site"),
        ("listTemplates", "browser_list_templates"),
        ("summarizePage", "browser_summarize_page"),
        ("queryPage", "browser_query_page"),
        ("llmStatus", "browser_llm_status"),
        ("executeNLA", "browser_nla"),
        ("getLLMStatus", "browser_llm_status"),
        ("scrollBy", "browser_scroll_by"),
        ("scrollToElement", "browser_scroll_to_element"),
        ("scrollToTop", "browser_scroll_to_top"),
        ("scrollToBottom", "browser_scroll_to_bottom"),
        ("waitForSelector", "browser_wait_for_selector"),
        ("waitForTimeout", "browser_wait"),
        ("getPageInfo", "browser_get_page_info"),
        ("getCurrentURL", "browser_get_page_info"),
        ("getPageTitle", "browser_get_page_info"),
        ("setViewport", "browser_set_viewport"),
        ("getCookies", "browser_get_cookies"),
        ("setCookie", "browser_set_cookie"),
        ("deleteCookies", "browser_delete_cookies"),
        ("setProxy", "browser_set_proxy"),
        ("getProxyStatus", "browser_get_proxy_status"),
        ("connectProxy", "browser_connect_proxy"),
        ("disconnectProxy", "browser_disconnect_proxy"),
        ("createProfile", "browser_create_profile"),
        ("loadProfile", "browser_load_profile"),
        ("saveProfile", "browser_save_profile"),
        ("getProfile", "browser_get_profile"),
        ("updateProfileCookies", "browser_update_profile_cookies"),
    ])
});

/// Reverse of [`TOOL_NAME_MAP`], used to verify the round-trip property:
/// `map(unmap(x)) == x` for every name present in the forward table.
static TOOL_NAME_UNMAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| TOOL_NAME_MAP.iter().map(|(&k, &v)| (v, k)).collect());

/// SDK parameter key -> server parameter key. Nearly every key is identity;
/// `template_name` is the one exception carried over from the SDK.
static PARAM_NAME_MAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| HashMap::from([("template_name", "template")]));

/// Maps an SDK verb to its server tool name, defaulting to `browser_<verb>`
/// for verbs not present in the table.
pub fn map_tool_name(verb: &str) -> String {
    match TOOL_NAME_MAP.get(verb) {
        Some(name) => (*name).to_string(),
        None => format!("browser_{verb}"),
    }
}

/// Maps a server tool name back to its SDK verb, when the tool name is the
/// exact value a table entry produces.
pub fn unmap_tool_name(tool_name: &str) -> Option<&'static str> {
    TOOL_NAME_UNMAP.get(tool_name).copied()
}

/// Maps SDK parameter keys to server parameter keys, passing unknown keys
/// through unchanged.
pub fn map_params(params: serde_json::Map<String, serde_json::Value>) -> serde_json::Map<String, serde_json::Value> {
    params
        .into_iter()
        .map(|(key, value)| {
            let mapped_key = PARAM_NAME_MAP.get(key.as_str()).map(|s| s.to_string()).unwrap_or(key);
            (mapped_key, value)
        })
        .collect()
}

/// Whether `tool_name` (already mapped to its server form) is long-running.
pub fn is_long_running(tool_name: &str) -> bool {
    LONG_RUNNING_TOOLS.contains(&tool_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_verb_maps_to_table_entry() {
        assert_eq!(map_tool_name("navigate"), "browser_navigate");
        assert_eq!(map_tool_name("click"), "browser_click");
    }

    #[test]
    fn unknown_verb_defaults_to_prefix_convention() {
        assert_eq!(map_tool_name("frobnicate"), "browser_frobnicate");
    }

    #[test]
    fn round_trips_for_every_table_entry() {
        for (&verb, &tool_name) in TOOL_NAME_MAP.iter() {
            // Two SDK verbs intentionally map to the same tool name
            // (getCurrentURL/getPageTitle -> browser_get_page_info,
            // llmStatus/getLLMStatus -> browser_llm_status); round-trip only
            // holds for a table's designated inverse for that tool name.
            if let Some(unmapped) = unmap_tool_name(tool_name) {
                assert_eq!(map_tool_name(unmapped), tool_name, "failed for verb {verb}");
            }
        }
    }

    #[test]
    fn param_mapping_passes_unknown_keys_through() {
        let mut params = serde_json::Map::new();
        params.insert("selector".into(), serde_json::json!("#id"));
        params.insert("template_name".into(), serde_json::json!("contact"));
        let mapped = map_params(params);
        assert_eq!(mapped.get("selector").unwrap(), "#id");
        assert_eq!(mapped.get("template").unwrap(), "contact");
        assert!(mapped.get("template_name").is_none());
    }

    #[test]
    fn long_running_tools_include_navigate_and_captcha_solvers() {
        assert!(is_long_running("browser_navigate"));
        assert!(is_long_running("browser_solve_captcha"));
        assert!(!is_long_running("browser_click"));
    }
}
