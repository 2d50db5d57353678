use url::Url;

/// Normalizes a URL for visited-set comparison: drops the fragment,
/// lowercases the host, collapses a trailing slash in the path (except
/// root), and sorts query parameters lexicographically by key.
pub fn normalize_url(url: &Url) -> String {
    let scheme = url.scheme();
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();

    let mut path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() {
        path.push('/');
    }

    let mut normalized = format!("{scheme}://{host}{port}{path}");

    if let Some(query) = url.query() {
        let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
        params.sort_unstable();
        if !params.is_empty() {
            normalized.push('?');
            normalized.push_str(&params.join("&"));
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn strips_fragment_and_lowercases_host() {
        let normalized = normalize_url(&parse("https://Example.COM/path#section"));
        assert_eq!(normalized, "https://example.com/path");
    }

    #[test]
    fn collapses_trailing_slash_except_root() {
        assert_eq!(normalize_url(&parse("https://example.com/path/")), "https://example.com/path");
        assert_eq!(normalize_url(&parse("https://example.com/")), "https://example.com/");
    }

    #[test]
    fn sorts_query_parameters() {
        let normalized = normalize_url(&parse("https://example.com/search?z=1&a=2"));
        assert_eq!(normalized, "https://example.com/search?a=2&z=1");
    }

    #[test]
    fn distinct_paths_normalize_differently() {
        assert_ne!(normalize_url(&parse("https://example.com/a")), normalize_url(&parse("https://example.com/b")));
    }
}
