use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use filing_finder::url::extract_domain;
///
/// let url = Url::parse("https://IR.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("ir.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a host matches a domain pattern
///
/// `"example.com"` matches only itself. `"*.example.com"` matches the bare
/// domain and any subdomain at any depth, but never a host that merely ends
/// in the same characters (`myexample.com`).
///
/// Both sides are expected to be lowercase.
///
/// # Examples
///
/// ```
/// use filing_finder::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "investors.example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
