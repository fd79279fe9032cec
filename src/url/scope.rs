//! Candidate resolution and same-origin scoping

use super::normalize::canonicalize;
use url::Url;

/// Resolves a raw href against the page it was found on
///
/// Returns None when the candidate should be discarded outright:
/// - empty or fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - hrefs that do not resolve to an absolute http(s) URL
///
/// Accepted candidates come back in canonical form.
pub fn resolve_candidate(page: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = page.join(href).ok()?;
    canonicalize(&resolved).ok()
}

/// Checks whether a URL belongs to the crawl origin
///
/// Origin membership is exact host equality with the seed host; subdomains
/// are out of scope.
pub fn same_host(seed_host: &str, url: &Url) -> bool {
    url.host_str().map(|host| host == seed_host).unwrap_or(false)
}
