use crate::UrlError;
use url::Url;

/// Canonicalizes a URL into the single form used for deduplication
///
/// # Normalization Steps
///
/// 1. Reject schemes other than http and https
/// 2. Lowercase scheme and host, strip default ports (80/443); the `url`
///    crate guarantees both at parse time
/// 3. Remove the fragment
/// 4. Collapse `.` and `..` path segments (guaranteed at parse/join time)
/// 5. Strip trailing slashes from the path, except for the root path
/// 6. Preserve the query string verbatim
///
/// # Arguments
///
/// * `url` - The parsed URL to canonicalize
///
/// # Returns
///
/// * `Ok(Url)` - The canonical URL
/// * `Err(UrlError)` - The URL has an unsupported scheme or no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitemapper::url::canonicalize;
///
/// let url = Url::parse("HTTPS://Example.COM:443/a/b/#top").unwrap();
/// let canonical = canonicalize(&url).unwrap();
/// assert_eq!(canonical.as_str(), "https://example.com/a/b");
/// ```
pub fn canonicalize(url: &Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    let mut canonical = url.clone();
    canonical.set_fragment(None);

    let path = canonical.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            canonical.set_path("/");
        } else {
            canonical.set_path(&trimmed);
        }
    }

    Ok(canonical)
}

/// Parses and canonicalizes a seed URL string
///
/// # Arguments
///
/// * `input` - The raw seed URL
///
/// # Returns
///
/// * `Ok(Url)` - The canonical seed URL
/// * `Err(UrlError)` - The input is not an absolute http(s) URL with a host
pub fn parse_seed(input: &str) -> Result<Url, UrlError> {
    let url = Url::parse(input)?;
    canonicalize(&url)
}
