//! URL canonicalization and origin handling.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string for consistent cache keys.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve a route path (`/pricing`) or an absolute URL against the app origin.
pub fn resolve(origin: &Url, target: &str) -> Result<Url, UrlError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    if trimmed.starts_with('/') && !trimmed.starts_with("//") {
        let mut joined = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        joined.set_fragment(None);
        return Ok(joined);
    }

    canonicalize(trimmed)
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://creatrid.com").unwrap()
    }

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://creatrid.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("creatrid.com"));
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("creatrid.com/pricing").unwrap();
        assert_eq!(url.as_str(), "https://creatrid.com/pricing");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://CREATRID.COM").unwrap();
        assert_eq!(url.host_str(), Some("creatrid.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://creatrid.com/discover?tag=art#top").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("tag=art"));
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        assert!(matches!(canonicalize("file:///etc/passwd"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_route_path() {
        let url = resolve(&origin(), "/sign-in").unwrap();
        assert_eq!(url.as_str(), "https://creatrid.com/sign-in");
    }

    #[test]
    fn test_resolve_absolute_url() {
        let url = resolve(&origin(), "https://cdn.example.com/font.woff2").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_scheme_relative_is_not_a_path() {
        let url = resolve(&origin(), "//evil.test/x").unwrap();
        assert_ne!(url.host_str(), Some("creatrid.com"));
    }

    #[test]
    fn test_same_origin() {
        let app = origin();
        assert!(same_origin(&app, &Url::parse("https://creatrid.com/blog").unwrap()));
        assert!(!same_origin(&app, &Url::parse("http://creatrid.com/blog").unwrap()));
        assert!(!same_origin(&app, &Url::parse("https://creatrid.com:8443/").unwrap()));
        assert!(!same_origin(&app, &Url::parse("https://api.creatrid.com/").unwrap()));
    }
}
