use crate::{UrlError, UrlResult};
use url::Url;

/// File extensions that never lead to crawlable HTML
pub const DEFAULT_DENIED_EXTENSIONS: &[&str] = &[
    // Images
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".webp", ".svg", ".ico",
    // Styles and scripts
    ".css", ".js", ".map",
    // Office documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
    // Archives
    ".zip", ".rar", ".7z", ".tar", ".gz",
    // Media
    ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".flv",
    // Executables
    ".exe", ".msi", ".dmg", ".app",
];

/// URL substrings that mark API endpoints, feeds, and download handlers
pub const DEFAULT_DENIED_PATTERNS: &[&str] = &[
    "/api/",
    "/ajax/",
    "/json/",
    "/xml/",
    "/rss/",
    "?download=",
    "&download=",
    "download.php",
    "download.asp",
];

/// Canonicalizes a raw link into the frontier's URL form
///
/// # Normalization Steps
///
/// 1. Resolve `raw` against `base` when given (relative links)
/// 2. Reject anything that is not `http` or `https`
/// 3. Reject URLs without a host
/// 4. Strip the fragment
///
/// Host lowercasing and dot-segment removal come from the `url` crate's parser.
/// Scheme, `www.` prefix, trailing slashes and query parameters are kept as-is,
/// so `http://a/b` and `https://a/b` are distinct frontier entries.
///
/// # Arguments
///
/// * `raw` - The link as found in the page or given as a seed
/// * `base` - The page the link was found on, if any
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - The link cannot be parsed or is not crawlable
///
/// # Examples
///
/// ```
/// use url::Url;
/// use webspider::url::normalize_url;
///
/// let base = Url::parse("http://example.com/docs/").unwrap();
/// let url = normalize_url("intro#top", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/docs/intro");
/// ```
pub fn normalize_url(raw: &str, base: Option<&Url>) -> UrlResult<Url> {
    let raw = raw.trim();

    let parsed = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    };
    let mut url = parsed.map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingHost),
    }

    url.set_fragment(None);

    Ok(url)
}

/// URL normalizer with a configurable denylist
///
/// Wraps [`normalize_url`] and additionally rejects links whose path ends in a
/// denied file extension or whose text contains a denied pattern.
#[derive(Debug, Clone)]
pub struct Normalizer {
    denied_extensions: Vec<String>,
    denied_patterns: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_DENIED_EXTENSIONS.iter().map(|s| s.to_string()),
            DEFAULT_DENIED_PATTERNS.iter().map(|s| s.to_string()),
        )
    }
}

impl Normalizer {
    /// Creates a normalizer with the given denylists
    ///
    /// Extensions are matched case-insensitively and may be given with or
    /// without the leading dot.
    pub fn new<E, P>(extensions: E, patterns: P) -> Self
    where
        E: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        let denied_extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{}", ext)
                }
            })
            .filter(|ext| ext.len() > 1)
            .collect();

        let denied_patterns = patterns
            .into_iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            denied_extensions,
            denied_patterns,
        }
    }

    /// Creates a normalizer that applies no denylist at all
    pub fn permissive() -> Self {
        Self {
            denied_extensions: Vec::new(),
            denied_patterns: Vec::new(),
        }
    }

    /// Normalizes `raw` (resolved against `base`) and applies the denylist
    pub fn normalize(&self, raw: &str, base: Option<&Url>) -> UrlResult<Url> {
        let url = normalize_url(raw, base)?;
        self.check_denylist(&url)?;
        Ok(url)
    }

    /// Checks an already-normalized URL against the denylist
    pub fn check_denylist(&self, url: &Url) -> UrlResult<()> {
        let path = url.path().to_lowercase();
        if let Some(ext) = self
            .denied_extensions
            .iter()
            .find(|ext| path.ends_with(ext.as_str()))
        {
            return Err(UrlError::DeniedExtension {
                url: url.to_string(),
                extension: ext.clone(),
            });
        }

        let full = url.as_str().to_lowercase();
        if let Some(pattern) = self
            .denied_patterns
            .iter()
            .find(|p| full.contains(p.as_str()))
        {
            return Err(UrlError::DeniedPattern {
                url: url.to_string(),
                pattern: pattern.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/section/page").unwrap()
    }

    #[test]
    fn test_absolute_url_unchanged() {
        let result = normalize_url("http://example.com/a/b?x=1", None).unwrap();
        assert_eq!(result.as_str(), "http://example.com/a/b?x=1");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("http://a/b#frag", None).unwrap();
        assert_eq!(result.as_str(), "http://a/b");
    }

    #[test]
    fn test_fragment_variants_collapse() {
        let plain = normalize_url("http://a/b", None).unwrap();
        let with_frag = normalize_url("http://a/b#frag", None).unwrap();
        assert_eq!(plain, with_frag);
    }

    #[test]
    fn test_resolve_relative_path() {
        let result = normalize_url("other", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "http://example.com/section/other");
    }

    #[test]
    fn test_resolve_root_relative() {
        let result = normalize_url("/top", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "http://example.com/top");
    }

    #[test]
    fn test_resolve_parent_segments() {
        let result = normalize_url("../up/./here", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "http://example.com/up/here");
    }

    #[test]
    fn test_absolute_link_ignores_base() {
        let result = normalize_url("https://other.org/x", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "https://other.org/x");
    }

    #[test]
    fn test_lowercase_host() {
        let result = normalize_url("http://EXAMPLE.COM/Page", None).unwrap();
        assert_eq!(result.as_str(), "http://example.com/Page");
    }

    #[test]
    fn test_scheme_is_preserved() {
        let http = normalize_url("http://example.com/", None).unwrap();
        let https = normalize_url("https://example.com/", None).unwrap();
        assert_ne!(http, https);
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/file", None);
        assert!(matches!(result, Err(UrlError::InvalidScheme(s)) if s == "ftp"));
    }

    #[test]
    fn test_mailto_rejected() {
        let result = normalize_url("mailto:someone@example.com", Some(&base()));
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_malformed_url() {
        let result = normalize_url("not a url", None);
        assert!(matches!(result, Err(UrlError::Parse(_))));
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("http://example.com", None).unwrap();
        assert_eq!(result.as_str(), "http://example.com/");
    }

    #[test]
    fn test_whitespace_trimmed() {
        let result = normalize_url("  http://example.com/a  ", None).unwrap();
        assert_eq!(result.as_str(), "http://example.com/a");
    }

    #[test]
    fn test_denied_extension() {
        let normalizer = Normalizer::default();
        let result = normalizer.normalize("http://example.com/logo.PNG", None);
        assert!(matches!(
            result,
            Err(UrlError::DeniedExtension { extension, .. }) if extension == ".png"
        ));
    }

    #[test]
    fn test_denied_extension_ignores_query() {
        let normalizer = Normalizer::default();
        assert!(normalizer
            .normalize("http://example.com/report.pdf?v=2", None)
            .is_err());
    }

    #[test]
    fn test_denied_pattern() {
        let normalizer = Normalizer::default();
        let result = normalizer.normalize("http://example.com/api/v1/items", None);
        assert!(matches!(
            result,
            Err(UrlError::DeniedPattern { pattern, .. }) if pattern == "/api/"
        ));
        assert!(normalizer
            .normalize("http://example.com/file?download=1", None)
            .is_err());
    }

    #[test]
    fn test_html_page_allowed() {
        let normalizer = Normalizer::default();
        assert!(normalizer
            .normalize("http://example.com/news/index.html", None)
            .is_ok());
        assert!(normalizer.normalize("http://example.com/", None).is_ok());
    }

    #[test]
    fn test_custom_extensions_without_dot() {
        let normalizer = Normalizer::new(vec!["TXT".to_string()], Vec::new());
        assert!(normalizer.normalize("http://a/readme.txt", None).is_err());
        assert!(normalizer.normalize("http://a/logo.png", None).is_ok());
    }

    #[test]
    fn test_permissive_allows_everything_crawlable() {
        let normalizer = Normalizer::permissive();
        assert!(normalizer.normalize("http://a/api/x.zip", None).is_ok());
        assert!(normalizer.normalize("ftp://a/x", None).is_err());
    }
}
