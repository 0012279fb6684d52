//! Admission filters for newly discovered URLs
//!
//! An admission filter is a pure predicate consulted by the frontier before a
//! normalized URL is stored. A rejected URL is not an error: the insert simply
//! reports that nothing new was stored.

use crate::config::FilterConfig;
use std::sync::Arc;
use url::Url;

/// Domain fragments that pass the keyword pre-filter on their own
const INSTITUTIONAL_MARKERS: &[&str] = &[".gov.", ".org.", ".edu."];

/// Predicate deciding whether a discovered URL is worth storing at all
pub trait AdmissionFilter: Send + Sync {
    /// Returns true if `url` should be inserted into the frontier
    fn admit(&self, url: &Url) -> bool;
}

/// Filter that admits every URL
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AdmissionFilter for AllowAll {
    fn admit(&self, _url: &Url) -> bool {
        true
    }
}

/// Restricts the crawl to a set of host patterns
///
/// Patterns are either exact hosts (`example.com`) or wildcards
/// (`*.example.com`), which also match the bare domain.
#[derive(Debug, Clone)]
pub struct DomainFilter {
    patterns: Vec<String>,
}

impl DomainFilter {
    pub fn new<I>(patterns: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl AdmissionFilter for DomainFilter {
    fn admit(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.patterns.iter().any(|p| matches_wildcard(p, host))
    }
}

/// Topical pre-filter on the URL text itself
///
/// Admits a URL when it contains any configured keyword (case-insensitive) or
/// when its host looks institutional (`.gov.`, `.org.`, `.edu.`).
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I>(keywords: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl AdmissionFilter for KeywordFilter {
    fn admit(&self, url: &Url) -> bool {
        let text = url.as_str().to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
            || INSTITUTIONAL_MARKERS.iter().any(|m| text.contains(m))
    }
}

/// Admits a URL only if every filter in the chain admits it
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn AdmissionFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter to the chain
    pub fn with<F: AdmissionFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl AdmissionFilter for FilterChain {
    fn admit(&self, url: &Url) -> bool {
        self.filters.iter().all(|f| f.admit(url))
    }
}

/// Builds the admission filter described by the `[filter]` config section
///
/// Empty `allowed-domains` and `url-keywords` lists impose no restriction.
pub fn build_admission_filter(config: &FilterConfig) -> Arc<dyn AdmissionFilter> {
    let mut chain = FilterChain::new();

    if !config.allowed_domains.is_empty() {
        chain = chain.with(DomainFilter::new(config.allowed_domains.iter().cloned()));
    }

    if !config.url_keywords.is_empty() {
        chain = chain.with(KeywordFilter::new(config.url_keywords.iter().cloned()));
    }

    if chain.is_empty() {
        Arc::new(AllowAll)
    } else {
        Arc::new(chain)
    }
}

/// Checks if a host matches a wildcard pattern
///
/// `*.example.com` matches `example.com` and any of its subdomains;
/// any other pattern must match exactly.
///
/// # Examples
///
/// ```
/// use webspider::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "badexample.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
/// ```
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            host == base
                || (host.len() > base.len()
                    && host.ends_with(base)
                    && host.as_bytes()[host.len() - base.len() - 1] == b'.')
        }
        None => host == pattern,
    }
}
