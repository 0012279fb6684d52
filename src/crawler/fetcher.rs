//! HTTP fetcher implementation
//!
//! This module defines the fetch collaborator the workers call for every
//! claimed URL, and the default reqwest-based implementation:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a per-request timeout
//! - Content-Type and body checks
//! - Link and title extraction, optional archiving and relevance filtering

use crate::config::{Config, UserAgentConfig};
use crate::crawler::classifier::KeywordClassifier;
use crate::crawler::parser::parse_html;
use crate::output::PageArchive;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Bodies with fewer non-whitespace characters than this are treated as empty
const MIN_BODY_CHARS: usize = 10;

/// What a successful fetch hands back to the worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub title: Option<String>,
    /// Where the page content was stored, if anywhere
    pub content_ref: Option<String>,
    /// Absolute links discovered on the page
    pub links: Vec<String>,
}

/// Why a fetch failed; recorded as the URL's error text
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Expected HTML, got {content_type}")]
    ContentMismatch { content_type: String },

    #[error("Empty response body")]
    EmptyBody,

    #[error("content not relevant")]
    NotRelevant,

    #[error("Failed to archive page: {0}")]
    Archive(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Network("Connection refused".to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Fetch/extract collaborator invoked once per claimed URL
///
/// Any error is a terminal failure for that URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use webspider::config::UserAgentConfig;
/// use webspider::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "WebSpider".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Default fetcher: GET, check, parse, then optionally classify and archive
pub struct HttpFetcher {
    client: Client,
    archive: Option<PageArchive>,
    classifier: Option<KeywordClassifier>,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            archive: None,
            classifier: None,
        }
    }

    /// Builds a fetcher from the `[user-agent]` and `[fetch]` config sections
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.fetch.timeout())?;
        let mut fetcher = Self::new(client);

        if let Some(dir) = &config.fetch.archive_dir {
            fetcher = fetcher.with_archive(PageArchive::new(dir));
        }
        let classifier = KeywordClassifier::new(&config.fetch.content_keywords)
            .with_title_keywords(&config.fetch.title_keywords);
        fetcher = fetcher.with_classifier(classifier);

        Ok(fetcher)
    }

    pub fn with_archive(mut self, archive: PageArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_classifier(mut self, classifier: KeywordClassifier) -> Self {
        self.classifier = if classifier.is_empty() {
            None
        } else {
            Some(classifier)
        };
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !is_html_content_type(&content_type) {
            return Err(FetchError::ContentMismatch { content_type });
        }

        // Links resolve against the post-redirect URL
        let final_url = response.url().clone();
        let body = response.text().await?;

        if body.chars().filter(|c| !c.is_whitespace()).count() < MIN_BODY_CHARS {
            return Err(FetchError::EmptyBody);
        }

        if let Some(classifier) = &self.classifier {
            let relevance = classifier.classify(&body);
            if !relevance.is_relevant() {
                tracing::debug!(
                    url = %url,
                    score = relevance.score,
                    matched = ?relevance.matched,
                    title_matched = ?relevance.title_matched,
                    "Page not relevant"
                );
                return Err(FetchError::NotRelevant);
            }
            tracing::debug!(
                url = %url,
                score = relevance.score,
                matched = ?relevance.matched,
                "Page relevant"
            );
        }

        let parsed = parse_html(&body, &final_url);

        let content_ref = match &self.archive {
            Some(archive) => Some(archive.save(url, &body).await?.display().to_string()),
            None => None,
        };

        Ok(FetchedPage {
            title: parsed.title,
            content_ref,
            links: parsed.links,
        })
    }
}

/// True for HTML media types; a missing header is given the benefit of the doubt
fn is_html_content_type(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml+xml")
}
