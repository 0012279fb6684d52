use crate::url::{DEFAULT_DENIED_EXTENSIONS, DEFAULT_DENIED_PATTERNS};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for WebSpider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seed URLs inserted at depth 0
    #[serde(default)]
    pub seeds: Vec<String>,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub reclaim: ReclaimConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Whether workers stop once the frontier drains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Exit when nothing is pending and no local worker holds a claim
    #[default]
    Finite,
    /// Keep polling for work until signalled
    Continuous,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum BFS distance from a seed; links beyond it are never enqueued
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Number of concurrent worker loops
    #[serde(default = "default_workers")]
    pub workers: u32,

    #[serde(default)]
    pub mode: CrawlMode,

    /// Wait between claim attempts when the frontier is empty (milliseconds)
    #[serde(rename = "idle-poll-ms", default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Pause a worker takes after each URL (milliseconds)
    #[serde(rename = "politeness-delay-ms", default)]
    pub politeness_delay_ms: u64,

    /// How often the progress line is logged (seconds)
    #[serde(
        rename = "progress-interval-secs",
        default = "default_progress_interval_secs"
    )]
    pub progress_interval_secs: u64,
}

impl CrawlerConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Frontier database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// How long SQLite waits on a locked database before reporting busy
    #[serde(rename = "busy-timeout-ms", default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Retries for busy/locked errors before the operation fails
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries; doubles on each attempt
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Lease reclamation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReclaimConfig {
    /// Age after which a `crawling` record is considered abandoned
    #[serde(rename = "timeout-secs", default = "default_reclaim_timeout_secs")]
    pub timeout_secs: u64,

    /// Time between reclaim sweeps
    #[serde(rename = "interval-secs", default = "default_reclaim_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_reclaim_timeout_secs(),
            interval_secs: default_reclaim_interval_secs(),
        }
    }
}

impl ReclaimConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Shutdown behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// How long active fetches may run after the first signal
    #[serde(rename = "grace-secs", default = "default_grace_secs")]
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
        }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// HTTP fetch and extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout
    #[serde(rename = "timeout-secs", default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory where fetched pages are archived; the path becomes `content_ref`
    #[serde(rename = "archive-dir", default)]
    pub archive_dir: Option<String>,

    /// Upper bound on simultaneous fetches across all workers
    #[serde(rename = "render-pool-size", default)]
    pub render_pool_size: Option<u32>,

    /// Topical keywords; when set, pages that don't match are marked failed
    #[serde(rename = "content-keywords", default)]
    pub content_keywords: Vec<String>,

    /// High-priority keywords; two of them in a page's `<title>` make it relevant
    #[serde(rename = "title-keywords", default)]
    pub title_keywords: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            archive_dir: None,
            render_pool_size: None,
            content_keywords: Vec::new(),
            title_keywords: Vec::new(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// URL admission configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Host patterns (`example.com`, `*.example.com`); empty allows any host
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    #[serde(rename = "denied-extensions", default = "default_denied_extensions")]
    pub denied_extensions: Vec<String>,

    #[serde(rename = "denied-patterns", default = "default_denied_patterns")]
    pub denied_patterns: Vec<String>,

    /// File of extra denied patterns, one per line; `#` starts a comment line.
    /// Its entries are appended to `denied-patterns` when the config is parsed.
    #[serde(rename = "denied-patterns-file", default)]
    pub denied_patterns_file: Option<String>,

    /// URL keyword pre-filter; empty disables it
    #[serde(rename = "url-keywords", default)]
    pub url_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            denied_extensions: default_denied_extensions(),
            denied_patterns: default_denied_patterns(),
            denied_patterns_file: None,
            url_keywords: Vec::new(),
        }
    }
}

fn default_workers() -> u32 {
    4
}

fn default_idle_poll_ms() -> u64 {
    500
}

fn default_progress_interval_secs() -> u64 {
    30
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_reclaim_timeout_secs() -> u64 {
    3600
}

fn default_reclaim_interval_secs() -> u64 {
    300
}

fn default_grace_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_denied_extensions() -> Vec<String> {
    DEFAULT_DENIED_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_denied_patterns() -> Vec<String> {
    DEFAULT_DENIED_PATTERNS.iter().map(|s| s.to_string()).collect()
}
