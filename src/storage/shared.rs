//! Async frontier handle with transient-error retry
//!
//! Each `SharedFrontier` wraps its own SQLite connection. Operations run on
//! tokio's blocking pool and the connection lock is held only for the duration
//! of one operation, never across a fetch.

use crate::config::Config;
use crate::state::UrlState;
use crate::storage::traits::{Frontier, StorageError, StorageResult};
use crate::storage::{FrontierStats, RunRecord, RunStatus, SqliteFrontier, UrlRecord};
use crate::url::{build_admission_filter, AdmissionFilter, AllowAll, Normalizer};
use crate::SpiderError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bounded exponential backoff for busy/locked database errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Everything needed to open another connection to the same frontier
#[derive(Clone)]
pub struct FrontierOptions {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
    pub normalizer: Normalizer,
    pub filter: Arc<dyn AdmissionFilter>,
}

impl FrontierOptions {
    /// Options with default timeouts, denylist and no admission filter
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            normalizer: Normalizer::default(),
            filter: Arc::new(AllowAll),
        }
    }

    /// Builds options from the `[storage]` and `[filter]` config sections
    pub fn from_config(config: &Config) -> Self {
        let storage = &config.storage;
        let filter = &config.filter;
        Self {
            path: PathBuf::from(&storage.database_path),
            busy_timeout: Duration::from_millis(storage.busy_timeout_ms),
            retry: RetryPolicy {
                max_retries: storage.max_retries,
                initial_backoff: Duration::from_millis(storage.retry_backoff_ms),
                ..RetryPolicy::default()
            },
            normalizer: Normalizer::new(
                filter.denied_extensions.iter().cloned(),
                filter.denied_patterns.iter().cloned(),
            ),
            filter: build_admission_filter(filter),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn AdmissionFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Opens a synchronous connection
    pub fn open_blocking(&self) -> Result<SqliteFrontier, SpiderError> {
        Ok(SqliteFrontier::open(&self.path, self.busy_timeout)?
            .with_normalizer(self.normalizer.clone())
            .with_filter(Arc::clone(&self.filter)))
    }

    /// Opens an async handle with its own connection
    pub async fn open(&self) -> Result<SharedFrontier, SpiderError> {
        let options = self.clone();
        let frontier = tokio::task::spawn_blocking(move || options.open_blocking())
            .await
            .map_err(|e| {
                SpiderError::Storage(StorageError::Database(format!(
                    "open task failed: {}",
                    e
                )))
            })??;
        Ok(SharedFrontier::new(frontier, self.retry))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Async handle to one frontier connection
///
/// Cloning shares the connection. Workers that should not contend in-process
/// open their own handle via [`FrontierOptions::open`].
#[derive(Clone)]
pub struct SharedFrontier {
    inner: Arc<Mutex<SqliteFrontier>>,
    retry: RetryPolicy,
}

impl SharedFrontier {
    pub fn new(frontier: SqliteFrontier, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(frontier)),
            retry,
        }
    }

    /// Runs one frontier operation on the blocking pool, retrying transient errors
    async fn call<T, F>(&self, operation: &'static str, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: Fn(&mut SqliteFrontier) -> StorageResult<T> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut attempt = 0;

        loop {
            let inner = Arc::clone(&self.inner);
            let op = Arc::clone(&f);
            let result = tokio::task::spawn_blocking(move || {
                let mut guard = inner.lock().map_err(|_| {
                    StorageError::Database("frontier connection lock poisoned".to_string())
                })?;
                (*op)(&mut *guard)
            })
            .await
            .map_err(|e| StorageError::Database(format!("{} task failed: {}", operation, e)))?;

            match result {
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient storage error, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(
                        operation,
                        attempts = attempt + 1,
                        "Storage unavailable, giving up: {}",
                        e
                    );
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    pub async fn insert(
        &self,
        url: String,
        source_url: Option<String>,
        depth: u32,
    ) -> StorageResult<bool> {
        self.call("insert", move |f| {
            f.insert(&url, source_url.as_deref(), depth)
        })
        .await
    }

    pub async fn insert_batch(
        &self,
        links: Vec<String>,
        source_url: String,
        depth: u32,
    ) -> StorageResult<usize> {
        self.call("insert_batch", move |f| {
            f.insert_batch(&links, &source_url, depth)
        })
        .await
    }

    pub async fn claim_random(&self) -> StorageResult<Option<UrlRecord>> {
        self.call("claim_random", |f| f.claim_random()).await
    }

    pub async fn mark_success(
        &self,
        url: String,
        title: Option<String>,
        content_ref: Option<String>,
    ) -> StorageResult<()> {
        self.call("mark_success", move |f| {
            f.mark_success(&url, title.as_deref(), content_ref.as_deref())
        })
        .await
    }

    pub async fn mark_failed(&self, url: String, error: String) -> StorageResult<()> {
        self.call("mark_failed", move |f| f.mark_failed(&url, &error))
            .await
    }

    pub async fn reclaim_stale(&self, timeout: Duration) -> StorageResult<usize> {
        self.call("reclaim_stale", move |f| f.reclaim_stale(timeout))
            .await
    }

    pub async fn stats(&self) -> StorageResult<FrontierStats> {
        self.call("stats", |f| f.stats()).await
    }

    pub async fn get(&self, url: String) -> StorageResult<Option<UrlRecord>> {
        self.call("get", move |f| f.get(&url)).await
    }

    pub async fn list_by_state(
        &self,
        state: UrlState,
        limit: usize,
    ) -> StorageResult<Vec<UrlRecord>> {
        self.call("list_by_state", move |f| f.list_by_state(state, limit))
            .await
    }

    pub async fn reset_failed(&self, url_contains: Option<String>) -> StorageResult<usize> {
        self.call("reset_failed", move |f| {
            f.reset_failed(url_contains.as_deref())
        })
        .await
    }

    pub async fn create_run(&self, config_hash: String) -> StorageResult<i64> {
        self.call("create_run", move |f| f.create_run(&config_hash))
            .await
    }

    pub async fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.call("get_run", move |f| f.get_run(run_id)).await
    }

    pub async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        stats: FrontierStats,
    ) -> StorageResult<()> {
        self.call("finish_run", move |f| f.finish_run(run_id, status, &stats))
            .await
    }
}
