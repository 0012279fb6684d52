//! Worker loop: claim, fetch, report, repeat
//!
//! Workers never talk to each other. Everything they share goes through the
//! frontier's atomic operations, plus two pieces of process-local state: the
//! in-flight claim counter used for finite-mode termination, and the progress
//! counters.

use crate::config::{CrawlMode, CrawlerConfig};
use crate::crawler::fetcher::Fetcher;
use crate::storage::{SharedFrontier, StorageResult, UrlRecord};
use crate::SpiderError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-worker loop settings
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub max_depth: u32,
    pub mode: CrawlMode,
    pub idle_poll: Duration,
    pub politeness_delay: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            mode: config.mode,
            idle_poll: config.idle_poll(),
            politeness_delay: config.politeness_delay(),
        }
    }
}

/// Process-wide progress counters, shared by all workers
#[derive(Debug, Default)]
pub struct CrawlCounters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    discovered: AtomicU64,
}

impl CrawlCounters {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// New frontier rows created from discovered links
    pub fn discovered(&self) -> u64 {
        self.discovered.load(Ordering::Relaxed)
    }
}

/// Counts a claim attempt as in flight until dropped
///
/// Entered before `claim_random` so a sibling that just saw an empty
/// frontier cannot miss a claim that is about to produce links.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One claim/fetch/report loop
pub struct Worker {
    id: usize,
    frontier: SharedFrontier,
    fetcher: Arc<dyn Fetcher>,
    settings: WorkerSettings,
    in_flight: Arc<AtomicUsize>,
    counters: Arc<CrawlCounters>,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        id: usize,
        frontier: SharedFrontier,
        fetcher: Arc<dyn Fetcher>,
        settings: WorkerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            frontier,
            fetcher,
            settings,
            in_flight: Arc::new(AtomicUsize::new(0)),
            counters: Arc::new(CrawlCounters::default()),
            cancel,
        }
    }

    /// Shares the in-flight counter with sibling workers
    pub fn with_in_flight(mut self, in_flight: Arc<AtomicUsize>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn with_counters(mut self, counters: Arc<CrawlCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs until the frontier drains (finite mode) or the token is cancelled
    ///
    /// Returns the number of URLs this worker resolved. While the database
    /// stays busy or locked past the retry budget the worker pauses and tries
    /// again; any other storage error stops the loop and leaves its claim for
    /// the reclaimer.
    pub async fn run(self) -> Result<u64, SpiderError> {
        let id = self.id;
        self.run_loop().await.map_err(|e| SpiderError::Worker {
            worker: id,
            message: e.to_string(),
        })
    }

    async fn run_loop(&self) -> Result<u64, SpiderError> {
        tracing::debug!(worker = self.id, "Worker started");
        let mut resolved = 0u64;

        while !self.cancel.is_cancelled() {
            let guard = InFlight::enter(&self.in_flight);

            let claimed = match self.frontier.claim_random().await {
                Ok(claimed) => claimed,
                Err(e) if e.is_transient() => {
                    drop(guard);
                    tracing::warn!(
                        worker = self.id,
                        "Storage unavailable, pausing claims: {}",
                        e
                    );
                    if !self.pause(self.settings.idle_poll).await {
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let Some(record) = claimed else {
                drop(guard);
                if self.should_exit().await? {
                    break;
                }
                if !self.pause(self.settings.idle_poll).await {
                    break;
                }
                continue;
            };

            let url = record.url.clone();
            match self.process(record).await {
                Ok(()) => resolved += 1,
                Err(e) if e.is_transient() => {
                    // The claim stays `Crawling` until its lease expires
                    tracing::warn!(
                        worker = self.id,
                        url = %url,
                        "Storage unavailable, leaving claim for the reclaimer: {}",
                        e
                    );
                    drop(guard);
                    if !self.pause(self.settings.idle_poll).await {
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            drop(guard);

            if !self.settings.politeness_delay.is_zero()
                && !self.pause(self.settings.politeness_delay).await
            {
                break;
            }
        }

        tracing::debug!(worker = self.id, resolved, "Worker stopped");
        Ok(resolved)
    }

    /// Finite mode ends once no sibling holds a claim and nothing is pending
    async fn should_exit(&self) -> Result<bool, SpiderError> {
        if self.settings.mode == CrawlMode::Continuous {
            return Ok(false);
        }
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return Ok(false);
        }
        // A sibling may have inserted links between our claim and its release
        match self.frontier.stats().await {
            Ok(stats) => Ok(stats.pending == 0),
            Err(e) if e.is_transient() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Sleeps unless cancelled first; returns false on cancellation
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    async fn process(&self, record: UrlRecord) -> StorageResult<()> {
        let UrlRecord { url, depth, .. } = record;
        tracing::debug!(worker = self.id, url = %url, depth, "Claimed");

        let parsed = match Url::parse(&url) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.frontier
                    .mark_failed(url, format!("Invalid stored URL: {}", e))
                    .await?;
                self.record_outcome(false);
                return Ok(());
            }
        };

        match self.fetcher.fetch(&parsed).await {
            Ok(page) => {
                let next_depth = depth + 1;
                if next_depth <= self.settings.max_depth && !page.links.is_empty() {
                    let found = page.links.len();
                    let inserted = self
                        .frontier
                        .insert_batch(page.links, url.clone(), next_depth)
                        .await?;
                    self.counters
                        .discovered
                        .fetch_add(inserted as u64, Ordering::Relaxed);
                    tracing::debug!(
                        worker = self.id,
                        url = %url,
                        found,
                        inserted,
                        depth = next_depth,
                        "Queued links"
                    );
                }

                self.frontier
                    .mark_success(url, page.title, page.content_ref)
                    .await?;
                self.record_outcome(true);
            }
            Err(e) => {
                tracing::info!(worker = self.id, url = %url, "Fetch failed: {}", e);
                self.frontier.mark_failed(url, e.to_string()).await?;
                self.record_outcome(false);
            }
        }

        Ok(())
    }

    fn record_outcome(&self, success: bool) {
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        if success {
            self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
