//! Crawl orchestration
//!
//! The orchestrator owns one run of the crawler:
//! - Recovering claims orphaned by a previous crash
//! - Recording the run in the `runs` table
//! - Starting the workers, the lease reclaimer and the progress reporter
//! - Handling graceful and forced shutdown
//! - Recording final counts

use crate::config::{Config, CrawlMode};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::pool::{PooledFetcher, RenderPool};
use crate::crawler::reclaimer::Reclaimer;
use crate::crawler::worker::{CrawlCounters, Worker, WorkerSettings};
use crate::storage::{FrontierOptions, FrontierStats, RunStatus, SharedFrontier};
use crate::SpiderError;
use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Final report for one orchestrator run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub run_id: i64,
    pub status: RunStatus,
    /// Frontier counts when the run finished
    pub stats: FrontierStats,
    /// URLs resolved by this process
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// New frontier rows created from discovered links
    pub discovered: u64,
    /// Orphaned claims returned to `Pending` before the workers started
    pub reclaimed_at_start: usize,
    pub elapsed: Duration,
}

/// Supervises the worker pool for one run
pub struct Orchestrator {
    config: Config,
    options: FrontierOptions,
    fetcher: Arc<dyn Fetcher>,
    config_hash: String,
}

impl Orchestrator {
    pub fn new(config: Config, options: FrontierOptions, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            options,
            fetcher,
            config_hash: String::new(),
        }
    }

    /// Builds an orchestrator with the HTTP fetcher described by `config`
    ///
    /// When `render-pool-size` is set, every fetch holds one slot of a pool
    /// shared by all workers.
    pub fn from_config(config: Config) -> Result<Self, SpiderError> {
        let options = FrontierOptions::from_config(&config);
        let http = HttpFetcher::from_config(&config)?;

        let fetcher: Arc<dyn Fetcher> = match config.fetch.render_pool_size {
            Some(size) => {
                let pool = RenderPool::new(size as usize);
                tracing::info!(slots = pool.size(), "Render pool enabled");
                Arc::new(PooledFetcher::new(Arc::new(http), pool))
            }
            None => Arc::new(http),
        };

        Ok(Self::new(config, options, fetcher))
    }

    /// Hash recorded on the run row
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Inserts seed URLs at depth 0; returns how many were new
    pub async fn seed(&self, seeds: &[String]) -> Result<usize, SpiderError> {
        let frontier = self.options.open().await?;
        let mut inserted = 0;
        for seed in seeds {
            if frontier.insert(seed.clone(), None, 0).await? {
                inserted += 1;
            } else {
                tracing::debug!(url = %seed, "Seed already known or not admitted");
            }
        }
        tracing::info!(seeds = seeds.len(), inserted, "Seeded frontier");
        Ok(inserted)
    }

    /// Runs until the frontier drains or Ctrl-C/SIGTERM
    pub async fn run(&self) -> Result<CrawlSummary, SpiderError> {
        self.run_with_signals(shutdown_signals()).await
    }

    /// Runs with shutdown requests delivered on `signals`
    ///
    /// The first message stops new claims and lets in-flight fetches finish.
    /// A second message, or the grace period running out, aborts them. Their
    /// claims stay `Crawling` until the reclaimer picks them up.
    pub async fn run_with_signals(
        &self,
        mut signals: mpsc::Receiver<()>,
    ) -> Result<CrawlSummary, SpiderError> {
        let started = Instant::now();
        let crawler = &self.config.crawler;
        let pause = crawler.idle_poll();

        let control =
            wait_for_storage("open", pause, &mut signals, || self.options.open()).await?;
        let reclaimer = Reclaimer::new(
            control.clone(),
            self.config.reclaim.timeout(),
            self.config.reclaim.interval(),
        );
        let reclaimed_at_start =
            wait_for_storage("startup sweep", pause, &mut signals, || reclaimer.sweep()).await?;

        // Every worker gets its own connection
        let mut handles = Vec::with_capacity(crawler.workers as usize);
        for _ in 0..crawler.workers {
            handles.push(
                wait_for_storage("open", pause, &mut signals, || self.options.open()).await?,
            );
        }

        let run_id = wait_for_storage("create_run", pause, &mut signals, || {
            control.create_run(self.config_hash.clone())
        })
        .await?;
        tracing::info!(
            run_id,
            workers = crawler.workers,
            max_depth = crawler.max_depth,
            mode = ?crawler.mode,
            "Starting crawl run"
        );

        let background = CancellationToken::new();
        let reclaimer_task = tokio::spawn(reclaimer.run(background.clone()));

        let counters = Arc::new(CrawlCounters::default());
        let progress_task = tokio::spawn(report_progress(
            control.clone(),
            Arc::clone(&counters),
            crawler.progress_interval(),
            started,
            background.clone(),
        ));

        let shutdown = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let settings = WorkerSettings::from_config(crawler);
        let mut workers = JoinSet::new();
        for (id, frontier) in handles.into_iter().enumerate() {
            let worker = Worker::new(
                id,
                frontier,
                Arc::clone(&self.fetcher),
                settings,
                shutdown.child_token(),
            )
            .with_in_flight(Arc::clone(&in_flight))
            .with_counters(Arc::clone(&counters));
            workers.spawn(worker.run());
        }

        let grace = self.config.shutdown.grace();
        let grace_timer = tokio::time::sleep(grace);
        tokio::pin!(grace_timer);

        let mut interrupted = false;
        let mut forced = false;
        let mut failure: Option<SpiderError> = None;

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(resolved))) => {
                        tracing::debug!(resolved, "Worker finished");
                    }
                    Some(Ok(Err(e))) => {
                        tracing::error!("{}", e);
                        shutdown.cancel();
                        failure.get_or_insert(e);
                    }
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => {
                        tracing::error!("Worker task failed: {}", e);
                        shutdown.cancel();
                        failure.get_or_insert(SpiderError::Join(e));
                    }
                },
                Some(()) = signals.recv(), if !forced => {
                    if interrupted {
                        tracing::warn!("Second shutdown signal, aborting in-flight fetches");
                        workers.abort_all();
                        forced = true;
                    } else {
                        tracing::info!(
                            grace_secs = grace.as_secs(),
                            "Shutdown requested, finishing in-flight fetches (signal again to force)"
                        );
                        interrupted = true;
                        shutdown.cancel();
                        grace_timer
                            .as_mut()
                            .reset(tokio::time::Instant::now() + grace);
                    }
                }
                _ = &mut grace_timer, if interrupted && !forced => {
                    tracing::warn!("Shutdown grace period elapsed, aborting in-flight fetches");
                    workers.abort_all();
                    forced = true;
                }
            }
        }

        background.cancel();
        if let Err(e) = reclaimer_task.await {
            tracing::warn!("Reclaimer task failed: {}", e);
        }
        if let Err(e) = progress_task.await {
            tracing::warn!("Progress task failed: {}", e);
        }

        let stats = wait_for_storage("stats", pause, &mut signals, || control.stats()).await?;
        let status = if failure.is_some() {
            RunStatus::Failed
        } else if interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        wait_for_storage("finish_run", pause, &mut signals, || {
            control.finish_run(run_id, status, stats)
        })
        .await?;

        let summary = CrawlSummary {
            run_id,
            status,
            stats,
            processed: counters.processed(),
            succeeded: counters.succeeded(),
            failed: counters.failed(),
            discovered: counters.discovered(),
            reclaimed_at_start,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            run_id,
            status = status.to_db_string(),
            processed = summary.processed,
            elapsed_secs = summary.elapsed.as_secs(),
            "Crawl finished: {}",
            stats
        );
        if crawler.mode == CrawlMode::Finite && stats.crawling > 0 {
            // Held by other processes, or abandoned and not yet past the lease
            tracing::info!(
                crawling = stats.crawling,
                "Claims still outstanding at exit"
            );
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

/// Repeats `op` while the database is busy or locked
///
/// Each operation already retries with bounded backoff. This outer loop keeps
/// the run alive through a longer outage, pausing between attempts, and gives
/// up only on a shutdown signal or a non-transient error.
async fn wait_for_storage<T, E, F, Fut>(
    operation: &'static str,
    pause: Duration,
    signals: &mut mpsc::Receiver<()>,
    mut op: F,
) -> Result<T, SpiderError>
where
    E: Into<SpiderError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e.into(),
        };
        if !error.is_transient() {
            return Err(error);
        }

        tracing::warn!(operation, "Storage unavailable, waiting: {}", error);
        tokio::select! {
            Some(()) = signals.recv() => {
                tracing::warn!(operation, "Shutdown requested while waiting for storage");
                return Err(error);
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

/// Logs a progress line every `interval` until cancelled
async fn report_progress(
    frontier: SharedFrontier,
    counters: Arc<CrawlCounters>,
    interval: Duration,
    started: Instant,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let processed = counters.processed();
                let rate = processed as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
                match frontier.stats().await {
                    Ok(stats) => tracing::info!(
                        "Progress: {} processed ({} ok, {} failed), {} pending, {} crawling, {:.2} pages/sec",
                        processed,
                        counters.succeeded(),
                        counters.failed(),
                        stats.pending,
                        stats.crawling,
                        rate
                    ),
                    Err(e) => tracing::warn!("Progress stats unavailable: {}", e),
                }
            }
        }
    }
}

/// Forwards Ctrl-C (and SIGTERM on unix) into a channel
pub fn shutdown_signals() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(4);

    let ctrl_c_tx = tx.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if ctrl_c_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::spawn(async move {
                    while term.recv().await.is_some() {
                        if tx.send(()).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    rx
}
