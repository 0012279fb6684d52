//! Frontier trait and storage error types

use crate::state::UrlState;
use crate::storage::{FrontierStats, RunRecord, RunStatus, UrlRecord};
use rusqlite::ErrorCode;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("URL not found in frontier: {0}")]
    UrlNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true for errors worth retrying: a busy or locked database
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) => Self::is_transient_sqlite(e),
            _ => false,
        }
    }

    pub(crate) fn is_transient_sqlite(error: &rusqlite::Error) -> bool {
        matches!(
            error,
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The durable crawl frontier
///
/// Every method is one atomic unit against the store. Implementations must be
/// safe to use from many connections (and processes) against the same database:
/// coordination between workers happens only through these operations.
pub trait Frontier {
    // ===== URL Admission =====

    /// Inserts a newly discovered URL as `Pending`
    ///
    /// The URL is normalized (relative links are resolved against
    /// `source_url`) and passed through the admission filter first.
    ///
    /// # Arguments
    ///
    /// * `url` - The raw link
    /// * `source_url` - The page the link was found on (`None` for seeds)
    /// * `depth` - BFS distance from the nearest seed
    ///
    /// # Returns
    ///
    /// `true` only if a new record was created. Duplicates, invalid links and
    /// admission rejections all return `false`.
    fn insert(&mut self, url: &str, source_url: Option<&str>, depth: u32) -> StorageResult<bool>;

    /// Inserts every link found on one page in a single transaction
    ///
    /// # Returns
    ///
    /// The number of new records created
    fn insert_batch(
        &mut self,
        links: &[String],
        source_url: &str,
        depth: u32,
    ) -> StorageResult<usize>;

    // ===== Claim Protocol =====

    /// Atomically claims one `Pending` record chosen uniformly at random
    ///
    /// The record moves to `Crawling` with a fresh `updated_at`. Two concurrent
    /// callers never receive the same record.
    fn claim_random(&mut self) -> StorageResult<Option<UrlRecord>>;

    /// Records a successful crawl
    ///
    /// Does not check the prior state, so a result always wins over a
    /// concurrent reclaim sweep.
    fn mark_success(
        &mut self,
        url: &str,
        title: Option<&str>,
        content_ref: Option<&str>,
    ) -> StorageResult<()>;

    /// Records a permanent failure with its error text
    fn mark_failed(&mut self, url: &str, error: &str) -> StorageResult<()>;

    /// Returns every `Crawling` record older than `timeout` to `Pending`
    ///
    /// # Returns
    ///
    /// The number of records reclaimed
    fn reclaim_stale(&mut self, timeout: Duration) -> StorageResult<usize>;

    // ===== Inspection =====

    /// Aggregate counts by state
    fn stats(&self) -> StorageResult<FrontierStats>;

    /// Looks up one record by its normalized URL
    fn get(&self, url: &str) -> StorageResult<Option<UrlRecord>>;

    /// Lists records in a state, oldest first
    fn list_by_state(&self, state: UrlState, limit: usize) -> StorageResult<Vec<UrlRecord>>;

    // ===== Operator Tools =====

    /// Moves `Failed` records back to `Pending` and clears their error
    ///
    /// # Arguments
    ///
    /// * `url_contains` - Only reset URLs containing this substring
    fn reset_failed(&mut self, url_contains: Option<&str>) -> StorageResult<usize>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Closes a run with its final status and frontier counts
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        stats: &FrontierStats,
    ) -> StorageResult<()>;
}
