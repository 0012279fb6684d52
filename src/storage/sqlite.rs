//! SQLite frontier implementation
//!
//! One `SqliteFrontier` owns one connection. Many of them (across threads or
//! processes) may share a database file: the claim protocol relies on SQLite's
//! write lock, never on in-process locking.

use crate::state::UrlState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Frontier, StorageError, StorageResult};
use crate::storage::{FrontierStats, RunRecord, RunStatus, UrlRecord};
use crate::url::{normalize_url, AdmissionFilter, AllowAll, Normalizer};
use crate::SpiderError;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const URL_COLUMNS: &str =
    "id, url, source_url, depth, state, title, content_ref, error, created_at, updated_at";

const INSERT_SQL: &str = "INSERT INTO urls (url, source_url, depth, state, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
     ON CONFLICT(url) DO NOTHING";

const CLAIM_SQL: &str = "UPDATE urls SET state = ?1, updated_at = ?2
     WHERE id = (SELECT id FROM urls WHERE state = ?3 ORDER BY RANDOM() LIMIT 1)
       AND state = ?3
     RETURNING id, url, source_url, depth, state, title, content_ref, error, created_at, updated_at";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, total, pending, crawling, success, failed";

/// SQLite frontier backend
pub struct SqliteFrontier {
    conn: Connection,
    normalizer: Normalizer,
    filter: Arc<dyn AdmissionFilter>,
}

impl SqliteFrontier {
    /// Opens or creates a frontier database with the default busy timeout
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteFrontier)` - Successfully opened/created database
    /// * `Err(SpiderError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SpiderError> {
        Self::open(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens or creates a frontier database
    ///
    /// `busy_timeout` bounds how long a statement waits for another
    /// connection's write lock before failing with `SQLITE_BUSY`.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, SpiderError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        // WAL lets readers proceed while one writer holds the lock
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SpiderError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            normalizer: Normalizer::default(),
            filter: Arc::new(AllowAll),
        }
    }

    /// Replaces the URL normalizer (and its denylist)
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replaces the admission filter consulted by inserts
    pub fn with_filter(mut self, filter: Arc<dyn AdmissionFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Claims a random pending record, stamping the claim with `now`
    pub fn claim_random_at(&mut self, now: DateTime<Utc>) -> StorageResult<Option<UrlRecord>> {
        // IMMEDIATE takes the write lock up front, so the random pick and the
        // state change cannot interleave with another claimer
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let claimed = tx
            .query_row(
                CLAIM_SQL,
                params![
                    UrlState::Crawling.to_db_string(),
                    now.timestamp_millis(),
                    UrlState::Pending.to_db_string()
                ],
                row_to_record,
            )
            .optional()?;
        tx.commit()?;
        Ok(claimed)
    }

    /// Reclaims `Crawling` records whose claim is older than `now - timeout`
    ///
    /// A record claimed at `t` is reclaimed only when `now > t + timeout`.
    pub fn reclaim_stale_as_of(
        &mut self,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> StorageResult<usize> {
        let now_ms = now.timestamp_millis();
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(timeout_ms);

        // The state check runs at execution time, so a record resolved a moment
        // ago is never pulled back
        let reclaimed = self.conn.execute(
            "UPDATE urls SET state = ?1, updated_at = ?2
             WHERE state = ?3 AND updated_at < ?4",
            params![
                UrlState::Pending.to_db_string(),
                now_ms,
                UrlState::Crawling.to_db_string(),
                cutoff
            ],
        )?;
        Ok(reclaimed)
    }

    /// Normalizes a link and runs it through the admission filter
    fn admit(&self, raw: &str, base: Option<&Url>) -> Option<Url> {
        match self.normalizer.normalize(raw, base) {
            Ok(url) if self.filter.admit(&url) => Some(url),
            Ok(url) => {
                tracing::debug!(url = %url, "Rejected by admission filter");
                None
            }
            Err(e) => {
                tracing::debug!("Skipping link {}: {}", raw, e);
                None
            }
        }
    }

    fn resolve(
        &mut self,
        url: &str,
        state: UrlState,
        title: Option<&str>,
        content_ref: Option<&str>,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE urls SET state = ?1, title = ?2, content_ref = ?3, error = ?4, updated_at = ?5
             WHERE url = ?6",
            params![
                state.to_db_string(),
                title,
                content_ref,
                error,
                now_millis(),
                lookup_key(url)
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::UrlNotFound(url.to_string()));
        }
        Ok(())
    }
}

/// Stored form of `url`; unparseable input is looked up verbatim
fn lookup_key(url: &str) -> String {
    normalize_url(url, None)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl Frontier for SqliteFrontier {
    // ===== URL Admission =====

    fn insert(&mut self, url: &str, source_url: Option<&str>, depth: u32) -> StorageResult<bool> {
        let base = source_url.and_then(|s| Url::parse(s).ok());
        let Some(url) = self.admit(url, base.as_ref()) else {
            return Ok(false);
        };

        let created = self.conn.execute(
            INSERT_SQL,
            params![
                url.as_str(),
                source_url,
                depth,
                UrlState::Pending.to_db_string(),
                now_millis()
            ],
        )?;
        Ok(created > 0)
    }

    fn insert_batch(
        &mut self,
        links: &[String],
        source_url: &str,
        depth: u32,
    ) -> StorageResult<usize> {
        let base = Url::parse(source_url).ok();
        let candidates: Vec<Url> = links
            .iter()
            .filter_map(|link| self.admit(link, base.as_ref()))
            .collect();

        if candidates.is_empty() {
            return Ok(0);
        }

        let now = now_millis();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut created = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for url in &candidates {
                created += stmt.execute(params![
                    url.as_str(),
                    source_url,
                    depth,
                    UrlState::Pending.to_db_string(),
                    now
                ])?;
            }
        }
        tx.commit()?;

        Ok(created)
    }

    // ===== Claim Protocol =====

    fn claim_random(&mut self) -> StorageResult<Option<UrlRecord>> {
        self.claim_random_at(Utc::now())
    }

    fn mark_success(
        &mut self,
        url: &str,
        title: Option<&str>,
        content_ref: Option<&str>,
    ) -> StorageResult<()> {
        self.resolve(url, UrlState::Success, title, content_ref, None)
    }

    fn mark_failed(&mut self, url: &str, error: &str) -> StorageResult<()> {
        self.resolve(url, UrlState::Failed, None, None, Some(error))
    }

    fn reclaim_stale(&mut self, timeout: Duration) -> StorageResult<usize> {
        self.reclaim_stale_as_of(Utc::now(), timeout)
    }

    // ===== Inspection =====

    fn stats(&self) -> StorageResult<FrontierStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM urls GROUP BY state")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = FrontierStats::default();
        for row in rows {
            let (state, count) = row?;
            let count = count as u64;
            stats.total += count;
            match UrlState::from_db_string(&state) {
                Some(UrlState::Pending) => stats.pending += count,
                Some(UrlState::Crawling) => stats.crawling += count,
                Some(UrlState::Success) => stats.success += count,
                Some(UrlState::Failed) => stats.failed += count,
                None => tracing::warn!("Unknown URL state in database: {}", state),
            }
        }

        Ok(stats)
    }

    fn get(&self, url: &str) -> StorageResult<Option<UrlRecord>> {
        let key = lookup_key(url);
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM urls WHERE url = ?1", URL_COLUMNS),
                params![key],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list_by_state(&self, state: UrlState, limit: usize) -> StorageResult<Vec<UrlRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM urls WHERE state = ?1 ORDER BY updated_at, id LIMIT ?2",
            URL_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![state.to_db_string(), limit], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Operator Tools =====

    fn reset_failed(&mut self, url_contains: Option<&str>) -> StorageResult<usize> {
        let reset = self.conn.execute(
            "UPDATE urls SET state = ?1, error = NULL, updated_at = ?2
             WHERE state = ?3 AND (?4 IS NULL OR instr(url, ?4) > 0)",
            params![
                UrlState::Pending.to_db_string(),
                now_millis(),
                UrlState::Failed.to_db_string(),
                url_contains
            ],
        )?;
        Ok(reset)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        stats: &FrontierStats,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2,
                 total = ?3, pending = ?4, crawling = ?5, success = ?6, failed = ?7
             WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                stats.total as i64,
                stats.pending as i64,
                stats.crawling as i64,
                stats.success as i64,
                stats.failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    Ok(UrlRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        source_url: row.get(2)?,
        depth: row.get(3)?,
        state: UrlState::from_db_string(&row.get::<_, String>(4)?).unwrap_or(UrlState::Failed),
        title: row.get(5)?,
        content_ref: row.get(6)?,
        error: row.get(7)?,
        created_at: from_millis(row.get(8)?),
        updated_at: from_millis(row.get(9)?),
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let total: Option<i64> = row.get(5)?;
    let final_stats = match total {
        Some(total) => Some(FrontierStats {
            total: total as u64,
            pending: row.get::<_, i64>(6)? as u64,
            crawling: row.get::<_, i64>(7)? as u64,
            success: row.get::<_, i64>(8)? as u64,
            failed: row.get::<_, i64>(9)? as u64,
        }),
        None => None,
    };

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        final_stats,
    })
}
