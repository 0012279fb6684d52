//! Storage module for the crawl frontier
//!
//! All SQL lives here. This module handles:
//! - SQLite database initialization and schema management
//! - The atomic frontier operations (insert, claim, resolve, reclaim)
//! - Run tracking
//! - The async, retrying handle used by workers

mod schema;
mod shared;
mod sqlite;
mod traits;

pub use shared::{FrontierOptions, RetryPolicy, SharedFrontier};
pub use sqlite::SqliteFrontier;
pub use traits::{Frontier, StorageError, StorageResult};

use crate::state::UrlState;
use chrono::{DateTime, Utc};
use std::fmt;

/// One frontier entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub id: i64,
    pub url: String,
    pub source_url: Option<String>,
    pub depth: u32,
    pub state: UrlState,
    pub title: Option<String>,
    pub content_ref: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of frontier counts by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub total: u64,
    pub pending: u64,
    pub crawling: u64,
    pub success: u64,
    pub failed: u64,
}

impl FrontierStats {
    /// Returns the count for a single state
    pub fn count(&self, state: UrlState) -> u64 {
        match state {
            UrlState::Pending => self.pending,
            UrlState::Crawling => self.crawling,
            UrlState::Success => self.success,
            UrlState::Failed => self.failed,
        }
    }

    /// True when nothing is left to claim and nothing is in progress
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.crawling == 0
    }
}

impl fmt::Display for FrontierStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} pending={} crawling={} success={} failed={}",
            self.total, self.pending, self.crawling, self.success, self.failed
        )
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    /// Frontier counts recorded when the run finished
    pub final_stats: Option<FrontierStats>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Interrupted,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_stats_count_and_drained() {
        let stats = FrontierStats {
            total: 5,
            pending: 0,
            crawling: 0,
            success: 3,
            failed: 2,
        };
        assert_eq!(stats.count(UrlState::Success), 3);
        assert_eq!(stats.count(UrlState::Failed), 2);
        assert!(stats.is_drained());

        let busy = FrontierStats {
            crawling: 1,
            ..stats
        };
        assert!(!busy.is_drained());
    }

    #[test]
    fn test_stats_display() {
        let stats = FrontierStats {
            total: 3,
            pending: 2,
            crawling: 0,
            success: 1,
            failed: 0,
        };
        assert_eq!(
            stats.to_string(),
            "total=3 pending=2 crawling=0 success=1 failed=0"
        );
    }
}
