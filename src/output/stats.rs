//! Frontier statistics reporting
//!
//! This module loads a statistics snapshot from the frontier and formats it
//! for the `--stats` command and the end-of-run report.

use crate::state::UrlState;
use crate::storage::{Frontier, FrontierStats, RunRecord};
use crate::SpiderError;
use std::fmt::Write as _;

/// Frontier statistics plus the most recent run
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub frontier: FrontierStats,
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Share of resolved URLs that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        let resolved = self.frontier.success + self.frontier.failed;
        if resolved == 0 {
            0.0
        } else {
            self.frontier.success as f64 / resolved as f64 * 100.0
        }
    }
}

/// Loads statistics from the frontier
///
/// # Arguments
///
/// * `frontier` - The frontier to query
pub fn load_statistics(frontier: &dyn Frontier) -> Result<CrawlStatistics, SpiderError> {
    Ok(CrawlStatistics {
        frontier: frontier.stats()?,
        latest_run: frontier.get_latest_run()?,
    })
}

/// Formats statistics as the multi-line report printed by the CLI
pub fn format_statistics(stats: &CrawlStatistics) -> String {
    let mut out = String::new();
    let total = stats.frontier.total;

    let _ = writeln!(out, "=== Frontier Statistics ===\n");
    let _ = writeln!(out, "Total URLs: {}", total);

    for state in UrlState::all_states() {
        let count = stats.frontier.count(state);
        let percentage = if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {:<9} {:>8} ({:.1}%)", state, count, percentage);
    }

    let _ = writeln!(
        out,
        "\nSuccess Rate: {:.1}% ({} / {} resolved URLs)",
        stats.success_rate(),
        stats.frontier.success,
        stats.frontier.success + stats.frontier.failed
    );

    if let Some(run) = &stats.latest_run {
        let _ = writeln!(out, "\nLatest Run: #{} ({})", run.id, run.status.to_db_string());
        let _ = writeln!(out, "  Started:  {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            let _ = writeln!(out, "  Finished: {}", finished);
        }
        let _ = writeln!(out, "  Config:   {}", run.config_hash);
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    print!("{}", format_statistics(stats));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RunStatus, SqliteFrontier};

    fn sample() -> CrawlStatistics {
        CrawlStatistics {
            frontier: FrontierStats {
                total: 10,
                pending: 4,
                crawling: 1,
                success: 3,
                failed: 2,
            },
            latest_run: None,
        }
    }

    #[test]
    fn test_success_rate() {
        let stats = sample();
        assert!((stats.success_rate() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_rate_empty() {
        let stats = CrawlStatistics {
            frontier: FrontierStats::default(),
            latest_run: None,
        };
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_format_lists_every_state() {
        let report = format_statistics(&sample());
        assert!(report.contains("Total URLs: 10"));
        for state in ["Pending", "Crawling", "Success", "Failed"] {
            assert!(report.contains(state), "missing {}", state);
        }
        assert!(report.contains("(40.0%)"));
        assert!(!report.contains("Latest Run"));
    }

    #[test]
    fn test_load_statistics_with_run() {
        let mut frontier = SqliteFrontier::new_in_memory().unwrap();
        frontier.insert("http://a/", None, 0).unwrap();
        let run_id = frontier.create_run("hash").unwrap();
        let snapshot = frontier.stats().unwrap();
        frontier
            .finish_run(run_id, RunStatus::Interrupted, &snapshot)
            .unwrap();

        let stats = load_statistics(&frontier).unwrap();
        assert_eq!(stats.frontier.pending, 1);

        let report = format_statistics(&stats);
        assert!(report.contains("Latest Run: #1 (interrupted)"));
        assert!(report.contains("Config:   hash"));
    }
}
