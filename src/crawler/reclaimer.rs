//! Lease reclaimer
//!
//! Periodically returns `Crawling` rows whose claim is older than the lease
//! timeout to `Pending`. This is the only crash-recovery path: there is no
//! worker identity on a claim, just its timestamp.

use crate::storage::{SharedFrontier, StorageResult};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct Reclaimer {
    frontier: SharedFrontier,
    timeout: Duration,
    interval: Duration,
}

impl Reclaimer {
    pub fn new(frontier: SharedFrontier, timeout: Duration, interval: Duration) -> Self {
        Self {
            frontier,
            timeout,
            interval,
        }
    }

    /// One sweep; returns how many claims went back to `Pending`
    pub async fn sweep(&self) -> StorageResult<usize> {
        let reclaimed = self.frontier.reclaim_stale(self.timeout).await?;
        if reclaimed > 0 {
            tracing::info!(
                reclaimed,
                timeout_secs = self.timeout.as_secs(),
                "Reclaimed stale claims"
            );
        } else {
            tracing::debug!("No stale claims to reclaim");
        }
        Ok(reclaimed)
    }

    /// Sweeps every `interval` until cancelled; returns the total reclaimed
    ///
    /// The first sweep happens one interval after start. A failed sweep is
    /// logged and retried on the next tick.
    pub async fn run(self, cancel: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; the startup sweep is done by the caller
        ticker.tick().await;

        let mut total = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match self.sweep().await {
                    Ok(n) => total += n,
                    Err(e) => tracing::warn!("Reclaim sweep failed: {}", e),
                },
            }
        }

        tracing::debug!(total, "Reclaimer stopped");
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UrlState;
    use crate::storage::{RetryPolicy, SqliteFrontier};

    async fn frontier_with_claim() -> SharedFrontier {
        let frontier = SharedFrontier::new(
            SqliteFrontier::new_in_memory().unwrap(),
            RetryPolicy::default(),
        );
        frontier
            .insert("http://example.com/".to_string(), None, 0)
            .await
            .unwrap();
        assert!(frontier.claim_random().await.unwrap().is_some());
        frontier
    }

    #[tokio::test]
    async fn test_sweep_respects_timeout() {
        let frontier = frontier_with_claim().await;

        let patient = Reclaimer::new(
            frontier.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        assert_eq!(patient.sweep().await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let eager = Reclaimer::new(
            frontier.clone(),
            Duration::from_millis(1),
            Duration::from_secs(60),
        );
        assert_eq!(eager.sweep().await.unwrap(), 1);

        let record = frontier
            .get("http://example.com/".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.state, UrlState::Pending);
    }

    #[tokio::test]
    async fn test_run_sweeps_until_cancelled() {
        let frontier = frontier_with_claim().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let reclaimer = Reclaimer::new(
            frontier.clone(),
            Duration::from_millis(1),
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(reclaimer.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        let total = handle.await.unwrap();

        assert_eq!(total, 1);
        assert_eq!(frontier.stats().await.unwrap().pending, 1);
    }
}
