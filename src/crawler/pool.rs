//! Bounded pool of heavy fetch slots shared across workers
//!
//! The pool is sized independently of the worker count, so many workers can
//! be claiming and resolving URLs while only a few run an expensive fetch at
//! a time.

use crate::crawler::fetcher::{FetchError, FetchedPage, Fetcher};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Counting pool of render slots
#[derive(Debug, Clone)]
pub struct RenderPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl RenderPool {
    /// Creates a pool with `size` slots (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a slot; the slot is released when the permit drops
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, FetchError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Other("render pool closed".to_string()))
    }
}

/// Wraps a fetcher so every fetch holds a render slot
pub struct PooledFetcher {
    inner: Arc<dyn Fetcher>,
    pool: RenderPool,
}

impl PooledFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, pool: RenderPool) -> Self {
        Self { inner, pool }
    }

    pub fn pool(&self) -> &RenderPool {
        &self.pool
    }
}

#[async_trait]
impl Fetcher for PooledFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let _permit = self.pool.acquire().await?;
        self.inner.fetch(url).await
    }
}
