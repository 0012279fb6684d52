//! Crawler module for claiming, fetching and resolving frontier URLs
//!
//! This module contains the core crawling logic, including:
//! - The fetch/extract collaborator and its HTTP implementation
//! - HTML parsing, link extraction and relevance classification
//! - The worker loop and the lease reclaimer
//! - Overall crawl orchestration and shutdown

mod classifier;
mod coordinator;
mod fetcher;
mod parser;
mod pool;
mod reclaimer;
mod worker;

pub use classifier::{KeywordClassifier, Relevance};
pub use coordinator::{shutdown_signals, CrawlSummary, Orchestrator};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use parser::{parse_html, ParsedPage};
pub use pool::{PooledFetcher, RenderPool};
pub use reclaimer::Reclaimer;
pub use worker::{CrawlCounters, Worker, WorkerSettings};
