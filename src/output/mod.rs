//! Output module for crawl reports and fetched pages
//!
//! This module handles:
//! - Formatting frontier statistics for the CLI
//! - Archiving fetched HTML to disk

pub mod archive;
pub mod stats;

pub use archive::PageArchive;
pub use stats::{format_statistics, load_statistics, print_statistics, CrawlStatistics};
