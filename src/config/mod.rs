//! Configuration module for WebSpider
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use webspider::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("webspider.toml")).unwrap();
//! println!("Crawling to depth {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlMode, CrawlerConfig, FetchConfig, FilterConfig, ReclaimConfig, ShutdownConfig,
    StorageConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_pattern_file, parse_config,
};
