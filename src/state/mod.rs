//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlState`: the frontier state machine (pending, crawling, success, failed)

mod url_state;

pub use url_state::UrlState;
