//! URL handling module for WebSpider
//!
//! This module provides URL normalization, the extension/pattern denylist,
//! and the admission filters consulted before a URL enters the frontier.

mod filter;
mod normalize;

pub use filter::{
    build_admission_filter, matches_wildcard, AdmissionFilter, AllowAll, DomainFilter,
    FilterChain, KeywordFilter,
};
pub use normalize::{
    normalize_url, Normalizer, DEFAULT_DENIED_EXTENSIONS, DEFAULT_DENIED_PATTERNS,
};
