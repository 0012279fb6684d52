//! Keyword relevance classifier for fetched pages
//!
//! Counts keyword hits across weighted regions of the page:
//!
//! | Region | Weight |
//! |--------|--------|
//! | `<title>` | 5 |
//! | `<meta name="keywords">` / `<meta name="description">` | 3 |
//! | `<h1>`..`<h6>` | 2 |
//! | All document text outside `<script>`/`<style>` | 1 |
//!
//! A page is relevant when any of these hold:
//! - at least [`MIN_DISTINCT_KEYWORDS`] distinct keywords appear;
//! - the weighted hit count reaches [`MIN_WEIGHTED_HITS`];
//! - the `<title>` contains at least [`MIN_TITLE_KEYWORDS`] of the separate
//!   title keyword list.

use scraper::{Html, Selector};

const TITLE_WEIGHT: usize = 5;
const META_WEIGHT: usize = 3;
const HEADING_WEIGHT: usize = 2;
const TEXT_WEIGHT: usize = 1;

/// Distinct keywords needed for a page to count as relevant
pub const MIN_DISTINCT_KEYWORDS: usize = 3;

/// Weighted hits needed for a page to count as relevant
pub const MIN_WEIGHTED_HITS: usize = 5;

/// Title keywords that make a page relevant on their own
pub const MIN_TITLE_KEYWORDS: usize = 2;

/// Outcome of classifying one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relevance {
    /// Keywords that appeared anywhere in the weighted regions
    pub matched: Vec<String>,
    /// Sum of per-region occurrence counts times region weight
    pub score: usize,
    /// Title keywords found in `<title>`
    pub title_matched: Vec<String>,
}

impl Relevance {
    pub fn is_relevant(&self) -> bool {
        self.matched.len() >= MIN_DISTINCT_KEYWORDS
            || self.score >= MIN_WEIGHTED_HITS
            || self.title_matched.len() >= MIN_TITLE_KEYWORDS
    }
}

/// Case-insensitive topical keyword classifier
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
    title_keywords: Vec<String>,
}

impl KeywordClassifier {
    /// Builds a classifier; keywords are lowercased and deduplicated
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: normalize_keywords(keywords),
            title_keywords: Vec::new(),
        }
    }

    /// Adds high-priority keywords that are looked for in `<title>` only
    pub fn with_title_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.title_keywords = normalize_keywords(keywords);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.title_keywords.is_empty()
    }

    /// Scores an HTML document against the keyword list
    pub fn classify(&self, html: &str) -> Relevance {
        let document = Html::parse_document(html);
        let title = select_text(&document, "title");
        let title_matched = self
            .title_keywords
            .iter()
            .filter(|keyword| title.contains(keyword.as_str()))
            .cloned()
            .collect();

        let regions = [
            (title, TITLE_WEIGHT),
            (meta_text(&document), META_WEIGHT),
            (select_text(&document, "h1, h2, h3, h4, h5, h6"), HEADING_WEIGHT),
            (visible_text(&document), TEXT_WEIGHT),
        ];

        let mut matched = Vec::new();
        let mut score = 0;
        for keyword in &self.keywords {
            let hits: usize = regions
                .iter()
                .map(|(text, weight)| text.matches(keyword.as_str()).count() * weight)
                .sum();
            if hits > 0 {
                matched.push(keyword.clone());
                score += hits;
            }
        }

        Relevance {
            matched,
            score,
            title_matched,
        }
    }
}

/// Lowercased, trimmed, sorted and deduplicated
fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    keywords.sort();
    keywords.dedup();
    keywords
}

/// Lowercased text of every element matching `selector`
fn select_text(document: &Html, selector: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };

    let mut out = String::new();
    for element in document.select(&selector) {
        for text in element.text() {
            out.push_str(text);
        }
        out.push(' ');
    }
    out.to_lowercase()
}

fn meta_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("meta[name][content]") else {
        return String::new();
    };

    let mut out = String::new();
    for element in document.select(&selector) {
        let name = element.value().attr("name").unwrap_or_default();
        if name.eq_ignore_ascii_case("keywords") || name.eq_ignore_ascii_case("description") {
            out.push_str(element.value().attr("content").unwrap_or_default());
            out.push(' ');
        }
    }
    out.to_lowercase()
}

/// Lowercased document text, skipping script and style contents
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out.to_lowercase()
}
