//! In-memory sitemap model
//!
//! This module holds the sitemap under construction during a crawl:
//! - URL records (location, last modification, change frequency, priority)
//! - The aggregator table keyed by canonical URL
//! - XML reading (prior sitemaps) and writing (final output)

mod reader;
mod writer;

pub use writer::SITEMAP_XMLNS;

use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::fmt;

/// Priority assigned to a URL when no priority function is configured
pub const DEFAULT_PRIORITY: f32 = 0.4;

/// How frequently a page is expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    /// Returns the sitemap-protocol token for this frequency
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        }
    }

    /// Parses a sitemap-protocol token, returning None for anything else
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "always" => Some(Self::Always),
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            "never" => Some(Self::Never),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `<url>` entry of a sitemap
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    /// Canonical absolute location
    pub loc: String,

    /// Last modification time, if known
    pub lastmod: Option<DateTime<FixedOffset>>,

    /// Change frequency hint, if known
    pub changefreq: Option<ChangeFreq>,

    /// Priority in [0.0, 1.0]
    pub priority: f32,
}

impl UrlRecord {
    /// Creates a record with the default priority and no hints
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod: None,
            changefreq: None,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Read-only mapping from canonical URL to a previously emitted record
pub type UrlIndex = HashMap<String, UrlRecord>;

/// The sitemap under construction
///
/// Records are kept in insertion order; `add` is idempotent on the canonical
/// location with most-recent-wins semantics, so re-registering a URL updates
/// its record in place instead of appending a duplicate.
#[derive(Debug, Clone, Default)]
pub struct Sitemap {
    records: Vec<UrlRecord>,
    index: HashMap<String, usize>,
}

impl Sitemap {
    /// Creates an empty sitemap
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, replacing any existing record with the same location
    pub fn add(&mut self, record: UrlRecord) {
        match self.index.get(&record.loc) {
            Some(&position) => self.records[position] = record,
            None => {
                self.index.insert(record.loc.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Looks up a record by its canonical location
    pub fn get(&self, loc: &str) -> Option<&UrlRecord> {
        self.index.get(loc).map(|&position| &self.records[position])
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the sitemap holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &UrlRecord> {
        self.records.iter()
    }

    /// Consumes the sitemap, yielding records in insertion order
    pub fn into_records(self) -> Vec<UrlRecord> {
        self.records
    }

    /// Consumes the sitemap into a location-keyed index, e.g. for use as the
    /// prior-sitemap index of a later crawl
    pub fn into_index(self) -> UrlIndex {
        self.records
            .into_iter()
            .map(|record| (record.loc.clone(), record))
            .collect()
    }

    /// Records sorted by priority descending; ties keep insertion order
    pub fn sorted_records(&self) -> Vec<&UrlRecord> {
        let mut sorted: Vec<&UrlRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(loc: &str, priority: f32) -> UrlRecord {
        UrlRecord {
            loc: loc.to_string(),
            lastmod: None,
            changefreq: None,
            priority,
        }
    }

    #[test]
    fn test_add_and_get() {
        let mut sitemap = Sitemap::new();
        sitemap.add(record("https://example.com/", 0.8));

        assert_eq!(sitemap.len(), 1);
        let found = sitemap.get("https://example.com/").unwrap();
        assert_eq!(found.priority, 0.8);
    }

    #[test]
    fn test_add_is_idempotent_most_recent_wins() {
        let mut sitemap = Sitemap::new();
        sitemap.add(record("https://example.com/a", 0.2));
        sitemap.add(record("https://example.com/b", 0.5));
        sitemap.add(record("https://example.com/a", 0.9));

        assert_eq!(sitemap.len(), 2);
        assert_eq!(sitemap.get("https://example.com/a").unwrap().priority, 0.9);

        // Insertion position is preserved on replacement
        let order: Vec<&str> = sitemap.iter().map(|r| r.loc.as_str()).collect();
        assert_eq!(order, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn test_sorted_records_priority_descending() {
        let mut sitemap = Sitemap::new();
        sitemap.add(record("https://example.com/low", 0.1));
        sitemap.add(record("https://example.com/high", 0.9));
        sitemap.add(record("https://example.com/mid", 0.5));

        let order: Vec<&str> = sitemap
            .sorted_records()
            .iter()
            .map(|r| r.loc.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "https://example.com/high",
                "https://example.com/mid",
                "https://example.com/low"
            ]
        );
    }

    #[test]
    fn test_sorted_records_ties_keep_insertion_order() {
        let mut sitemap = Sitemap::new();
        sitemap.add(record("https://example.com/first", 0.4));
        sitemap.add(record("https://example.com/second", 0.4));
        sitemap.add(record("https://example.com/third", 0.4));

        let order: Vec<&str> = sitemap
            .sorted_records()
            .iter()
            .map(|r| r.loc.as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "https://example.com/first",
                "https://example.com/second",
                "https://example.com/third"
            ]
        );
    }

    #[test]
    fn test_into_index() {
        let mut sitemap = Sitemap::new();
        sitemap.add(record("https://example.com/a", 0.4));
        sitemap.add(record("https://example.com/b", 0.6));

        let index = sitemap.into_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index["https://example.com/b"].priority, 0.6);
    }

    #[test]
    fn test_changefreq_tokens() {
        for (freq, token) in [
            (ChangeFreq::Always, "always"),
            (ChangeFreq::Hourly, "hourly"),
            (ChangeFreq::Daily, "daily"),
            (ChangeFreq::Weekly, "weekly"),
            (ChangeFreq::Monthly, "monthly"),
            (ChangeFreq::Yearly, "yearly"),
            (ChangeFreq::Never, "never"),
        ] {
            assert_eq!(freq.as_str(), token);
            assert_eq!(ChangeFreq::parse(token), Some(freq));
        }
        assert_eq!(ChangeFreq::parse("sometimes"), None);
    }
}
