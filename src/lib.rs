//! Sitemapper: a polite sitemap-generating web crawler
//!
//! This crate crawls every reachable same-origin page of a seed site with a
//! bounded pool of workers, extracts outbound links, and aggregates the
//! visited URLs into a sitemap-protocol-0.9 document with per-URL priority,
//! change-frequency, and last-modification hints. A previously emitted
//! sitemap can be fed back in to skip pages that have not changed recently.

pub mod crawler;
pub mod options;
pub mod sitemap;
pub mod url;

use thiserror::Error;

/// Main error type for sitemapper operations
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Options error: {0}")]
    Options(#[from] OptionsError),

    #[error("Invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("Sitemap error: {0}")]
    Sitemap(#[from] SitemapError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl worker failed: {0}")]
    Worker(String),
}

/// Errors raised while validating crawl options
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(#[from] ::url::ParseError),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Errors raised while reading or writing sitemap XML
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed sitemap: {0}")]
    Malformed(String),
}

/// Result type alias for sitemapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for sitemap read/write operations
pub type SitemapResult<T> = std::result::Result<T, SitemapError>;

// Re-export commonly used types
pub use crawler::{crawl_domain, Coordinator, ShutdownHandle};
pub use options::CrawlOptions;
pub use sitemap::{ChangeFreq, Sitemap, UrlRecord};
