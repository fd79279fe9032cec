//! Crawl configuration
//!
//! [`CrawlOptions`] carries everything a crawl can be tuned with: pool
//! size, timeouts, the HTTP client, the prior-sitemap index, and the
//! caller-supplied hooks (crawl validator, read-link observer, priority
//! function). Every field has a documented default; `validate` is run by
//! the coordinator before any fetch happens.

use crate::crawler::LinkCandidate;
use crate::sitemap::{UrlIndex, UrlRecord};
use crate::OptionsError;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default number of fetch workers
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default idle-connection keep-alive
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Decides whether a same-origin URL is actually fetched
///
/// Receives the resolved URL and its prior-sitemap record, if any.
/// Returning false marks the URL done without fetching; a prior record is
/// then carried into the output unchanged.
pub type CrawlValidator = Box<dyn Fn(&Url, Option<&UrlRecord>) -> bool + Send + Sync>;

/// Observes every extracted link candidate
///
/// Receives the resolved absolute URL and the raw candidate. Must not
/// block or mutate shared state.
pub type ReadLinkObserver = Box<dyn Fn(&Url, &LinkCandidate<'_>) + Send + Sync>;

/// Assigns a priority in [0.0, 1.0] to a registered URL
pub type PriorityFn = Box<dyn Fn(&Url) -> f32 + Send + Sync>;

/// Configuration for a single crawl
pub struct CrawlOptions {
    /// Fetch worker count; also caps simultaneous and idle connections
    pub max_concurrency: usize,

    /// Whole-crawl deadline; zero means unbounded
    pub crawl_timeout: Duration,

    /// Per-request timeout covering connect, headers, and body read
    pub request_timeout: Duration,

    /// Idle-connection keep-alive for the built-in client
    pub keep_alive: Duration,

    /// Pre-built HTTP client; one is built from the options when absent
    pub http_client: Option<Client>,

    /// Prior-sitemap records keyed by canonical URL
    pub prior_urls: UrlIndex,

    /// Optional fetch gate evaluated per same-origin URL
    pub crawl_validator: Option<CrawlValidator>,

    /// Optional observer invoked per extracted link candidate
    pub read_link: Option<ReadLinkObserver>,

    /// Optional priority function; absent means the constant default
    pub priority: Option<PriorityFn>,

    /// Verbatim XML prologue for the serialized sitemap
    pub xml_prologue: Option<String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_CONCURRENCY,
            crawl_timeout: Duration::ZERO,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            keep_alive: DEFAULT_KEEP_ALIVE,
            http_client: None,
            prior_urls: UrlIndex::new(),
            crawl_validator: None,
            read_link: None,
            priority: None,
            xml_prologue: None,
        }
    }
}

impl CrawlOptions {
    /// Creates options with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_crawl_timeout(mut self, crawl_timeout: Duration) -> Self {
        self.crawl_timeout = crawl_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_prior_urls(mut self, prior_urls: UrlIndex) -> Self {
        self.prior_urls = prior_urls;
        self
    }

    pub fn with_crawl_validator(mut self, validator: CrawlValidator) -> Self {
        self.crawl_validator = Some(validator);
        self
    }

    pub fn with_read_link(mut self, observer: ReadLinkObserver) -> Self {
        self.read_link = Some(observer);
        self
    }

    pub fn with_priority(mut self, priority: PriorityFn) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_xml_prologue(mut self, prologue: impl Into<String>) -> Self {
        self.xml_prologue = Some(prologue.into());
        self
    }

    /// Validates the options
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The options are usable
    /// * `Err(OptionsError)` - A value is out of range
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.max_concurrency < 1 || self.max_concurrency > 100 {
            return Err(OptionsError::Validation(format!(
                "max_concurrency must be between 1 and 100, got {}",
                self.max_concurrency
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(OptionsError::Validation(
                "request_timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
