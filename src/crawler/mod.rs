//! Crawl engine
//!
//! This module contains the core crawling machinery:
//! - The frontier (work queue plus dedup registry)
//! - Single-attempt HTTP fetching with streaming bodies
//! - Streaming link extraction from HTML
//! - Worker-pool coordination, deadline, and cancellation

mod coordinator;
mod fetcher;
mod frontier;
mod reader;
mod stats;

pub use coordinator::{crawl_domain, Coordinator, CrawlPhase, ShutdownHandle};
pub use fetcher::{fetch_url, FetchError, FetchOutcome, MAX_BODY_BYTES};
pub use frontier::{Frontier, OfferOutcome};
pub use reader::{LinkCandidate, LinkKind, LinkReader, RawLink, ReaderError, MAX_LINKS_PER_PAGE};
pub use stats::{CrawlStats, StatsSnapshot};
