//! Crawl counters
//!
//! Workers bump these as they go; the coordinator reads them once at the
//! end for the crawl-done event.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counters updated by workers during the crawl
#[derive(Debug, Default)]
pub struct CrawlStats {
    fetched: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    carried: AtomicUsize,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// URLs fetched with 2xx and registered
    pub fetched: usize,
    /// URLs that produced a transient fault (network, timeout, non-2xx)
    pub failed: usize,
    /// URLs the crawl validator declined to fetch
    pub skipped: usize,
    /// Prior-sitemap records carried forward for skipped URLs
    pub carried: usize,
}

impl CrawlStats {
    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_carried(&self) {
        self.carried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            carried: self.carried.load(Ordering::Relaxed),
        }
    }
}
