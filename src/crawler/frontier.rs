//! Crawl frontier: work queue plus dedup registry
//!
//! The frontier is the single source of truth for what needs fetching.
//! Every URL passes through it exactly once: offered, handed to a worker,
//! marked done. When the pending queue is empty and no fetch is in flight,
//! the frontier closes itself and all blocked takers observe the end of
//! the crawl.

use crate::url::canonicalize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use url::Url;

/// Result of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// The URL was new and has been queued
    Accepted,
    /// The URL was seen before and was silently dropped
    Duplicate,
    /// The frontier is closed and no longer accepts work
    Closed,
    /// The URL could not be canonicalized (unsupported scheme, no host)
    Invalid,
}

/// Lifecycle of a single URL inside the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlStatus {
    Pending,
    InFlight,
    Done,
}

#[derive(Debug, Default)]
struct FrontierState {
    statuses: HashMap<String, UrlStatus>,
    queue: VecDeque<Url>,
    in_flight: usize,
    closed: bool,
}

/// Work queue and dedup registry for the crawl
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    notify: Notify,
}

impl Frontier {
    /// Creates an empty, open frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a URL for crawling
    ///
    /// The URL is canonicalized before the dedup check; a URL is queued at
    /// most once over the frontier's lifetime regardless of how many forms
    /// it is offered in.
    pub fn offer(&self, url: &Url) -> OfferOutcome {
        let canonical = match canonicalize(url) {
            Ok(canonical) => canonical,
            Err(_) => return OfferOutcome::Invalid,
        };

        let mut state = self.lock();
        if state.closed {
            return OfferOutcome::Closed;
        }
        if state.statuses.contains_key(canonical.as_str()) {
            return OfferOutcome::Duplicate;
        }

        state
            .statuses
            .insert(canonical.as_str().to_string(), UrlStatus::Pending);
        state.queue.push_back(canonical);
        drop(state);

        self.notify.notify_waiters();
        OfferOutcome::Accepted
    }

    /// Takes the next URL to fetch, blocking until one is available
    ///
    /// Returns None once the frontier is closed, either explicitly or
    /// because the queue drained while nothing was in flight.
    pub async fn take(&self) -> Option<Url> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Arm the waiter before inspecting state so a wakeup between the
            // check and the await is not lost.
            notified.as_mut().enable();

            {
                let mut guard = self.lock();
                let state = &mut *guard;
                if let Some(url) = state.queue.pop_front() {
                    if let Some(status) = state.statuses.get_mut(url.as_str()) {
                        *status = UrlStatus::InFlight;
                    }
                    state.in_flight += 1;
                    return Some(url);
                }
                if state.closed || state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks a previously taken URL as finished
    ///
    /// If this was the last in-flight URL and the queue is empty, the
    /// frontier closes and all blocked takers are released.
    pub fn mark_done(&self, url: &Url) {
        let mut state = self.lock();
        if let Some(status) = state.statuses.get_mut(url.as_str()) {
            *status = UrlStatus::Done;
        }
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.queue.is_empty() && state.in_flight == 0 {
            state.closed = true;
        }
        drop(state);

        self.notify.notify_waiters();
    }

    /// Registers a URL as done without it ever entering the queue
    ///
    /// Used for post-redirect final URLs, so a later link to the final
    /// location does not trigger a second fetch of a page already visited.
    pub fn record_done(&self, url: &Url) {
        let mut state = self.lock();
        state
            .statuses
            .entry(url.as_str().to_string())
            .or_insert(UrlStatus::Done);
    }

    /// The sole termination predicate: nothing queued and nothing in flight
    pub fn idle_and_empty(&self) -> bool {
        let state = self.lock();
        state.queue.is_empty() && state.in_flight == 0
    }

    /// Closes the frontier: pending work is dropped, new offers are
    /// rejected, and blocked takers are released
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.queue.clear();
        drop(state);

        self.notify.notify_waiters();
    }

    /// Number of distinct URLs ever offered (or recorded done)
    pub fn discovered(&self) -> usize {
        self.lock().statuses.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
