//! Crawl coordination
//!
//! The coordinator owns the crawl lifecycle:
//! - validating the seed URL and options
//! - seeding the frontier and launching the worker pool
//! - arming the optional whole-crawl deadline
//! - detecting termination (frontier idle-and-empty, deadline expiry, or
//!   an external shutdown request)
//! - draining workers within a bounded grace period
//! - handing the aggregated sitemap back to the caller

use crate::crawler::fetcher::{fetch_url, FetchOutcome};
use crate::crawler::frontier::Frontier;
use crate::crawler::reader::{LinkCandidate, LinkKind, RawLink};
use crate::crawler::stats::CrawlStats;
use crate::options::{CrawlOptions, CrawlValidator, PriorityFn, ReadLinkObserver};
use crate::sitemap::{Sitemap, UrlIndex, UrlRecord, DEFAULT_PRIORITY};
use crate::url::{parse_seed, resolve_candidate, same_host};
use crate::{MapperError, UrlError};
use chrono::{DateTime, FixedOffset};
use futures_util::future::join_all;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

/// How long draining workers get to quiesce before being aborted
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// User agent advertised by the built-in client
const USER_AGENT: &str = concat!("sitemapper/", env!("CARGO_PKG_VERSION"));

/// Global lifecycle of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Init,
    Running,
    Draining,
    Done,
}

/// Requests early termination of a running crawl
///
/// Obtained from [`Coordinator::shutdown_handle`] before the crawl starts.
/// Shutting down closes the frontier, aborts in-flight fetches, and lets
/// the crawl finish with whatever the aggregator holds.
#[derive(Clone)]
pub struct ShutdownHandle {
    cancel: Arc<watch::Sender<bool>>,
    frontier: Arc<Frontier>,
}

impl ShutdownHandle {
    /// Signals the crawl to stop
    pub fn shutdown(&self) {
        let _ = self.cancel.send(true);
        self.frontier.close();
    }
}

/// Everything a worker needs, shared across the pool
struct CrawlContext {
    client: Client,
    frontier: Arc<Frontier>,
    sitemap: Arc<Mutex<Sitemap>>,
    stats: Arc<CrawlStats>,
    seed_host: String,
    request_timeout: Duration,
    prior_urls: UrlIndex,
    crawl_validator: Option<CrawlValidator>,
    read_link: Option<ReadLinkObserver>,
    priority: Option<PriorityFn>,
}

/// Owns and drives a single crawl
pub struct Coordinator {
    seed: Url,
    options: CrawlOptions,
    client: Client,
    frontier: Arc<Frontier>,
    sitemap: Arc<Mutex<Sitemap>>,
    stats: Arc<CrawlStats>,
    cancel: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
    phase: watch::Sender<CrawlPhase>,
}

impl Coordinator {
    /// Validates the seed and options and prepares the crawl
    ///
    /// # Arguments
    ///
    /// * `seed` - The URL the crawl starts from
    /// * `options` - Crawl configuration; see [`CrawlOptions`]
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(MapperError)` - The seed or options are unusable
    pub fn new(seed: &str, options: CrawlOptions) -> Result<Self, MapperError> {
        options.validate()?;

        let seed_url = parse_seed(seed).map_err(|error| MapperError::InvalidSeed {
            url: seed.to_string(),
            reason: error.to_string(),
        })?;

        let client = match &options.http_client {
            Some(client) => client.clone(),
            None => build_client(&options)?,
        };

        let frontier = Arc::new(Frontier::new());
        frontier.offer(&seed_url);

        let (cancel, cancel_rx) = watch::channel(false);
        let (phase, _) = watch::channel(CrawlPhase::Init);

        Ok(Self {
            seed: seed_url,
            options,
            client,
            frontier,
            sitemap: Arc::new(Mutex::new(Sitemap::new())),
            stats: Arc::new(CrawlStats::default()),
            cancel: Arc::new(cancel),
            cancel_rx,
            phase,
        })
    }

    /// Returns a handle for requesting early termination
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            cancel: Arc::clone(&self.cancel),
            frontier: Arc::clone(&self.frontier),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> CrawlPhase {
        *self.phase.borrow()
    }

    /// Subscribes to lifecycle phase changes
    ///
    /// The receiver observes every transition of the
    /// `Init -> Running -> Draining -> Done` machine while `run` drives it.
    pub fn phase_watch(&self) -> watch::Receiver<CrawlPhase> {
        self.phase.subscribe()
    }

    /// Runs the crawl to completion and returns the aggregated sitemap
    pub async fn run(mut self) -> Result<Sitemap, MapperError> {
        self.phase.send_replace(CrawlPhase::Running);
        let workers = self.options.max_concurrency;
        tracing::info!(seed = %self.seed, workers, "crawl start");

        let seed_host = self
            .seed
            .host_str()
            .ok_or(UrlError::MissingHost)?
            .to_string();

        let context = Arc::new(CrawlContext {
            client: self.client.clone(),
            frontier: Arc::clone(&self.frontier),
            sitemap: Arc::clone(&self.sitemap),
            stats: Arc::clone(&self.stats),
            seed_host,
            request_timeout: self.options.request_timeout,
            prior_urls: std::mem::take(&mut self.options.prior_urls),
            crawl_validator: self.options.crawl_validator.take(),
            read_link: self.options.read_link.take(),
            priority: self.options.priority.take(),
        });

        let mut abort_handles = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let handle = tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&context),
                self.cancel_rx.clone(),
            ));
            abort_handles.push(handle.abort_handle());
            handles.push(handle);
        }
        drop(context);

        let mut joined = join_all(handles);
        let crawl_timeout = self.options.crawl_timeout;
        let mut shutdown = self.cancel_rx.clone();

        // Race the workers against both early-termination triggers: an
        // external shutdown request, and the deadline when one is set.
        // Natural completion means the frontier drained and every worker
        // already exited.
        let natural = if crawl_timeout.is_zero() {
            tokio::select! {
                results = &mut joined => {
                    check_worker_results(results)?;
                    true
                }
                _ = shutdown.changed() => {
                    tracing::debug!("shutdown requested, draining");
                    false
                }
            }
        } else {
            tokio::select! {
                results = &mut joined => {
                    check_worker_results(results)?;
                    true
                }
                _ = shutdown.changed() => {
                    tracing::debug!("shutdown requested, draining");
                    false
                }
                _ = tokio::time::sleep(crawl_timeout) => {
                    tracing::debug!(timeout = ?crawl_timeout, "crawl deadline reached, draining");
                    false
                }
            }
        };

        self.phase.send_replace(CrawlPhase::Draining);
        if !natural {
            let _ = self.cancel.send(true);
            self.frontier.close();

            match tokio::time::timeout(GRACE_PERIOD, &mut joined).await {
                Ok(results) => check_worker_results(results)?,
                Err(_) => {
                    tracing::warn!("workers did not quiesce within grace period, aborting");
                    for abort in &abort_handles {
                        abort.abort();
                    }
                    let _ = (&mut joined).await;
                }
            }
        }

        self.phase.send_replace(CrawlPhase::Done);
        let snapshot = self.stats.snapshot();
        tracing::info!(
            discovered = self.frontier.discovered(),
            fetched = snapshot.fetched,
            failed = snapshot.failed,
            skipped = snapshot.skipped,
            carried = snapshot.carried,
            "crawl done"
        );

        let sitemap = match Arc::try_unwrap(self.sitemap) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(shared) => shared
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        };
        Ok(sitemap)
    }
}

/// Crawls every reachable same-origin page of `seed` and returns the
/// aggregated sitemap
///
/// This is the main entry point of the crate.
///
/// # Arguments
///
/// * `seed` - The URL the crawl starts from
/// * `options` - Crawl configuration
///
/// # Returns
///
/// * `Ok(Sitemap)` - The crawled URLs with their priorities and hints
/// * `Err(MapperError)` - The seed or options are unusable, or a worker
///   failed fatally
///
/// # Example
///
/// ```no_run
/// use sitemapper::{crawl_domain, CrawlOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sitemap = crawl_domain("https://example.com/", CrawlOptions::new()).await?;
/// sitemap.write_to(std::io::stdout(), None)?;
/// # Ok(())
/// # }
/// ```
pub async fn crawl_domain(seed: &str, options: CrawlOptions) -> Result<Sitemap, MapperError> {
    Coordinator::new(seed, options)?.run().await
}

fn build_client(options: &CrawlOptions) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(options.max_concurrency)
        .pool_idle_timeout(options.keep_alive)
        .gzip(true)
        .build()
}

fn check_worker_results(
    results: Vec<Result<(), tokio::task::JoinError>>,
) -> Result<(), MapperError> {
    for result in results {
        if let Err(error) = result {
            if error.is_panic() {
                return Err(MapperError::Worker(error.to_string()));
            }
        }
    }
    Ok(())
}

/// One fetch worker: takes URLs from the frontier until it closes
async fn worker_loop(
    worker_id: usize,
    context: Arc<CrawlContext>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        // Poll the frontier first: if a URL is ready it must be processed
        // (or at least marked done), never silently dropped. Cancellation
        // closes the frontier anyway, so take() observes it on the next poll.
        let url = tokio::select! {
            biased;
            taken = context.frontier.take() => match taken {
                Some(url) => url,
                None => break,
            },
            _ = cancel.changed() => break,
        };

        let prior = context.prior_urls.get(url.as_str());
        if let Some(validator) = &context.crawl_validator {
            if !validator(&url, prior) {
                tracing::debug!(url = %url, reason = "validator", "url skipped");
                context.stats.record_skipped();
                if let Some(record) = prior {
                    context.stats.record_carried();
                    lock_sitemap(&context).add(record.clone());
                }
                context.frontier.mark_done(&url);
                continue;
            }
        }

        let outcome = tokio::select! {
            outcome = fetch_url(&context.client, &url, context.request_timeout) => outcome,
            _ = cancel.changed() => {
                context.frontier.mark_done(&url);
                break;
            }
        };

        match outcome {
            FetchOutcome::Page {
                final_url,
                status,
                bytes,
                last_modified,
                links,
            } => {
                tracing::debug!(url = %final_url, status, bytes, "url fetched");
                register(&context, &final_url, last_modified);
                if final_url != url {
                    context.frontier.record_done(&final_url);
                }
                follow_links(&context, &final_url, &links);
            }
            FetchOutcome::Resource {
                final_url,
                status,
                bytes,
                last_modified,
            } => {
                tracing::debug!(url = %final_url, status, bytes, "url fetched (not html)");
                register(&context, &final_url, last_modified);
                if final_url != url {
                    context.frontier.record_done(&final_url);
                }
            }
            FetchOutcome::Failed { error } => {
                tracing::debug!(url = %url, error = %error, "url skipped");
                context.stats.record_failed();
            }
        }

        context.frontier.mark_done(&url);
    }

    tracing::trace!(worker = worker_id, "worker exited");
}

/// Registers a fetched URL in the aggregator
fn register(context: &CrawlContext, url: &Url, last_modified: Option<DateTime<FixedOffset>>) {
    let priority = context
        .priority
        .as_ref()
        .map(|assign| assign(url))
        .unwrap_or(DEFAULT_PRIORITY)
        .clamp(0.0, 1.0);

    lock_sitemap(context).add(UrlRecord {
        loc: url.to_string(),
        lastmod: last_modified,
        changefreq: None,
        priority,
    });
    context.stats.record_fetched();
}

/// Resolves the page's candidates, notifies the observer, and offers
/// same-origin anchors back to the frontier
fn follow_links(context: &CrawlContext, page: &Url, links: &[RawLink]) {
    for raw in links {
        let Some(resolved) = resolve_candidate(page, &raw.href) else {
            continue;
        };

        if let Some(observer) = &context.read_link {
            let candidate = LinkCandidate {
                kind: raw.kind,
                href: &raw.href,
                page,
            };
            observer(&resolved, &candidate);
        }

        if raw.kind == LinkKind::Anchor && same_host(&context.seed_host, &resolved) {
            context.frontier.offer(&resolved);
        }
    }
}

fn lock_sitemap(context: &CrawlContext) -> std::sync::MutexGuard<'_, Sitemap> {
    context
        .sitemap
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
