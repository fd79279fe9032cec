//! Sitemapper main entry point
//!
//! Command-line interface for crawling a site and writing its sitemap.

use chrono::Utc;
use clap::Parser;
use sitemapper::options::{CrawlValidator, PriorityFn};
use sitemapper::sitemap::{Sitemap, UrlIndex, DEFAULT_PRIORITY};
use sitemapper::{crawl_domain, CrawlOptions};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Sitemapper: crawl a site and emit its sitemap
///
/// Walks every reachable same-origin page starting from URL and writes a
/// sitemap-protocol-0.9 document. An existing output file is read back as
/// the prior sitemap so unchanged pages can be skipped.
#[derive(Parser, Debug)]
#[command(name = "sitemapper")]
#[command(version)]
#[command(about = "Crawl a site and emit its sitemap", long_about = None)]
struct Cli {
    /// URL to crawl
    #[arg(value_name = "URL")]
    url: String,

    /// Maximum concurrency
    #[arg(short, long, default_value_t = 8)]
    concurrency: usize,

    /// Maximum crawl time in seconds (0 = unbounded)
    #[arg(short = 'w', long, default_value_t = 0)]
    crawl_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Idle connection keep-alive in seconds
    #[arg(short, long, default_value_t = 30)]
    keep_alive: u64,

    /// Output file name
    #[arg(short, long, default_value = "sitemap.xml")]
    output: PathBuf,

    /// Verbatim XML prologue written in place of the default header
    #[arg(long, value_name = "XML")]
    xml_header: Option<String>,

    /// Re-crawl interval in hours; pages whose prior lastmod is younger
    /// are skipped (0 disables the prior sitemap entirely)
    #[arg(short, long, default_value_t = 48)]
    interval: u64,

    /// JSON priority map file
    #[arg(short, long, value_name = "FILE")]
    priority_file: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable debug logs
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.debug);

    let client = build_client(&cli)?;
    let interval = Duration::from_secs(cli.interval * 3600);

    let prior_urls = if !interval.is_zero() {
        load_prior_sitemap(&cli.output)
    } else {
        UrlIndex::new()
    };

    let mut options = CrawlOptions::new()
        .with_max_concurrency(cli.concurrency)
        .with_crawl_timeout(Duration::from_secs(cli.crawl_timeout))
        .with_request_timeout(Duration::from_secs(cli.timeout))
        .with_keep_alive(Duration::from_secs(cli.keep_alive))
        .with_http_client(client)
        .with_read_link(Box::new(|resolved, candidate| {
            // Surface links that point into error pages
            if resolved.path().contains("/404") {
                tracing::debug!(page = %candidate.page, link = candidate.href, "link to error page");
            }
        }));

    if !interval.is_zero() {
        options = options
            .with_prior_urls(prior_urls)
            .with_crawl_validator(recrawl_validator(interval));
    }

    if let Some(path) = &cli.priority_file {
        options = options.with_priority(load_priority_fn(path)?);
    }

    if let Some(header) = &cli.xml_header {
        options = options.with_xml_prologue(header.clone());
    }
    let prologue = options.xml_prologue.clone();

    let sitemap = crawl_domain(&cli.url, options).await?;

    tracing::info!(urls = sitemap.len(), output = %cli.output.display(), "writing sitemap");
    let file = File::create(&cli.output)?;
    let mut writer = BufWriter::new(file);
    sitemap.write_to(&mut writer, prologue.as_deref())?;
    writer.flush()?;

    Ok(())
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, debug: bool) {
    let filter = if debug {
        EnvFilter::new("sitemapper=trace,debug")
    } else {
        match verbose {
            0 => EnvFilter::new("sitemapper=warn,error"),
            1 => EnvFilter::new("sitemapper=info,warn"),
            _ => EnvFilter::new("sitemapper=debug,info"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Builds the shared HTTP client from the CLI flags
fn build_client(cli: &Cli) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("sitemapper/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(cli.concurrency)
        .pool_idle_timeout(Duration::from_secs(cli.keep_alive))
        .danger_accept_invalid_certs(cli.insecure)
        .gzip(true)
        .build()
}

/// Reads the previous output file as the prior-sitemap index
///
/// A missing or malformed file is logged and yields an empty index; the
/// crawl proceeds without skip hints.
fn load_prior_sitemap(path: &Path) -> UrlIndex {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            tracing::info!(path = %path.display(), %error, "no prior sitemap");
            return UrlIndex::new();
        }
    };

    match Sitemap::read_from(BufReader::new(file)) {
        Ok(sitemap) => {
            tracing::info!(path = %path.display(), urls = sitemap.len(), "prior sitemap loaded");
            sitemap.into_index()
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "prior sitemap unreadable, ignoring");
            UrlIndex::new()
        }
    }
}

/// Builds the validator that skips recently modified pages
///
/// Priority-1.0 records are always re-crawled; anything whose prior
/// lastmod is younger than `now - interval` is skipped.
fn recrawl_validator(interval: Duration) -> CrawlValidator {
    let now = Utc::now();
    let interval = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::hours(48));

    Box::new(move |_url, prior| {
        let Some(record) = prior else {
            return true;
        };
        if record.priority >= 1.0 {
            return true;
        }
        match record.lastmod {
            Some(lastmod) => now.signed_duration_since(lastmod.with_timezone(&Utc)) >= interval,
            None => true,
        }
    })
}

/// Loads a priority function from a JSON priority map
///
/// The map is keyed on whether the URL carries a query string and on its
/// path depth:
///
/// ```json
/// {
///     "default": { "default": 0.4 },
///     "noquery": { "0": 1.0, "1": 0.9, "2": 0.8 },
///     "hasquery": { "0": 0.7, "1": 0.7, "2": 0.4 }
/// }
/// ```
fn load_priority_fn(path: &Path) -> Result<PriorityFn, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let map: HashMap<String, HashMap<String, f32>> = serde_json::from_str(&content)?;
    Ok(priority_from_map(map))
}

fn priority_from_map(map: HashMap<String, HashMap<String, f32>>) -> PriorityFn {
    Box::new(move |url| {
        let bucket = if url.query().is_some() {
            "hasquery"
        } else {
            "noquery"
        };

        let path = url.path().trim_matches('/');
        let depth = if path.is_empty() {
            0
        } else {
            path.split('/').count()
        };

        if let Some(priority) = map.get(bucket).and_then(|m| m.get(&depth.to_string())) {
            return *priority;
        }

        map.get("default")
            .and_then(|m| m.get("default"))
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    })
}
