//! Sitemap URL submission tool
//!
//! Reads a sitemap file and pushes its URLs to a search-engine ingestion
//! endpoint in batches of newline-separated plain text.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::Parser;
use reqwest::header::CONTENT_TYPE;
use sitemapper::sitemap::{Sitemap, UrlRecord};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Submit sitemap URLs to an ingestion endpoint
#[derive(Parser, Debug)]
#[command(name = "submit")]
#[command(version)]
#[command(about = "Submit sitemap URLs to an ingestion endpoint", long_about = None)]
struct Cli {
    /// Ingestion API endpoint URL
    #[arg(long, default_value = "http://data.zz.baidu.com/urls")]
    api: String,

    /// Website domain (must start with https://)
    #[arg(long)]
    site: String,

    /// Webmaster platform token
    #[arg(long)]
    token: String,

    /// Path to the sitemap XML file
    #[arg(long, default_value = "sitemap.xml")]
    sitemap: PathBuf,

    /// Number of URLs to submit per batch
    #[arg(long, default_value_t = 50)]
    batch: usize,

    /// Only submit URLs modified in the last N days (0 = all)
    #[arg(long, default_value_t = 1)]
    days: i64,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("submit=info,sitemapper=info,warn"),
        _ => EnvFilter::new("submit=debug,sitemapper=debug,info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.site.starts_with("https://") {
        return Err("site domain must start with https://".into());
    }
    if cli.batch == 0 {
        return Err("batch size must be at least 1".into());
    }

    let file = File::open(&cli.sitemap)?;
    let sitemap = Sitemap::read_from(BufReader::new(file))?;

    let cutoff = (cli.days > 0).then(|| Utc::now() - ChronoDuration::days(cli.days));
    let locs = select_locs(sitemap.iter(), cutoff);

    if locs.is_empty() {
        tracing::info!("no URLs to submit");
        return Ok(());
    }

    tracing::info!(
        urls = locs.len(),
        batch = cli.batch,
        "submitting sitemap URLs"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let endpoint = format!("{}?site={}&token={}", cli.api, cli.site, cli.token);

    for (index, chunk) in locs.chunks(cli.batch).enumerate() {
        let body = chunk.join("\n");
        match client
            .post(&endpoint)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                let reply = response.text().await.unwrap_or_default();
                tracing::info!(batch = index + 1, urls = chunk.len(), reply = %reply, "batch accepted");
            }
            Ok(response) => {
                tracing::warn!(batch = index + 1, status = %response.status(), "batch rejected");
            }
            Err(error) => {
                tracing::warn!(batch = index + 1, %error, "batch submission failed");
            }
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    tracing::info!("submission finished");
    Ok(())
}

/// Selects locations to submit, optionally filtered by modification time
///
/// With a cutoff, records without a lastmod are excluded: there is no
/// evidence they changed recently.
fn select_locs<'a>(
    records: impl Iterator<Item = &'a UrlRecord>,
    cutoff: Option<DateTime<Utc>>,
) -> Vec<String> {
    records
        .filter(|record| match (cutoff, record.lastmod) {
            (Some(cutoff), Some(lastmod)) => lastmod.with_timezone(&Utc) > cutoff,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .map(|record| record.loc.clone())
        .collect()
}
