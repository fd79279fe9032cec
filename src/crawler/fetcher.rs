//! HTTP fetching
//!
//! One GET per URL, no retries. The per-request timeout covers the whole
//! operation: connect, TLS, response headers, and the full body read.
//! HTML bodies are streamed chunk by chunk through the link reader; other
//! content types are registered without reading the body at all. Redirects
//! are followed by the client up to its internal cap, and the final URL is
//! the one reported back.

use crate::crawler::reader::{LinkReader, RawLink, ReaderError};
use crate::url::canonicalize;
use crate::UrlError;
use chrono::{DateTime, FixedOffset};
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Sanity cap on the size of a streamed HTML body
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Why a fetch produced nothing for the sitemap
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("body exceeded {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("HTML scan failed: {0}")]
    Scan(#[from] ReaderError),

    #[error("final URL unusable: {0}")]
    FinalUrl(#[from] UrlError),
}

/// Result of a single fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// A 2xx HTML page, scanned for links
    Page {
        /// Canonical URL after redirects
        final_url: Url,
        status: u16,
        /// Body bytes read
        bytes: u64,
        /// Parsed Last-Modified header, if present and well-formed
        last_modified: Option<DateTime<FixedOffset>>,
        /// Raw link candidates in document order
        links: Vec<RawLink>,
    },

    /// A 2xx response with a non-HTML content type, registered unparsed
    Resource {
        final_url: Url,
        status: u16,
        /// Advertised Content-Length (the body is not read)
        bytes: u64,
        last_modified: Option<DateTime<FixedOffset>>,
    },

    /// The URL yields nothing; it is marked done and omitted from output
    Failed { error: FetchError },
}

/// Fetches a URL once, bounded by `request_timeout`
pub async fn fetch_url(client: &Client, url: &Url, request_timeout: Duration) -> FetchOutcome {
    match tokio::time::timeout(request_timeout, fetch_once(client, url)).await {
        Ok(outcome) => outcome,
        Err(_) => FetchOutcome::Failed {
            error: FetchError::Timeout,
        },
    }
}

async fn fetch_once(client: &Client, url: &Url) -> FetchOutcome {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(error) => {
            return FetchOutcome::Failed {
                error: classify_error(error),
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchOutcome::Failed {
            error: FetchError::Status(status.as_u16()),
        };
    }

    let final_url = match canonicalize(response.url()) {
        Ok(final_url) => final_url,
        Err(error) => {
            return FetchOutcome::Failed {
                error: FetchError::FinalUrl(error),
            }
        }
    };

    let last_modified = parse_http_date(response.headers().get(LAST_MODIFIED));
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if !is_html_family(&content_type) {
        return FetchOutcome::Resource {
            final_url,
            status: status.as_u16(),
            bytes: response.content_length().unwrap_or(0),
            last_modified,
        };
    }

    let mut reader = LinkReader::new();
    let mut stream = response.bytes_stream();
    let mut bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                return FetchOutcome::Failed {
                    error: classify_error(error),
                }
            }
        };
        bytes += chunk.len() as u64;
        if bytes > MAX_BODY_BYTES {
            return FetchOutcome::Failed {
                error: FetchError::BodyTooLarge {
                    limit: MAX_BODY_BYTES,
                },
            };
        }
        if let Err(error) = reader.push(&chunk) {
            return FetchOutcome::Failed {
                error: error.into(),
            };
        }
    }

    match reader.finish() {
        Ok(links) => FetchOutcome::Page {
            final_url,
            status: status.as_u16(),
            bytes,
            last_modified,
            links,
        },
        Err(error) => FetchOutcome::Failed {
            error: error.into(),
        },
    }
}

/// HTML-family content types that are worth scanning for links
///
/// An absent or empty Content-Type is scanned as well; misconfigured
/// servers that omit the header usually serve HTML.
fn is_html_family(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.starts_with("text/html")
        || content_type.starts_with("application/xhtml+xml")
}

fn classify_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(error)
    }
}

/// Parses a Last-Modified header value as an HTTP-date
fn parse_http_date(value: Option<&HeaderValue>) -> Option<DateTime<FixedOffset>> {
    let raw = value?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw).ok()
}
