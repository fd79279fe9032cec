//! Streaming link extraction from HTML bodies
//!
//! The reader is fed response bytes chunk by chunk and collects link
//! candidates as the tokenizer encounters them, so a page is scanned while
//! it is still downloading. `lol_html` drives the scan: it is an HTML5
//! tokenizer, so unclosed tags, missing attribute quotes, and mixed-case
//! names are all handled, and the contents of `<script>`/`<style>` blocks
//! are never mistaken for markup.

use lol_html::send::{HtmlRewriter, Settings};
use lol_html::{element, OutputSink};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// Upper bound on candidates collected from a single page
pub const MAX_LINKS_PER_PAGE: usize = 4096;

/// Where on the page a link candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `<a href>` - the only kind that is offered to the frontier
    Anchor,
    /// `<link href>`
    Link,
    /// `<img src>`
    Image,
    /// `<script src>`
    Script,
    /// `<iframe src>`
    Frame,
    /// `<form action>`
    Form,
}

/// An unresolved href collected by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub kind: LinkKind,
    pub href: String,
}

/// A link candidate as handed to the read-link observer: the raw href
/// paired with the page it was found on
#[derive(Debug, Clone, Copy)]
pub struct LinkCandidate<'a> {
    pub kind: LinkKind,
    pub href: &'a str,
    pub page: &'a Url,
}

/// Errors surfaced while scanning HTML
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("HTML tokenizer error: {0}")]
    Rewrite(#[from] lol_html::errors::RewritingError),

    #[error("Link collector still shared after scan")]
    CollectorBusy,
}

/// Incremental link scanner over a streamed HTML body
pub struct LinkReader {
    rewriter: HtmlRewriter<'static, NoopSink>,
    links: Arc<Mutex<Vec<RawLink>>>,
}

impl LinkReader {
    /// Creates a reader wired for all extraction targets
    pub fn new() -> Self {
        let links: Arc<Mutex<Vec<RawLink>>> = Arc::new(Mutex::new(Vec::new()));

        macro_rules! collect {
            ($selector:literal, $attribute:literal, $kind:expr) => {{
                let links = Arc::clone(&links);
                element!($selector, move |el| {
                    push_link(&links, $kind, el.get_attribute($attribute));
                    Ok(())
                })
            }};
        }

        let handlers = vec![
            collect!("a[href]", "href", LinkKind::Anchor),
            collect!("link[href]", "href", LinkKind::Link),
            collect!("img[src]", "src", LinkKind::Image),
            collect!("script[src]", "src", LinkKind::Script),
            collect!("iframe[src]", "src", LinkKind::Frame),
            collect!("form[action]", "action", LinkKind::Form),
        ];

        let rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::new_send()
            },
            NoopSink,
        );

        Self { rewriter, links }
    }

    /// Feeds the next chunk of the body into the scanner
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ReaderError> {
        self.rewriter.write(chunk)?;
        Ok(())
    }

    /// Flushes the scanner and returns the collected candidates in document
    /// order
    pub fn finish(self) -> Result<Vec<RawLink>, ReaderError> {
        let Self { rewriter, links } = self;
        rewriter.end()?;
        let links = Arc::try_unwrap(links).map_err(|_| ReaderError::CollectorBusy)?;
        Ok(links.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl Default for LinkReader {
    fn default() -> Self {
        Self::new()
    }
}

fn push_link(links: &Mutex<Vec<RawLink>>, kind: LinkKind, href: Option<String>) {
    let Some(href) = href else {
        return;
    };
    let mut links = links.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if links.len() < MAX_LINKS_PER_PAGE {
        links.push(RawLink { kind, href });
    }
}

struct NoopSink;

impl OutputSink for NoopSink {
    fn handle_chunk(&mut self, _chunk: &[u8]) {}
}
