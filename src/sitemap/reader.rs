//! Prior-sitemap XML parsing
//!
//! Reads a sitemap-protocol-0.9 document back into a [`Sitemap`]. Unknown
//! elements are ignored; malformed XML is surfaced as an error so the caller
//! can decide whether to proceed without a prior index.

use super::{ChangeFreq, Sitemap, UrlRecord, DEFAULT_PRIORITY};
use crate::SitemapError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::BufRead;

/// The `<url>` child element currently being accumulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

impl Sitemap {
    /// Reads a sitemap document from `input`
    ///
    /// Elements outside the documented schema are skipped. Field values that
    /// fail to parse (an unknown changefreq token, an out-of-range priority)
    /// degrade to their defaults rather than failing the whole document;
    /// only structural XML errors are returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Buffered reader over the XML document
    ///
    /// # Returns
    ///
    /// * `Ok(Sitemap)` - The parsed records in document order
    /// * `Err(SitemapError)` - The document is not well-formed XML
    pub fn read_from<R: BufRead>(input: R) -> Result<Sitemap, SitemapError> {
        let mut xml = Reader::from_reader(input);
        xml.config_mut().trim_text(true);

        let mut sitemap = Sitemap::new();
        let mut buf = Vec::new();

        let mut in_url = false;
        let mut field: Option<Field> = None;
        let mut loc = String::new();
        let mut lastmod = String::new();
        let mut changefreq = String::new();
        let mut priority = String::new();

        loop {
            match xml.read_event_into(&mut buf)? {
                Event::Start(start) => match start.local_name().as_ref() {
                    b"url" => {
                        in_url = true;
                        field = None;
                        loc.clear();
                        lastmod.clear();
                        changefreq.clear();
                        priority.clear();
                    }
                    b"loc" if in_url => field = Some(Field::Loc),
                    b"lastmod" if in_url => field = Some(Field::LastMod),
                    b"changefreq" if in_url => field = Some(Field::ChangeFreq),
                    b"priority" if in_url => field = Some(Field::Priority),
                    _ => field = None,
                },
                Event::Text(text) if in_url => {
                    let value = text.unescape()?;
                    match field {
                        Some(Field::Loc) => loc.push_str(&value),
                        Some(Field::LastMod) => lastmod.push_str(&value),
                        Some(Field::ChangeFreq) => changefreq.push_str(&value),
                        Some(Field::Priority) => priority.push_str(&value),
                        None => {}
                    }
                }
                Event::End(end) => match end.local_name().as_ref() {
                    b"url" => {
                        if !loc.is_empty() {
                            sitemap.add(UrlRecord {
                                loc: loc.clone(),
                                lastmod: parse_lastmod(&lastmod),
                                changefreq: ChangeFreq::parse(&changefreq),
                                priority: parse_priority(&priority),
                            });
                        }
                        in_url = false;
                        field = None;
                    }
                    _ => field = None,
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(sitemap)
    }
}

/// Parses a `<lastmod>` value as W3C datetime, falling back to a bare date
fn parse_lastmod(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Parses a `<priority>` value, clamped into [0.0, 1.0]
fn parse_priority(value: &str) -> f32 {
    value
        .trim()
        .parse::<f32>()
        .map(|p| p.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_PRIORITY)
}
