//! Sitemap XML serialization
//!
//! Emits a sitemap-protocol-0.9 document with records ordered by priority
//! descending (ties keep insertion order). A caller-supplied prologue, e.g.
//! an `xml-stylesheet` processing instruction, replaces the default XML
//! declaration and is written verbatim before the root element.

use super::Sitemap;
use crate::SitemapError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

/// Namespace of the sitemap 0.9 protocol
pub const SITEMAP_XMLNS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// W3C datetime format used for `<lastmod>` values
const W3C_DATETIME: &str = "%Y-%m-%dT%H:%M:%S%:z";

impl Sitemap {
    /// Writes the sitemap as XML to `output`
    ///
    /// # Arguments
    ///
    /// * `output` - Destination writer
    /// * `prologue` - Optional verbatim replacement for the default
    ///   `<?xml?>` declaration, written before the root element
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Document written
    /// * `Err(SitemapError)` - Writing failed
    pub fn write_to<W: Write>(
        &self,
        mut output: W,
        prologue: Option<&str>,
    ) -> Result<(), SitemapError> {
        if let Some(prologue) = prologue {
            output.write_all(prologue.as_bytes())?;
        }

        let mut xml = Writer::new_with_indent(output, b' ', 2);
        if prologue.is_none() {
            xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }

        let mut urlset = BytesStart::new("urlset");
        urlset.push_attribute(("xmlns", SITEMAP_XMLNS));
        xml.write_event(Event::Start(urlset))?;

        for record in self.sorted_records() {
            xml.write_event(Event::Start(BytesStart::new("url")))?;
            write_text_element(&mut xml, "loc", &record.loc)?;
            if let Some(lastmod) = &record.lastmod {
                let formatted = lastmod.format(W3C_DATETIME).to_string();
                write_text_element(&mut xml, "lastmod", &formatted)?;
            }
            if let Some(changefreq) = record.changefreq {
                write_text_element(&mut xml, "changefreq", changefreq.as_str())?;
            }
            write_text_element(&mut xml, "priority", &format!("{:.1}", record.priority))?;
            xml.write_event(Event::End(BytesEnd::new("url")))?;
        }

        xml.write_event(Event::End(BytesEnd::new("urlset")))?;
        Ok(())
    }

    /// Renders the sitemap to a string, mainly for logging and tests
    pub fn to_xml_string(&self, prologue: Option<&str>) -> Result<String, SitemapError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf, prologue)?;
        String::from_utf8(buf).map_err(|e| SitemapError::Malformed(e.to_string()))
    }
}

fn write_text_element<W: Write>(
    xml: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), SitemapError> {
    xml.write_event(Event::Start(BytesStart::new(name)))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
