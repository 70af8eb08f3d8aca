//! Tolerant RSS/Atom parser.
//!
//! Parsing happens in two tiers. The strict tier reads the document as is,
//! checking end tags, attributes and entities. Any failure there sends the
//! document through [`repair`] and a lenient tier that ignores attributes and
//! tolerates mismatched end tags. If that fails too the feed yields no items.

use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use thiserror::Error;

use crate::raw_item::{RawItem, local_name};
use crate::repair::repair;
use crate::text::{decode_entities, resolve_reference};

/// A general entity declared in the internal DTD subset.
static ENTITY_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!ENTITY\s+([A-Za-z_][\w.-]*)\s+(?:"([^"]*)"|'([^']*)')\s*>"#)
        .expect("entity declaration regex is valid")
});

#[derive(Debug, Error)]
enum ParseError {
    #[error("feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("unknown entity &{0};")]
    UnknownEntity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Strict,
    Lenient,
}

/// Extract the items of an RSS, RDF or Atom feed. Never fails; unusable input
/// yields an empty list.
pub fn parse(bytes: &[u8]) -> Vec<RawItem> {
    let err = match parse_strict(bytes) {
        Ok(items) => return items,
        Err(err) => err,
    };

    tracing::debug!("Strict feed parse failed, retrying after repair: {}", err);

    let text = String::from_utf8_lossy(bytes);
    let repaired = repair(strip_bom(&text));

    match walk(&repaired, Mode::Lenient) {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!("Feed could not be parsed even after repair: {}", err);
            Vec::new()
        }
    }
}

fn parse_strict(bytes: &[u8]) -> Result<Vec<RawItem>, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    walk(strip_bom(text), Mode::Strict)
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

fn walk(text: &str, mode: Mode) -> Result<Vec<RawItem>, ParseError> {
    let mut reader = Reader::from_str(text);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = false;
        config.check_end_names = mode == Mode::Strict;
        config.allow_unmatched_ends = mode == Mode::Lenient;
    }

    let mut collector = Collector::new(mode);
    let mut last_error_at = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(quick_xml::Error::IllFormed(_)) if mode == Mode::Lenient => {
                let position = reader.buffer_position() as u64;
                if last_error_at == Some(position) {
                    break;
                }
                last_error_at = Some(position);
                continue;
            }
            Err(source) => {
                return Err(ParseError::Xml {
                    position: reader.buffer_position() as u64,
                    source,
                });
            }
        };

        match event {
            Event::Start(e) => {
                let (name, attributes) = element(&e, mode)?;
                collector.start(name, attributes);
            }
            Event::Empty(e) => {
                let (name, attributes) = element(&e, mode)?;
                collector.empty(&name, attributes);
            }
            Event::End(e) => collector.end(&String::from_utf8_lossy(e.name().as_ref())),
            Event::Text(e) => collector.text(&decode_entities(&String::from_utf8_lossy(&e))),
            Event::CData(e) => collector.text(&String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => collector.reference(&String::from_utf8_lossy(&e))?,
            Event::DocType(e) => collector.declare_entities(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(collector.finish())
}

/// Qualified name and, in strict mode, the checked attributes of an element.
fn element(e: &BytesStart<'_>, mode: Mode) -> Result<(String, Vec<(String, String)>), ParseError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    if mode == Mode::Lenient {
        return Ok((name, Vec::new()));
    }

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = decode_entities(&String::from_utf8_lossy(&attr.value));
        attributes.push((key, value));
    }
    Ok((name, attributes))
}

/// Which document shape the root element announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    /// `rss/channel/item`
    Rss,
    /// `rdf:RDF/item`, also nested in `channel`
    Rdf,
    /// `feed/entry`
    Atom,
    /// A bare `channel/item`
    Channel,
    Unknown,
}

impl Container {
    fn from_root(name: &str) -> Self {
        match local_name(name) {
            "rss" => Container::Rss,
            "RDF" => Container::Rdf,
            "feed" => Container::Atom,
            "channel" => Container::Channel,
            _ => Container::Unknown,
        }
    }
}

struct OpenField {
    name: String,
    text: String,
    /// Atom person construct (`author`, `contributor`): only its `name` child counts.
    person: Option<PersonName>,
}

#[derive(Default)]
struct PersonName {
    text: String,
    open: bool,
}

impl OpenField {
    fn new(name: &str) -> Self {
        let person = matches!(local_name(name), "author" | "contributor")
            .then(PersonName::default);
        Self {
            name: name.to_string(),
            text: String::new(),
            person,
        }
    }

    fn push(&mut self, text: &str) {
        self.text.push_str(text);
        if let Some(person) = self.person.as_mut()
            && person.open
        {
            person.text.push_str(text);
        }
    }

    /// The person's name when one was given, otherwise all collected text.
    fn value(&self) -> &str {
        match &self.person {
            Some(person) if !person.text.trim().is_empty() => &person.text,
            _ => &self.text,
        }
    }

    /// Keep text of adjacent nested elements apart.
    fn separate(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with(char::is_whitespace) {
            self.text.push(' ');
        }
    }
}

struct OpenItem {
    /// Stack depth of the item element itself.
    depth: usize,
    item: RawItem,
    field: Option<OpenField>,
}

impl OpenItem {
    fn close_field(&mut self) {
        if let Some(field) = self.field.take() {
            self.item.set(&field.name, field.value());
        }
    }
}

struct Collector {
    mode: Mode,
    container: Option<Container>,
    stack: Vec<String>,
    current: Option<OpenItem>,
    items: Vec<RawItem>,
    /// Entities declared by the document's DOCTYPE.
    entities: HashMap<String, String>,
}

impl Collector {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            container: None,
            stack: Vec::new(),
            current: None,
            items: Vec::new(),
            entities: HashMap::new(),
        }
    }

    fn is_item(&self, name: &str) -> bool {
        let local = local_name(name);
        let parent = self.stack.last().map(|p| local_name(p));
        match self.container {
            Some(Container::Rss) => local == "item" && parent == Some("channel"),
            Some(Container::Rdf) => {
                local == "item" && (self.stack.len() == 1 || parent == Some("channel"))
            }
            Some(Container::Atom) => local == "entry" && self.stack.len() == 1,
            Some(Container::Channel) => local == "item" && self.stack.len() == 1,
            Some(Container::Unknown) | None => false,
        }
    }

    fn start(&mut self, name: String, attributes: Vec<(String, String)>) {
        if self.container.is_none() {
            self.container = Some(Container::from_root(&name));
        }
        self.open(&name, attributes, true);
        self.stack.push(name);
    }

    fn empty(&mut self, name: &str, attributes: Vec<(String, String)>) {
        if self.container.is_none() {
            self.container = Some(Container::from_root(name));
        }
        self.open(name, attributes, false);
    }

    fn open(&mut self, name: &str, attributes: Vec<(String, String)>, has_content: bool) {
        let depth = self.stack.len();

        if self.current.is_none() {
            if has_content && self.is_item(name) {
                self.current = Some(OpenItem {
                    depth,
                    item: RawItem::default(),
                    field: None,
                });
            }
            return;
        }

        let Some(open) = self.current.as_mut() else {
            return;
        };

        if depth == open.depth + 1 {
            for (key, value) in &attributes {
                open.item.set_attribute(name, key, value);
            }
            if has_content {
                open.field = Some(OpenField::new(name));
            }
        } else if let Some(field) = open.field.as_mut() {
            field.separate();
            if let Some(person) = field.person.as_mut()
                && has_content
                && depth == open.depth + 2
                && local_name(name) == "name"
            {
                person.open = true;
            }
        }
    }

    fn end(&mut self, name: &str) {
        match self.stack.iter().rposition(|open| open == name) {
            Some(pos) => self.stack.truncate(pos),
            None => {
                // An end tag nothing matches most likely misspells the field it closes.
                let closes_field = self
                    .current
                    .as_ref()
                    .is_some_and(|open| open.field.is_some() && self.stack.len() == open.depth + 2);
                if !closes_field {
                    return;
                }
                self.stack.pop();
            }
        }

        let len = self.stack.len();
        let Some(open) = self.current.as_mut() else {
            return;
        };

        if len <= open.depth + 1 {
            open.close_field();
        } else if let Some(field) = open.field.as_mut() {
            field.separate();
            if len == open.depth + 2
                && let Some(person) = field.person.as_mut()
            {
                person.open = false;
            }
        }

        if len <= open.depth
            && let Some(mut done) = self.current.take()
        {
            done.close_field();
            self.items.push(done.item);
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(field) = self.current.as_mut().and_then(|open| open.field.as_mut()) {
            field.push(text);
        }
    }

    fn declare_entities(&mut self, doctype: &str) {
        for decl in ENTITY_DECL.captures_iter(doctype) {
            let value = decl.get(2).or_else(|| decl.get(3)).map_or("", |m| m.as_str());
            self.entities
                .entry(decl[1].to_string())
                .or_insert_with(|| decode_entities(value));
        }
    }

    fn reference(&mut self, name: &str) -> Result<(), ParseError> {
        let declared = self.entities.get(name).cloned();
        let resolved = match declared.or_else(|| resolve_reference(name)) {
            Some(text) => text,
            None if self.mode == Mode::Strict => {
                return Err(ParseError::UnknownEntity(name.to_string()));
            }
            None => format!("&{name};"),
        };
        self.text(&resolved);
        Ok(())
    }

    /// Items in document order; an item left open at end of input is kept.
    fn finish(mut self) -> Vec<RawItem> {
        if let Some(mut open) = self.current.take() {
            open.close_field();
            self.items.push(open.item);
        }
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:job_listing="https://jobicy.com" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Jobicy</title>
    <item>
      <title>Senior Designer</title>
      <guid isPermaLink="false">123</guid>
      <link>https://jobicy.com/jobs/123-senior-designer</link>
      <job_listing:company>Acme</job_listing:company>
      <job_listing:location>Remote &amp; EU</job_listing:location>
      <job_listing:job_type>Full Time</job_listing:job_type>
      <description><![CDATA[<p>Design <b>things</b></p>]]></description>
      <pubDate>Mon, 06 Jan 2025 10:00:00 +0000</pubDate>
    </item>
    <item>
      <title>Data Analyst &ndash; Contract</title>
      <guid>456</guid>
      <dc:creator>Numbers Inc</dc:creator>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse(RSS.as_bytes());
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title.as_deref(), Some("Senior Designer"));
        assert_eq!(first.guid.as_deref(), Some("123"));
        assert_eq!(first.vendor_company.as_deref(), Some("Acme"));
        assert_eq!(first.vendor_location.as_deref(), Some("Remote & EU"));
        assert_eq!(first.vendor_job_type.as_deref(), Some("Full Time"));
        assert_eq!(
            first.description.as_deref(),
            Some("<p>Design <b>things</b></p>")
        );
        assert_eq!(
            first.pub_date.as_deref(),
            Some("Mon, 06 Jan 2025 10:00:00 +0000")
        );

        let second = &items[1];
        assert_eq!(second.title.as_deref(), Some("Data Analyst \u{2013} Contract"));
        assert_eq!(second.creator.as_deref(), Some("Numbers Inc"));
    }

    #[test]
    fn test_parse_atom_entries() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Jobs</title>
  <entry>
    <id>urn:job:42</id>
    <title>Backend Engineer</title>
    <link rel="alternate" href="https://jobs.test/42"/>
    <category term="engineering"/>
    <author><name>Widgets</name><email>hr@widgets.test</email></author>
    <updated>2025-01-06T10:00:00Z</updated>
  </entry>
</feed>"#;

        let items = parse(atom.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_deref(), Some("urn:job:42"));
        assert_eq!(items[0].link_href.as_deref(), Some("https://jobs.test/42"));
        assert_eq!(items[0].category.as_deref(), Some("engineering"));
        assert_eq!(items[0].author.as_deref(), Some("Widgets"));
        assert_eq!(items[0].updated.as_deref(), Some("2025-01-06T10:00:00Z"));
    }

    #[test]
    fn test_parse_prefixed_atom_entries() {
        let atom = r#"<atom:feed xmlns:atom="http://www.w3.org/2005/Atom">
  <atom:entry>
    <atom:id>1</atom:id>
    <atom:title>Backend Engineer</atom:title>
    <atom:author><atom:name>Widgets</atom:name></atom:author>
    <atom:summary>Build APIs</atom:summary>
  </atom:entry>
</atom:feed>"#;

        let items = parse(atom.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_deref(), Some("1"));
        assert_eq!(items[0].title.as_deref(), Some("Backend Engineer"));
        assert_eq!(items[0].author.as_deref(), Some("Widgets"));
        assert_eq!(items[0].summary.as_deref(), Some("Build APIs"));
    }

    #[test]
    fn test_plain_text_author_is_kept() {
        let feed = "<rss><channel><item><title>Editor</title><author>jobs@press.test (Press Co)</author></item></channel></rss>";

        let items = parse(feed.as_bytes());
        assert_eq!(items[0].author.as_deref(), Some("jobs@press.test (Press Co)"));
    }

    #[test]
    fn test_internal_dtd_entities_are_resolved() {
        let feed = r#"<!DOCTYPE rss [<!ENTITY co "Acme">]>
<rss><channel><item><title>Job at &co;</title></item></channel></rss>"#;

        let items = parse(feed.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Job at Acme"));
    }

    #[test]
    fn test_parse_rdf_items() {
        let rdf = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/">
  <channel><title>Board</title></channel>
  <item><title>Librarian</title><link>https://board.test/7</link></item>
</rdf:RDF>"#;

        let items = parse(rdf.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Librarian"));
    }

    #[test]
    fn test_attribute_without_value_is_repaired() {
        let malformed = r#"<rss><channel>
<item><title>Senior Designer</title><guid isPermaLink>123</guid><job:company>Acme</job:company></item>
</channel></rss>"#;
        let well_formed = r#"<rss><channel>
<item><title>Senior Designer</title><guid>123</guid><job:company>Acme</job:company></item>
</channel></rss>"#;

        let repaired = parse(malformed.as_bytes());
        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired, parse(well_formed.as_bytes()));
    }

    #[test]
    fn test_bare_ampersand_and_unknown_entity_are_tolerated() {
        let feed = "<rss><channel><item><title>R&D Lead</title><company>Tom &bogus; Co</company></item></channel></rss>";

        let items = parse(feed.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("R&D Lead"));
        assert_eq!(items[0].company.as_deref(), Some("Tom &bogus; Co"));
    }

    #[test]
    fn test_mismatched_end_tag_is_tolerated() {
        let feed = "<rss><channel><item><title>QA Engineer</titel><guid>9</guid></item></channel></rss>";

        let items = parse(feed.as_bytes());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("QA Engineer"));
        assert_eq!(items[0].guid.as_deref(), Some("9"));
    }

    #[test]
    fn test_unclosed_document_keeps_open_item() {
        let feed = "<rss><channel><item><title>Closed</title></item><item><title>Cut off";

        let items = parse(feed.as_bytes());
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].title.as_deref(), Some("Cut off"));
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let mut feed = b"<rss><channel><item><title>Caf".to_vec();
        feed.push(0xE9);
        feed.extend_from_slice(b" Manager</title></item></channel></rss>");

        let items = parse(&feed);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Caf\u{fffd} Manager"));
    }

    #[test]
    fn test_unrecognized_input_yields_no_items() {
        assert!(parse(b"").is_empty());
        assert!(parse(b"not a feed at all").is_empty());
        assert!(parse(b"<html><body><item>x</item></body></html>").is_empty());
        assert!(parse(b"<rss><channel></channel></rss>").is_empty());
    }
}
