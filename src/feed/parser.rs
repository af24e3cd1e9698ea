//! Tolerant extraction of entries from RSS and Atom documents.
//!
//! This is not a schema validator. The dialect is sniffed from
//! the first container tag in the document, and entries are pulled out of the
//! event stream field by field. Missing optional fields, CDATA wrapping,
//! escaped HTML and mismatched end tags are all tolerated; a hard XML error
//! stops the scan but keeps every entry completed before it.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::util::{clean_text, resolve_url, truncate_chars};

/// Summaries longer than this are cut; classification only needs the lead.
const MAX_SUMMARY_CHARS: usize = 2000;

/// One entry extracted from a feed, ready for filtering and classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeedEntry {
    /// Plain-text title (tags stripped, entities decoded)
    pub title: String,
    /// Absolute http(s) URL of the article
    pub link: String,
    /// Publication instant, when the feed carried a parseable one
    pub published: Option<DateTime<Utc>>,
    /// Plain-text summary, possibly empty
    pub summary: String,
}

/// The two syndication dialects the parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// RSS 0.9x/2.0 and RDF-based RSS 1.0 (`<rss>`, `<rdf:RDF>`, `<channel>`)
    Rss,
    /// Atom 1.0 (`<feed>`)
    Atom,
}

impl Dialect {
    fn entry_tag(self) -> &'static [u8] {
        match self {
            Dialect::Rss => b"item",
            Dialect::Atom => b"entry",
        }
    }
}

/// Sniffs the dialect from whichever container tag appears first.
///
/// Returns `None` for documents with neither container (HTML pages, JSON,
/// empty bodies).
pub fn sniff_dialect(body: &str) -> Option<Dialect> {
    first_container(&body.to_ascii_lowercase()).map(|(_, dialect)| dialect)
}

/// Byte offset and dialect of the first feed container tag in an
/// already-lowercased document.
pub(crate) fn first_container(lower: &str) -> Option<(usize, Dialect)> {
    let rss = ["rss", "rdf:rdf", "channel"]
        .iter()
        .filter_map(|tag| find_open_tag(lower, tag))
        .min()
        .map(|pos| (pos, Dialect::Rss));
    let atom = find_open_tag(lower, "feed").map(|pos| (pos, Dialect::Atom));

    match (rss, atom) {
        (Some(r), Some(a)) => Some(if a.0 < r.0 { a } else { r }),
        (found, None) | (None, found) => found,
    }
}

/// Position of the first `<name` that is a whole tag name (`<feed>` but not
/// `<feedburner:info>`).
pub(crate) fn find_open_tag(lower: &str, name: &str) -> Option<usize> {
    let needle = format!("<{name}");
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let start = from + pos;
        let after = start + needle.len();
        match lower.as_bytes().get(after) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(start),
            None => return None,
            _ => from = after,
        }
    }
    None
}

/// Extracts entries from a feed document.
///
/// `feed_url` is the URL the document was fetched from; relative entry links
/// are resolved against it. Entries without a non-empty title or a resolvable
/// http(s) link are dropped silently. Unknown dialects yield no entries.
pub fn parse_feed(body: &str, feed_url: &str) -> Vec<RawFeedEntry> {
    let Some(dialect) = sniff_dialect(body) else {
        return Vec::new();
    };

    let mut reader = Reader::from_str(body);
    let config = reader.config_mut();
    // Whitespace between text and CDATA segments separates words
    config.trim_text(false);
    config.check_end_names = false;

    let entry_tag = dialect.entry_tag();
    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    // Nesting depth inside the current entry; the entry element itself is 0
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if current.is_none() {
                    if name == entry_tag {
                        current = Some(EntryBuilder::default());
                        depth = 0;
                    }
                    continue;
                }
                let Some(builder) = current.as_mut() else {
                    continue;
                };

                depth += 1;
                if depth == 1 {
                    builder.open_field(dialect, &name, &e);
                } else {
                    builder.push_text(" ");
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(builder) = current.as_mut() {
                    let name = e.local_name().as_ref().to_ascii_lowercase();
                    if depth == 0 && name == b"link" {
                        builder.take_link_attrs(&e);
                    } else {
                        builder.push_text(" ");
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(builder) = current.as_mut() {
                    builder.push_text(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(builder) = current.as_mut() {
                    builder.push_text(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if current.is_none() {
                    continue;
                }
                if depth == 0 {
                    if let Some(entry) = current.take().and_then(|b| b.finish(feed_url)) {
                        entries.push(entry);
                    }
                    continue;
                }
                if let Some(builder) = current.as_mut() {
                    if depth == 1 {
                        builder.close_field();
                    } else {
                        builder.push_text(" ");
                    }
                }
                depth -= 1;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    feed = %feed_url,
                    position = reader.buffer_position(),
                    error = %e,
                    kept = entries.len(),
                    "Stopping feed scan at malformed XML"
                );
                break;
            }
        }
    }

    entries
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid { permalink: bool },
    Summary,
    Content,
    Published,
    Updated,
}

#[derive(Debug, Default)]
struct EntryBuilder {
    field: Option<Field>,
    buffer: String,
    title: Option<String>,
    link: Option<String>,
    guid_link: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    published: Option<String>,
    updated: Option<String>,
}

impl EntryBuilder {
    fn open_field(&mut self, dialect: Dialect, name: &[u8], e: &BytesStart<'_>) {
        self.buffer.clear();
        self.field = match (dialect, name) {
            (_, b"title") => Some(Field::Title),
            (Dialect::Atom, b"link") => {
                self.take_link_attrs(e);
                None
            }
            (Dialect::Rss, b"link") => Some(Field::Link),
            (Dialect::Rss, b"guid") => Some(Field::Guid {
                permalink: attr_value(e, b"ispermalink")
                    .map_or(true, |v| !v.eq_ignore_ascii_case("false")),
            }),
            (Dialect::Atom, b"id") => Some(Field::Guid { permalink: true }),
            (_, b"description" | b"summary" | b"subtitle") => Some(Field::Summary),
            (_, b"encoded" | b"content") => Some(Field::Content),
            (_, b"pubdate" | b"published" | b"issued" | b"date") => Some(Field::Published),
            (_, b"updated" | b"modified" | b"lastbuilddate") => Some(Field::Updated),
            _ => None,
        };
    }

    fn push_text(&mut self, text: &str) {
        if self.field.is_some() {
            self.buffer.push_str(text);
        }
    }

    fn close_field(&mut self) {
        let Some(field) = self.field.take() else {
            return;
        };
        let value = std::mem::take(&mut self.buffer);
        if value.trim().is_empty() {
            return;
        }

        let slot = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Guid { permalink: true } => &mut self.guid_link,
            Field::Guid { permalink: false } => return,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Published => &mut self.published,
            Field::Updated => &mut self.updated,
        };
        // First occurrence wins (RSS items sometimes repeat <link>)
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// `<link href="..." rel="...">` as used by Atom (and `atom:link` inside RSS items).
    fn take_link_attrs(&mut self, e: &BytesStart<'_>) {
        let rel = attr_value(e, b"rel").unwrap_or_default();
        if !(rel.is_empty() || rel.eq_ignore_ascii_case("alternate")) {
            return;
        }
        if let Some(href) = attr_value(e, b"href") {
            if self.link.is_none() && !href.trim().is_empty() {
                self.link = Some(href);
            }
        }
    }

    fn finish(self, feed_url: &str) -> Option<RawFeedEntry> {
        let title = clean_text(self.title.as_deref()?);
        if title.is_empty() {
            return None;
        }

        let link = [self.link.as_deref(), self.guid_link.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|candidate| {
                let decoded = html_escape::decode_html_entities(candidate.trim());
                resolve_url(&decoded, feed_url)
            })?;

        let summary = [self.summary.as_deref(), self.content.as_deref()]
            .into_iter()
            .flatten()
            .map(clean_text)
            .find(|s| !s.is_empty())
            .map(|s| truncate_chars(&s, MAX_SUMMARY_CHARS).into_owned())
            .unwrap_or_default();

        let published = [self.published.as_deref(), self.updated.as_deref()]
            .into_iter()
            .flatten()
            .find_map(parse_timestamp);

        Some(RawFeedEntry {
            title,
            link,
            published,
            summary,
        })
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.local_name().as_ref().eq_ignore_ascii_case(key))
        .map(|a| html_escape::decode_html_entities(&String::from_utf8_lossy(&a.value)).into_owned())
}

/// Zone abbreviations seen in manufacturer feeds that RFC 2822 parsing rejects.
const ZONE_OFFSETS: &[(&str, i32)] = &[
    ("JST", 9 * 3600),
    ("KST", 9 * 3600),
    ("CET", 3600),
    ("CEST", 2 * 3600),
    ("BST", 3600),
    ("IST", 5 * 3600 + 1800),
    ("AEST", 10 * 3600),
    ("AEDT", 11 * 3600),
    ("UTC", 0),
    ("Z", 0),
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

/// Lenient timestamp parsing.
///
/// Any value that yields a valid instant is accepted: RFC 3339, RFC 2822,
/// common ISO-ish variants, a handful of zone abbreviations, and bare dates
/// (taken as midnight UTC). Anything else is `None`; the caller decides what
/// a missing timestamp means.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    // "Mon, 06 Jan 2025 09:00:00 JST" and friends
    if let Some((rest, zone)) = s.rsplit_once(' ') {
        if let Some(&(_, secs)) = ZONE_OFFSETS.iter().find(|(name, _)| name.eq_ignore_ascii_case(zone)) {
            let offset = FixedOffset::east_opt(secs)?;
            return parse_naive(rest.trim())
                .and_then(|naive| offset.from_local_datetime(&naive).single())
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    parse_naive(s).map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
