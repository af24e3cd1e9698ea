//! Feed locator: finds a usable feed endpoint for a source.
//!
//! Strategies run in a fixed order and the first one that produces at least
//! one host-allowed entry wins:
//!
//! 1. the configured feed URL, if any
//! 2. discovery (unless disabled): fetch the discovery page, parse it directly
//!    when it is not markup, otherwise try candidates gathered from
//!    `<link rel="alternate">` hints, feed-looking anchors and conventional
//!    paths on the origin
//!
//! Every failure degrades to "no feed for this source".

use std::collections::HashSet;

use serde::Serialize;

use crate::feed::allowlist::filter_allowed;
use crate::feed::parser::{first_container, parse_feed};
use crate::feed::{Fetcher, RawFeedEntry};
use crate::registry::SourceDescriptor;
use crate::util::{canonicalize_link, origin_of, resolve_url};

/// Paths appended to the site origin when the page offers no usable hints.
const CONVENTIONAL_PATHS: &[&str] = &[
    "/feed",
    "/rss",
    "/rss.xml",
    "/feed.xml",
    "/atom.xml",
    "/index.xml",
    "/news/rss",
    "/newsroom/rss",
    "/news/feed",
    "/releases.rss",
];

/// Link types that announce a syndication feed.
const FEED_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/rdf+xml",
    "application/xml",
    "text/xml",
];

/// How a source's feed endpoint was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedVia {
    /// The source's configured feed URL
    ConfiguredFeed,
    /// The discovery URL itself served a feed
    DiscoveryPage,
    /// A `<link rel="alternate">` hint on the discovery page
    AlternateLink,
    /// An `<a href>` on the discovery page that looks like a feed
    Anchor,
    /// A conventional feed path on the site origin
    ConventionalPath,
}

/// A candidate feed URL and the hint that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub via: ResolvedVia,
}

/// A resolved feed endpoint with its host-allowed entries.
#[derive(Debug, Clone)]
pub struct LocatedFeed {
    pub endpoint: String,
    pub via: ResolvedVia,
    pub entries: Vec<RawFeedEntry>,
    /// Entries the allowlist rejected from the accepted document
    pub off_domain: usize,
    /// Feed URLs requested before one was accepted, including the winner
    pub attempts: usize,
}

/// Ordered strategy list for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    ConfiguredFeed,
    Discovery,
}

fn plan(source: &SourceDescriptor) -> Vec<Strategy> {
    let mut steps = Vec::with_capacity(2);
    if source.feed_url.is_some() {
        steps.push(Strategy::ConfiguredFeed);
    }
    if source.discovery {
        steps.push(Strategy::Discovery);
    }
    steps
}

/// Resolves feed endpoints using a shared [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FeedLocator {
    fetcher: Fetcher,
    max_candidates: usize,
}

impl FeedLocator {
    pub fn new(fetcher: Fetcher, max_candidates: usize) -> Self {
        Self {
            fetcher,
            max_candidates,
        }
    }

    /// Runs the strategy chain for `source`; `None` means zero entries.
    pub async fn locate(&self, source: &SourceDescriptor) -> Option<LocatedFeed> {
        let mut attempts = 0;

        for strategy in plan(source) {
            let found = match strategy {
                Strategy::ConfiguredFeed => self.try_configured(source, &mut attempts).await,
                Strategy::Discovery => self.try_discovery(source, &mut attempts).await,
            };
            if let Some(mut located) = found {
                located.attempts = attempts;
                return Some(located);
            }
        }

        tracing::debug!(source = %source.id, attempts, "No usable feed found");
        None
    }

    async fn try_configured(
        &self,
        source: &SourceDescriptor,
        attempts: &mut usize,
    ) -> Option<LocatedFeed> {
        let url = source.feed_url.as_deref()?;
        *attempts += 1;
        let body = self.fetcher.fetch(url).await?;
        accept(source, url, &body, ResolvedVia::ConfiguredFeed)
    }

    async fn try_discovery(
        &self,
        source: &SourceDescriptor,
        attempts: &mut usize,
    ) -> Option<LocatedFeed> {
        let page_url = source.discovery_target();
        *attempts += 1;
        let body = self.fetcher.fetch(page_url).await?;

        let markup = is_markup(&body);
        if !markup {
            if let Some(located) = accept(source, page_url, &body, ResolvedVia::DiscoveryPage) {
                return Some(located);
            }
        }

        let hints = if markup { body.as_str() } else { "" };
        let mut skip: Vec<&str> = vec![page_url];
        skip.extend(source.feed_url.as_deref());
        let candidates = discover_candidates(hints, page_url, &skip, self.max_candidates);
        tracing::debug!(
            source = %source.id,
            page = %page_url,
            candidates = candidates.len(),
            "Trying discovered feed candidates"
        );

        // Strictly sequential: stop at the first candidate that yields entries
        for candidate in candidates {
            *attempts += 1;
            let Some(body) = self.fetcher.fetch(&candidate.url).await else {
                continue;
            };
            if let Some(located) = accept(source, &candidate.url, &body, candidate.via) {
                return Some(located);
            }
        }

        None
    }
}

/// Parses `body` as a feed and accepts it when at least one entry survives
/// the host allowlist.
fn accept(
    source: &SourceDescriptor,
    url: &str,
    body: &str,
    via: ResolvedVia,
) -> Option<LocatedFeed> {
    let allowed = filter_allowed(parse_feed(body, url), source);
    if allowed.entries.is_empty() {
        tracing::debug!(
            source = %source.id,
            url = %url,
            off_domain = allowed.off_domain,
            "Feed yielded no usable entries"
        );
        return None;
    }

    Some(LocatedFeed {
        endpoint: url.to_owned(),
        via,
        entries: allowed.entries,
        off_domain: allowed.off_domain,
        attempts: 0,
    })
}

/// Whether a body is an HTML page rather than a feed document.
///
/// Markup means an HTML marker appears before any feed container tag.
pub fn is_markup(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    let html = ["<!doctype html", "<html", "<head", "<body"]
        .iter()
        .filter_map(|marker| lower.find(marker))
        .min();

    match (html, first_container(&lower)) {
        (Some(h), Some((feed, _))) => h < feed,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Collects candidate feed URLs in priority order.
///
/// Alternate-link hints come first, then feed-looking anchors, then the
/// conventional paths on the page's origin. Candidates are resolved against
/// `page_url`, deduplicated in order, filtered against `skip`, and capped at
/// `max`.
pub fn discover_candidates(
    html: &str,
    page_url: &str,
    skip: &[&str],
    max: usize,
) -> Vec<Candidate> {
    let mut seen: HashSet<String> = skip.iter().map(|u| canonicalize_link(u)).collect();
    let mut out = Vec::new();

    let hinted = find_alternate_links(html)
        .into_iter()
        .map(|href| (href, ResolvedVia::AlternateLink))
        .chain(
            find_feed_anchors(html)
                .into_iter()
                .map(|href| (href, ResolvedVia::Anchor)),
        );
    let conventional = origin_of(page_url)
        .into_iter()
        .flat_map(|origin| {
            CONVENTIONAL_PATHS
                .iter()
                .map(move |path| (format!("{origin}{path}"), ResolvedVia::ConventionalPath))
        });

    for (href, via) in hinted.chain(conventional) {
        if out.len() >= max {
            break;
        }
        let Some(url) = resolve_url(&href, page_url) else {
            continue;
        };
        if seen.insert(canonicalize_link(&url)) {
            out.push(Candidate { url, via });
        }
    }

    out
}

/// `<link rel="alternate">` elements whose type or href implies a feed.
fn find_alternate_links(html: &str) -> Vec<String> {
    scan_tags(html, "link")
        .filter(|tag| {
            attr_value(tag, "rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("alternate"))
            })
        })
        .filter_map(|tag| {
            let href = attr_value(tag, "href")?;
            let typed = attr_value(tag, "type").is_some_and(|t| {
                let t = t.to_ascii_lowercase();
                FEED_TYPES.iter().any(|ft| t.contains(ft))
            });
            (typed || href_implies_feed(&href)).then_some(href)
        })
        .collect()
}

/// `<a href>` elements whose target looks like an RSS/Atom feed.
fn find_feed_anchors(html: &str) -> Vec<String> {
    scan_tags(html, "a")
        .filter_map(|tag| attr_value(tag, "href"))
        .filter(|href| href_implies_feed(href))
        .collect()
}

fn href_implies_feed(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("javascript:") || lower.contains("feedback")
    {
        return false;
    }
    lower.contains("rss") || lower.contains("atom") || lower.contains("feed")
}

/// Iterates over the raw text of every `<name ...>` tag in `html`.
///
/// Uses simple string scanning (no HTML parser dependency). The returned
/// slices come from the original document so attribute values keep their
/// case.
fn scan_tags<'a>(html: &'a str, name: &str) -> impl Iterator<Item = &'a str> + 'a {
    let lower = html.to_ascii_lowercase();
    let needle = format!("<{name}");
    let mut search_from = 0;

    std::iter::from_fn(move || loop {
        let start = search_from + lower.get(search_from..)?.find(&needle)?;
        let after = start + needle.len();
        let tag_end = after + lower[after..].find('>')?;
        search_from = tag_end + 1;

        // `<a` must not match `<article`, `<abbr` and so on
        let boundary = lower.as_bytes().get(after).copied();
        if matches!(boundary, Some(b) if b.is_ascii_whitespace() || b == b'/' || b == b'>') {
            return Some(&html[start..=tag_end]);
        }
    })
}

/// Extracts the value of an attribute from a tag string (case-preserving).
///
/// Handles double quotes, single quotes and unquoted values. Entities in the
/// value are decoded.
fn attr_value(tag: &str, attr_name: &str) -> Option<String> {
    let tag_lower = tag.to_ascii_lowercase();
    let bytes = tag_lower.as_bytes();
    let mut from = 0;

    while let Some(pos) = tag_lower[from..].find(attr_name) {
        let start = from + pos;
        from = start + attr_name.len();

        // Whole attribute name only: preceded by whitespace, followed by '='
        let preceded = start > 0 && bytes[start - 1].is_ascii_whitespace();
        let rest = tag[from..].trim_start();
        if !preceded || !rest.starts_with('=') {
            continue;
        }

        let value = rest[1..].trim_start();
        let raw = match value.as_bytes().first().copied()? {
            q @ (b'"' | b'\'') => {
                let inner = &value[1..];
                &inner[..inner.find(q as char)?]
            }
            _ => value
                .split(|c: char| c.is_ascii_whitespace() || c == '>')
                .next()
                .unwrap_or_default()
                .trim_end_matches('/'),
        };
        return Some(html_escape::decode_html_entities(raw.trim()).into_owned());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SourceConfig};
    use crate::registry;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "https://media.example.com/newsroom/";

    fn rss_with_links(links: &[&str]) -> String {
        let items: String = links
            .iter()
            .enumerate()
            .map(|(i, l)| format!("<item><title>Story {i}</title><link>{l}</link></item>"))
            .collect();
        format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{items}</channel></rss>"#)
    }

    fn test_locator() -> FeedLocator {
        let config = Config {
            allow_private_hosts: true,
            request_timeout_secs: 2,
            ..Config::default()
        };
        FeedLocator::new(Fetcher::new(&config).unwrap(), config.max_candidates)
    }

    fn source(base_url: &str, feed_url: Option<String>, discovery: bool) -> SourceDescriptor {
        registry::build(&[SourceConfig {
            id: Some("maker".into()),
            name: Some("Maker".into()),
            base_url: Some(base_url.into()),
            feed_url,
            discovery: Some(discovery),
            ..SourceConfig::default()
        }])
        .remove(0)
    }

    // --- HTML scanning tests (no network) ---

    #[test]
    fn test_markup_detection() {
        assert!(is_markup("<!DOCTYPE html><html><head></head></html>"));
        assert!(is_markup("<HTML><BODY>hi</BODY></HTML>"));
        assert!(!is_markup(&rss_with_links(&["https://a.example.com/x"])));
        assert!(!is_markup("plain text"));
        // Escaped HTML inside a feed does not make it markup
        assert!(!is_markup(
            "<rss><channel><item><description><![CDATA[<html>x</html>]]></description></item></channel></rss>"
        ));
    }

    #[test]
    fn test_alternate_links_found_in_order() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/style.css">
            <link href="/feed.xml" type="application/rss+xml" rel="alternate">
            <link rel='alternate' type='application/atom+xml' href='https://media.example.com/atom'>
            <link rel="alternate" hreflang="ja" href="/ja/">
            <link rel="alternate" href="/news/rss">
        </head></html>"#;
        assert_eq!(
            find_alternate_links(html),
            vec![
                "/feed.xml".to_string(),
                "https://media.example.com/atom".to_string(),
                "/news/rss".to_string()
            ]
        );
    }

    #[test]
    fn test_feed_anchors_skip_unrelated_links() {
        let html = r#"<body>
            <article class="card"><a href="/news/1">Story</a></article>
            <a class="icon" href="/press/rss.xml">RSS</a>
            <a href="/feedback">Feedback</a>
            <a href=/atom>Atom</a>
            <abbr title="rss">RSS</abbr>
        </body>"#;
        assert_eq!(
            find_feed_anchors(html),
            vec!["/press/rss.xml".to_string(), "/atom".to_string()]
        );
    }

    #[test]
    fn test_attr_value_matches_whole_names_only() {
        let tag = r#"<link data-href="/wrong" href="/right&amp;x=1" rel=alternate/>"#;
        assert_eq!(attr_value(tag, "href").as_deref(), Some("/right&x=1"));
        assert_eq!(attr_value(tag, "rel").as_deref(), Some("alternate"));
        assert_eq!(attr_value(tag, "type"), None);
    }

    #[test]
    fn test_candidates_priority_dedup_and_cap() {
        let html = r#"<head><link rel="alternate" type="application/rss+xml" href="/rss"></head>
            <body><a href="https://media.example.com/rss">RSS</a><a href="/atom.xml">Atom</a></body>"#;
        let candidates = discover_candidates(html, PAGE, &[PAGE], 4);

        assert_eq!(
            candidates,
            vec![
                Candidate {
                    url: "https://media.example.com/rss".into(),
                    via: ResolvedVia::AlternateLink
                },
                Candidate {
                    url: "https://media.example.com/atom.xml".into(),
                    via: ResolvedVia::Anchor
                },
                Candidate {
                    url: "https://media.example.com/feed".into(),
                    via: ResolvedVia::ConventionalPath
                },
                Candidate {
                    url: "https://media.example.com/rss.xml".into(),
                    via: ResolvedVia::ConventionalPath
                },
            ]
        );
    }

    #[test]
    fn test_candidates_without_hints_are_conventional_paths() {
        let candidates = discover_candidates("<html></html>", PAGE, &[], 100);
        assert_eq!(candidates.len(), CONVENTIONAL_PATHS.len());
        assert!(candidates
            .iter()
            .all(|c| c.via == ResolvedVia::ConventionalPath
                && c.url.starts_with("https://media.example.com/")));
    }

    #[test]
    fn test_candidates_skip_already_tried_urls() {
        let candidates = discover_candidates(
            "",
            PAGE,
            &["https://media.example.com/feed#x"],
            100,
        );
        assert!(candidates.iter().all(|c| c.url != "https://media.example.com/feed"));
    }

    // --- Strategy chain tests with wiremock ---

    #[tokio::test]
    async fn test_configured_feed_wins() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/press.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_with_links(&[&format!("{base}/news/1")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let src = source(&base, Some(format!("{base}/press.xml")), true);
        let located = test_locator().locate(&src).await.unwrap();
        assert_eq!(located.via, ResolvedVia::ConfiguredFeed);
        assert_eq!(located.entries.len(), 1);
        assert_eq!(located.attempts, 1);
    }

    #[tokio::test]
    async fn test_discovery_follows_alternate_link() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<!doctype html><html><head>
                <link rel="alternate" type="application/rss+xml" href="/media/feed.xml">
                </head><body></body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss_with_links(&[
                &format!("{base}/news/1"),
                "https://evil.example.net/spoof",
            ])))
            .mount(&server)
            .await;

        let src = source(&base, None, true);
        let located = test_locator().locate(&src).await.unwrap();
        assert_eq!(located.via, ResolvedVia::AlternateLink);
        assert_eq!(located.endpoint, format!("{base}/media/feed.xml"));
        assert_eq!(located.entries.len(), 1);
        assert_eq!(located.off_domain, 1);
    }

    #[tokio::test]
    async fn test_broken_configured_feed_falls_back_to_conventional_path() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Press</body></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_with_links(&[&format!("{base}/news/9")])),
            )
            .mount(&server)
            .await;

        let src = source(&base, Some(format!("{base}/gone.xml")), true);
        let located = test_locator().locate(&src).await.unwrap();
        assert_eq!(located.via, ResolvedVia::ConventionalPath);
        assert_eq!(located.endpoint, format!("{base}/rss"));
        // configured, page, /feed, /rss
        assert_eq!(located.attempts, 4);
    }

    #[tokio::test]
    async fn test_discovery_page_serving_feed_is_parsed_directly() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_with_links(&[&format!("{base}/news/1")])),
            )
            .mount(&server)
            .await;

        let located = test_locator()
            .locate(&source(&base, None, true))
            .await
            .unwrap();
        assert_eq!(located.via, ResolvedVia::DiscoveryPage);
    }

    #[tokio::test]
    async fn test_feed_with_only_off_domain_links_is_rejected() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(rss_with_links(&["https://evil.example.net/a"])),
            )
            .mount(&server)
            .await;

        let src = source(&base, Some(format!("{base}/feed.xml")), false);
        assert!(test_locator().locate(&src).await.is_none());
    }

    #[tokio::test]
    async fn test_no_hints_and_no_conventional_paths_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Nothing</body></html>"))
            .mount(&server)
            .await;
        // Every other path is an unmatched request → 404

        let src = source(&server.uri(), None, true);
        assert!(test_locator().locate(&src).await.is_none());
    }

    #[tokio::test]
    async fn test_discovery_disabled_without_feed_url_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let src = source(&server.uri(), None, false);
        assert!(test_locator().locate(&src).await.is_none());
    }
}
