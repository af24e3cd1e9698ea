//! Source registry: the validated, ordered list of newsroom sources.
//!
//! Descriptors are built once at process start from configuration (or the
//! built-in list) and shared read-only by every pipeline stage.

use std::collections::HashSet;

use serde::Serialize;
use url::Url;

use crate::config::{Config, SourceConfig};

/// Language assumed when a source does not declare one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A validated newsroom source.
///
/// `base_url` is the trust anchor: only entry links on its host (or a
/// subdomain) are accepted from this source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub maker: Option<String>,
    pub category: Option<String>,
    pub base_url: String,
    pub feed_url: Option<String>,
    pub discovery: bool,
    pub discovery_url: Option<String>,
    pub language: String,
    pub tags: Vec<String>,
}

impl SourceDescriptor {
    /// Page fetched when the locator falls back to discovery.
    pub fn discovery_target(&self) -> &str {
        self.discovery_url.as_deref().unwrap_or(&self.base_url)
    }
}

/// Builds the registry for a configuration.
///
/// Configured `[[sources]]` win; when none are configured the built-in
/// newsroom list is used.
pub fn from_config(config: &Config) -> Vec<SourceDescriptor> {
    if config.sources.is_empty() {
        build(&builtin())
    } else {
        build(&config.sources)
    }
}

/// Validates raw source entries, preserving their order.
///
/// Entries missing `id`, `name` or an absolute http(s) `base_url` are dropped
/// with a warning, as are later entries reusing an earlier id.
pub fn build(entries: &[SourceConfig]) -> Vec<SourceDescriptor> {
    let mut seen_ids = HashSet::new();
    let mut out = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let Some(descriptor) = validate(entry) else {
            tracing::warn!(
                index,
                id = entry.id.as_deref().unwrap_or(""),
                "Dropping source without id, name or valid base_url"
            );
            continue;
        };

        if !seen_ids.insert(descriptor.id.clone()) {
            tracing::warn!(id = %descriptor.id, "Dropping source with duplicate id");
            continue;
        }
        out.push(descriptor);
    }

    out
}

fn validate(entry: &SourceConfig) -> Option<SourceDescriptor> {
    let id = non_empty(entry.id.as_deref())?;
    let name = non_empty(entry.name.as_deref())?;
    let base_url = non_empty(entry.base_url.as_deref())?;

    let parsed = Url::parse(&base_url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }

    let mut seen_tags = HashSet::new();
    let tags = entry
        .tags
        .iter()
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty() && seen_tags.insert(t.clone()))
        .collect();

    Some(SourceDescriptor {
        id,
        name,
        maker: non_empty(entry.maker.as_deref()),
        category: non_empty(entry.category.as_deref()),
        base_url,
        feed_url: non_empty(entry.feed_url.as_deref()),
        discovery: entry.discovery.unwrap_or(true),
        discovery_url: non_empty(entry.discovery_url.as_deref()),
        language: non_empty(entry.language.as_deref())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned()),
        tags,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Manufacturer newsrooms used when the config declares no sources.
///
/// None of them pins a feed URL; endpoints are found by discovery.
pub fn builtin() -> Vec<SourceConfig> {
    const NEWSROOMS: &[(&str, &str, &str, &str, &str)] = &[
        ("toyota-global", "Toyota Global Newsroom", "Toyota", "https://global.toyota/en/newsroom/", "en"),
        ("toyota-jp", "トヨタ自動車 ニュースルーム", "Toyota", "https://global.toyota/jp/newsroom/", "ja"),
        ("honda-global", "Honda Global Newsroom", "Honda", "https://global.honda/en/newsroom/", "en"),
        ("nissan-global", "Nissan Global Newsroom", "Nissan", "https://global.nissannews.com/en", "en"),
        ("mazda-global", "Mazda Newsroom", "Mazda", "https://newsroom.mazda.com/en/", "en"),
        ("subaru-us", "Subaru of America Media", "Subaru", "https://media.subaru.com", "en"),
        ("stellantis-na", "Stellantis North America Media", "Stellantis", "https://media.stellantisnorthamerica.com", "en"),
        ("ford", "Ford Media Center", "Ford", "https://media.ford.com", "en"),
        ("gm", "General Motors Newsroom", "General Motors", "https://news.gm.com", "en"),
        ("hyundai-us", "Hyundai Motor America News", "Hyundai", "https://www.hyundainews.com", "en"),
        ("kia-us", "Kia America Media", "Kia", "https://www.kiamedia.com", "en"),
        ("bmw-group", "BMW Group PressClub", "BMW", "https://www.press.bmwgroup.com/global", "en"),
        ("volkswagen", "Volkswagen Newsroom", "Volkswagen", "https://www.volkswagen-newsroom.com/en", "en"),
        ("porsche", "Porsche Newsroom", "Porsche", "https://newsroom.porsche.com/en.html", "en"),
        ("volvo-cars", "Volvo Cars Global Newsroom", "Volvo", "https://www.media.volvocars.com/global/en-gb", "en"),
    ];

    NEWSROOMS
        .iter()
        .map(|&(id, name, maker, base_url, language)| SourceConfig {
            id: Some(id.to_owned()),
            name: Some(name.to_owned()),
            maker: Some(maker.to_owned()),
            category: Some("manufacturer".to_owned()),
            base_url: Some(base_url.to_owned()),
            language: Some(language.to_owned()),
            tags: vec!["newsroom".to_owned()],
            ..SourceConfig::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(id: &str, name: &str, base_url: &str) -> SourceConfig {
        SourceConfig {
            id: Some(id.to_owned()),
            name: Some(name.to_owned()),
            base_url: Some(base_url.to_owned()),
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_drops_entries_missing_required_fields() {
        let mut missing_name = entry("b", "", "https://b.example.com");
        missing_name.name = None;
        let entries = vec![
            entry("a", "A", "https://a.example.com"),
            missing_name,
            entry("", "C", "https://c.example.com"),
            entry("d", "D", "   "),
            entry("e", "E", "https://e.example.com"),
        ];

        let ids: Vec<_> = build(&entries).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "e".to_string()]);
    }

    #[test]
    fn test_drops_non_http_base_urls() {
        let entries = vec![
            entry("ftp", "FTP", "ftp://files.example.com"),
            entry("rel", "Relative", "/newsroom"),
        ];
        assert!(build(&entries).is_empty());
    }

    #[test]
    fn test_discovery_defaults_to_enabled() {
        let built = build(&[entry("a", "A", "https://a.example.com")]);
        assert!(built[0].discovery);
        assert_eq!(built[0].language, DEFAULT_LANGUAGE);
        assert_eq!(built[0].discovery_target(), "https://a.example.com");
    }

    #[test]
    fn test_discovery_url_override_is_used() {
        let mut e = entry("a", "A", "https://a.example.com");
        e.discovery_url = Some("https://a.example.com/press".to_owned());
        e.discovery = Some(false);
        let built = build(&[e]);
        assert!(!built[0].discovery);
        assert_eq!(built[0].discovery_target(), "https://a.example.com/press");
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let entries = vec![
            entry("a", "First", "https://a.example.com"),
            entry("a", "Second", "https://a2.example.com"),
        ];
        let built = build(&entries);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name, "First");
    }

    #[test]
    fn test_tags_are_trimmed_and_deduplicated() {
        let mut e = entry("a", "A", "https://a.example.com");
        e.tags = vec![" ev ".into(), "ev".into(), "".into(), "suv".into()];
        let built = build(&[e]);
        assert_eq!(built[0].tags, vec!["ev".to_string(), "suv".to_string()]);
    }

    #[test]
    fn test_builtin_registry_is_fully_valid() {
        let raw = builtin();
        let built = build(&raw);
        assert_eq!(built.len(), raw.len());
        assert!(built.iter().all(|s| s.maker.is_some() && s.feed_url.is_none()));
    }

    #[test]
    fn test_configured_sources_replace_builtin() {
        let config = Config {
            sources: vec![entry("only", "Only", "https://only.example.com")],
            ..Config::default()
        };
        let built = from_config(&config);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].id, "only");

        assert_eq!(from_config(&Config::default()).len(), builtin().len());
    }
}
