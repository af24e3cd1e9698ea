use crate::feed::RawFeedEntry;
use crate::registry::SourceDescriptor;
use crate::util::is_host_allowed;

/// Entries that survived the host allowlist, plus how many were rejected.
#[derive(Debug, Default)]
pub struct Allowed {
    pub entries: Vec<RawFeedEntry>,
    pub off_domain: usize,
}

/// Keeps only entries whose link is on the source's own domain.
///
/// A compromised or misconfigured feed could otherwise attach the source's
/// maker attribution to arbitrary third-party links. Rejections drop only the
/// offending entry; feed order is preserved for the rest.
pub fn filter_allowed(entries: Vec<RawFeedEntry>, source: &SourceDescriptor) -> Allowed {
    let mut allowed = Allowed::default();

    for entry in entries {
        if is_host_allowed(&entry.link, &source.base_url) {
            allowed.entries.push(entry);
        } else {
            tracing::debug!(
                source = %source.id,
                link = %entry.link,
                "Dropping off-domain entry"
            );
            allowed.off_domain += 1;
        }
    }

    allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::registry;

    fn source(base_url: &str) -> SourceDescriptor {
        registry::build(&[SourceConfig {
            id: Some("maker".into()),
            name: Some("Maker".into()),
            base_url: Some(base_url.into()),
            ..SourceConfig::default()
        }])
        .remove(0)
    }

    fn entry(link: &str) -> RawFeedEntry {
        RawFeedEntry {
            title: "Title".into(),
            link: link.into(),
            published: None,
            summary: String::new(),
        }
    }

    #[test]
    fn test_off_domain_links_are_dropped_individually() {
        let entries = vec![
            entry("https://maker.example.com/news/1"),
            entry("https://evil.example.net/news/2"),
            entry("https://media.maker.example.com/news/3"),
        ];

        let allowed = filter_allowed(entries, &source("https://maker.example.com"));
        let links: Vec<_> = allowed.entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://maker.example.com/news/1",
                "https://media.maker.example.com/news/3"
            ]
        );
        assert_eq!(allowed.off_domain, 1);
    }

    #[test]
    fn test_www_prefix_is_ignored_on_both_sides() {
        let allowed = filter_allowed(
            vec![entry("https://maker.example.com/a")],
            &source("https://www.maker.example.com/newsroom/"),
        );
        assert_eq!(allowed.entries.len(), 1);
    }
}
