//! Record construction and final list assembly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::classify::classify;
use super::identity::record_id;
use super::localize::{localize, LocalizeInput, TitleStrategy};
use super::policy::decide;
use super::NewsRecord;
use crate::feed::RawFeedEntry;
use crate::registry::SourceDescriptor;
use crate::util::canonicalize_link;

/// Turns a host-allowed feed entry into a record.
///
/// Classification, the policy gate and localization all have terminal
/// fallbacks, so every entry produces a record. The returned strategy tells
/// the caller how the display title was derived.
pub fn build_record(
    entry: RawFeedEntry,
    source: &SourceDescriptor,
    fetched_at: DateTime<Utc>,
) -> (NewsRecord, TitleStrategy) {
    let kind = classify(&entry.title, &entry.summary);
    let decision = decide(kind, &entry.title, &entry.summary);
    let localized = localize(&LocalizeInput {
        title: &entry.title,
        summary: &entry.summary,
        maker: source.maker.as_deref(),
        source_name: &source.name,
        kind,
        language_hint: &source.language,
    });

    let link = canonicalize_link(&entry.link);
    let id = record_id(&link);

    let mut tags: Vec<String> = Vec::new();
    let candidates = source
        .tags
        .iter()
        .map(String::as_str)
        .chain(source.maker.as_deref())
        .chain(kind.tags().iter().copied());
    for tag in candidates {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_owned());
        }
    }

    let record = NewsRecord {
        slug: id.clone(),
        id,
        status: decision.status,
        kind,
        category: decision.category,
        title: localized.title,
        original_title: entry.title,
        overview: localized.overview,
        description: localized.description,
        summary: entry.summary,
        editorial_comment: localized.editorial_comment,
        maker: source.maker.clone(),
        market: localized.market.map(str::to_owned),
        tags,
        source_id: source.id.clone(),
        source_name: source.name.clone(),
        source_url: source.base_url.clone(),
        link,
        language: localized.language,
        published_at: entry.published,
        fetched_at,
    };
    (record, localized.strategy)
}

/// Keeps the first `limit` published records of one source, in feed order.
///
/// Archived records are dropped here so they never count toward the cap.
pub fn cap_source(records: Vec<NewsRecord>, limit: usize) -> Vec<NewsRecord> {
    records
        .into_iter()
        .filter(NewsRecord::is_published)
        .take(limit)
        .collect()
}

/// A record dropped because an earlier record had the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub id: String,
    pub source_id: String,
    /// Source whose record was kept
    pub kept_from: String,
}

#[derive(Debug, Default)]
pub struct Assembly {
    pub records: Vec<NewsRecord>,
    pub duplicates: Vec<Duplicate>,
}

/// Merges per-source batches (already capped, in registry order) into the
/// final list: archived records dropped, duplicates by id removed with the
/// first occurrence kept, then the global cap applied.
///
/// Registry order and each source's own feed order are preserved.
pub fn assemble(batches: Vec<Vec<NewsRecord>>, total_limit: usize) -> Assembly {
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut assembly = Assembly::default();

    for record in batches.into_iter().flatten() {
        if !record.is_published() {
            continue;
        }
        if let Some(kept_from) = seen.get(&record.id) {
            assembly.duplicates.push(Duplicate {
                id: record.id,
                source_id: record.source_id,
                kept_from: kept_from.clone(),
            });
            continue;
        }
        seen.insert(record.id.clone(), record.source_id.clone());
        assembly.records.push(record);
    }

    assembly.records.truncate(total_limit);
    assembly
}
