//! One fetch cycle over every registered source.
//!
//! Sources are pulled from the registry in order by a fixed-size pool of
//! concurrent tasks. Each task owns its source end to end (locate, parse,
//! filter, build records) and hands back a result tagged with the source's
//! index, so completions can interleave freely and are put back in registry
//! order before capping and assembly. Nothing is shared between tasks except
//! the read-only source list and the HTTP client.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::Config;
use crate::feed::{FeedLocator, FetchError, Fetcher, ResolvedVia};
use crate::news::{assemble, build_record, cap_source, NewsRecord, TitleStrategy};
use crate::registry::{self, SourceDescriptor};

/// Tunables applied when assembling a cycle's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub per_source_limit: usize,
    pub total_limit: usize,
    pub workers: usize,
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            per_source_limit: config.per_source_limit,
            total_limit: config.total_limit,
            workers: config.workers.max(1),
        }
    }
}

/// Everything one cycle produced.
#[derive(Debug)]
pub struct CycleOutput {
    pub records: Vec<NewsRecord>,
    pub report: CycleReport,
}

/// Per-source outcome of a cycle, in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub id: String,
    /// Feed URL that was accepted, if any
    pub endpoint: Option<String>,
    pub resolved_via: Option<ResolvedVia>,
    /// Feed URLs requested while locating the endpoint
    pub attempts: usize,
    /// Entries parsed from the accepted feed
    pub raw_entries: usize,
    pub off_domain: usize,
    pub archived: usize,
    /// Published records kept after the per-source cap
    pub published: usize,
    /// Records dropped because another source already had the same id
    pub duplicates: usize,
}

/// Summary of a cycle, suitable for logging or `--report` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub sources: Vec<SourceReport>,
    pub sources_with_feed: usize,
    pub records: usize,
    pub duplicates: usize,
}

/// Diagnostics that are logged at most once per source per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Diagnostic {
    NoFeed,
    OffDomain,
    WrappedTitle,
    Duplicate,
}

/// State scoped to a single invocation of [`Pipeline::run`].
///
/// Owned by the orchestrating task only, so it needs no synchronization.
#[derive(Debug, Default)]
struct CycleContext {
    reported: HashSet<(String, Diagnostic)>,
}

impl CycleContext {
    /// Returns `true` the first time a diagnostic is seen for a source.
    fn first(&mut self, source_id: &str, diagnostic: Diagnostic) -> bool {
        self.reported.insert((source_id.to_owned(), diagnostic))
    }
}

/// What one worker task produced for its source.
#[derive(Debug, Default)]
struct SourceOutcome {
    endpoint: Option<String>,
    via: Option<ResolvedVia>,
    attempts: usize,
    raw_entries: usize,
    off_domain: usize,
    records: Vec<NewsRecord>,
    wrapped_titles: usize,
}

/// The ingestion pipeline: registry, locator and output tunables.
///
/// Stateless across runs; every call to [`Pipeline::run`] recomputes the
/// full output.
#[derive(Debug, Clone)]
pub struct Pipeline {
    sources: Arc<[SourceDescriptor]>,
    locator: FeedLocator,
    options: PipelineOptions,
}

impl Pipeline {
    /// Builds a pipeline over the configured (or built-in) sources.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Self::with_sources(registry::from_config(config), config)
    }

    /// Builds a pipeline over an explicit, already validated source list.
    pub fn with_sources(
        sources: Vec<SourceDescriptor>,
        config: &Config,
    ) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(config)?;
        Ok(Self {
            sources: sources.into(),
            locator: FeedLocator::new(fetcher, config.max_candidates),
            options: PipelineOptions::from(config),
        })
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Runs one full cycle. Never fails: sources that cannot be read simply
    /// contribute no records.
    pub async fn run(&self) -> CycleOutput {
        self.run_at(Utc::now()).await
    }

    /// Runs one cycle, stamping records with `fetched_at`.
    pub async fn run_at(&self, fetched_at: DateTime<Utc>) -> CycleOutput {
        let started = Instant::now();
        let total = self.sources.len();
        tracing::info!(
            sources = total,
            workers = self.options.workers,
            "Starting fetch cycle"
        );

        let mut slots: Vec<Option<SourceOutcome>> = (0..total).map(|_| None).collect();
        let mut completions = stream::iter(self.sources.iter().enumerate())
            .map(|(index, source)| async move {
                (index, self.process_source(source, fetched_at).await)
            })
            .buffer_unordered(self.options.workers.max(1));

        while let Some((index, outcome)) = completions.next().await {
            slots[index] = Some(outcome);
        }

        let mut ctx = CycleContext::default();
        let mut reports = Vec::with_capacity(total);
        let mut batches = Vec::with_capacity(total);

        for (source, slot) in self.sources.iter().zip(slots) {
            let outcome = slot.unwrap_or_default();
            log_diagnostics(&mut ctx, source, &outcome);

            let archived = outcome.records.iter().filter(|r| !r.is_published()).count();
            let kept = cap_source(outcome.records, self.options.per_source_limit);

            reports.push(SourceReport {
                id: source.id.clone(),
                endpoint: outcome.endpoint,
                resolved_via: outcome.via,
                attempts: outcome.attempts,
                raw_entries: outcome.raw_entries,
                off_domain: outcome.off_domain,
                archived,
                published: kept.len(),
                duplicates: 0,
            });
            batches.push(kept);
        }

        let assembly = assemble(batches, self.options.total_limit);
        for duplicate in &assembly.duplicates {
            if let Some(report) = reports.iter_mut().find(|r| r.id == duplicate.source_id) {
                report.duplicates += 1;
            }
            if ctx.first(&duplicate.source_id, Diagnostic::Duplicate) {
                tracing::debug!(
                    source = %duplicate.source_id,
                    kept_from = %duplicate.kept_from,
                    id = %duplicate.id,
                    "Dropping duplicate record"
                );
            }
        }

        let report = CycleReport {
            started_at: fetched_at,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            sources_with_feed: reports.iter().filter(|r| r.endpoint.is_some()).count(),
            records: assembly.records.len(),
            duplicates: assembly.duplicates.len(),
            sources: reports,
        };
        tracing::info!(
            sources = total,
            with_feed = report.sources_with_feed,
            records = report.records,
            duplicates = report.duplicates,
            elapsed_ms = report.elapsed_ms,
            "Fetch cycle complete"
        );

        CycleOutput {
            records: assembly.records,
            report,
        }
    }

    /// Locates, parses and builds records for a single source.
    async fn process_source(
        &self,
        source: &SourceDescriptor,
        fetched_at: DateTime<Utc>,
    ) -> SourceOutcome {
        let Some(located) = self.locator.locate(source).await else {
            return SourceOutcome::default();
        };

        let mut outcome = SourceOutcome {
            raw_entries: located.entries.len() + located.off_domain,
            off_domain: located.off_domain,
            attempts: located.attempts,
            via: Some(located.via),
            endpoint: Some(located.endpoint),
            ..SourceOutcome::default()
        };

        for entry in located.entries {
            let (record, strategy) = build_record(entry, source, fetched_at);
            if strategy == TitleStrategy::Wrapped {
                outcome.wrapped_titles += 1;
            }
            outcome.records.push(record);
        }

        tracing::debug!(
            source = %source.id,
            endpoint = outcome.endpoint.as_deref().unwrap_or(""),
            records = outcome.records.len(),
            "Source processed"
        );
        outcome
    }
}

fn log_diagnostics(ctx: &mut CycleContext, source: &SourceDescriptor, outcome: &SourceOutcome) {
    if outcome.endpoint.is_none() && ctx.first(&source.id, Diagnostic::NoFeed) {
        tracing::warn!(
            source = %source.id,
            page = %source.discovery_target(),
            "No usable feed found for source"
        );
    }
    if outcome.off_domain > 0 && ctx.first(&source.id, Diagnostic::OffDomain) {
        tracing::warn!(
            source = %source.id,
            dropped = outcome.off_domain,
            "Feed contains off-domain links"
        );
    }
    if outcome.wrapped_titles > 0 && ctx.first(&source.id, Diagnostic::WrappedTitle) {
        tracing::debug!(
            source = %source.id,
            count = outcome.wrapped_titles,
            "Display titles fell back to the original wording"
        );
    }
}
