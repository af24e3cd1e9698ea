//! Newsroom feed ingestion.
//!
//! Turns the syndication feeds of car-manufacturer newsrooms into classified,
//! Japanese-localized [`NewsRecord`](news::NewsRecord)s. One [`Pipeline::run`]
//! is one full, stateless fetch cycle: every source is located, fetched and
//! parsed, entries are filtered to the source's own domain, classified, gated,
//! localized and finally deduplicated and capped.

pub mod config;
pub mod feed;
pub mod news;
pub mod pipeline;
pub mod registry;
pub mod util;

pub use config::{Config, ConfigError, SourceConfig};
pub use news::{ContentKind, NewsRecord, RecordStatus};
pub use pipeline::{CycleOutput, CycleReport, Pipeline, PipelineOptions, SourceReport};
pub use registry::SourceDescriptor;
