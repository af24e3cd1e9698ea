//! Feed acquisition: fetching, endpoint discovery, parsing and host filtering.
//!
//! - [`fetcher`] - HTTP client wrapper that collapses every failure to `None`
//! - [`discovery`] - per-source strategy chain that finds a usable feed endpoint
//! - [`parser`] - tolerant RSS/Atom entry extraction
//! - [`allowlist`] - drops entries linking outside the source's own domain

mod allowlist;
mod discovery;
mod fetcher;
mod parser;

pub use allowlist::{filter_allowed, Allowed};
pub use discovery::{
    discover_candidates, is_markup, Candidate, FeedLocator, LocatedFeed, ResolvedVia,
};
pub use fetcher::{FetchError, Fetcher};
pub use parser::{parse_feed, parse_timestamp, sniff_dialect, Dialect, RawFeedEntry};
