use chrono::{DateTime, Utc};
use serde::Serialize;

/// Editorial content kind assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    Recall,
    NewModel,
    Update,
    Business,
    Motorsport,
    Event,
    Award,
    Tech,
    Other,
}

impl ContentKind {
    pub const ALL: [ContentKind; 9] = [
        ContentKind::Recall,
        ContentKind::NewModel,
        ContentKind::Update,
        ContentKind::Business,
        ContentKind::Motorsport,
        ContentKind::Event,
        ContentKind::Award,
        ContentKind::Tech,
        ContentKind::Other,
    ];

    /// Tags attached to every record of this kind.
    pub fn tags(self) -> &'static [&'static str] {
        match self {
            ContentKind::Recall => &["recall", "safety"],
            ContentKind::NewModel => &["new-model"],
            ContentKind::Update => &["update"],
            ContentKind::Business => &["business"],
            ContentKind::Motorsport => &["motorsport"],
            ContentKind::Event => &["event"],
            ContentKind::Award => &["award"],
            ContentKind::Tech => &["technology"],
            ContentKind::Other => &[],
        }
    }

    /// Short Japanese label used in title prefixes.
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Recall => "リコール",
            ContentKind::NewModel => "新型車",
            ContentKind::Update => "改良・仕様変更",
            ContentKind::Business => "ビジネス",
            ContentKind::Motorsport => "モータースポーツ",
            ContentKind::Event => "イベント",
            ContentKind::Award => "受賞",
            ContentKind::Tech => "技術",
            ContentKind::Other => "ニュース",
        }
    }
}

/// Whether a record reaches the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Published,
    Archived,
}

/// A normalized, classified and localized news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRecord {
    /// Content hash of the canonical link
    pub id: String,
    pub slug: String,
    pub status: RecordStatus,
    /// Kind assigned by the classifier
    pub kind: ContentKind,
    /// Display category; some kinds fold to `UPDATE` when published
    pub category: ContentKind,
    /// Localized display title
    pub title: String,
    pub original_title: String,
    /// Long-form localized overview, paragraphs separated by blank lines
    pub overview: String,
    /// Short metadata description
    pub description: String,
    /// Cleaned source summary
    pub summary: String,
    pub editorial_comment: String,
    pub maker: Option<String>,
    /// Japanese label of the market the item targets, when one is named
    pub market: Option<String>,
    pub tags: Vec<String>,
    pub source_id: String,
    pub source_name: String,
    pub source_url: String,
    /// Canonical article link
    pub link: String,
    /// Detected language of the source text
    pub language: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl NewsRecord {
    pub fn is_published(&self) -> bool {
        self.status == RecordStatus::Published
    }
}
