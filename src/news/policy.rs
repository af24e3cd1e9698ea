//! Publish/archive decisions.

use std::sync::LazyLock;

use regex::Regex;

use super::{ContentKind, RecordStatus};

/// Terms that make a business or uncategorized item worth publishing:
/// pricing, ordering, delivery, production, warranty, campaigns, software
/// updates, discontinuation, regulation and electrification.
static IMPORTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bprices?\b|\bpricing\b|\bmsrp\b|\bpre-?orders?\b|\borders\b|\bordering\b|\border books?\b|\b(?:for|to) order\b|\bdeliver(?:y|ies|ed)?\b|\bproduction\b|\bwarrant(?:y|ies)\b|\bcampaign\b|software update|over-the-air|\bota\b|\bdiscontinu|end of production|\bregulat|\bemissions?\b|\bcompliance\b|\belectrif|\bev\b|\belectric\b|\bhybrid\b|価格|受注|納車|納期|生産|保証|キャンペーン|アップデート|販売終了|規制|排出ガス|電動化",
    )
    .unwrap()
});

/// Outcome of the policy gate for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub status: RecordStatus,
    /// Display category
    pub category: ContentKind,
}

impl Decision {
    fn publish(category: ContentKind) -> Self {
        Self {
            status: RecordStatus::Published,
            category,
        }
    }

    fn archive(category: ContentKind) -> Self {
        Self {
            status: RecordStatus::Archived,
            category,
        }
    }
}

/// Decides whether a classified item is published and how it is displayed.
pub fn decide(kind: ContentKind, title: &str, summary: &str) -> Decision {
    match kind {
        ContentKind::Award | ContentKind::Motorsport | ContentKind::Event => Decision::archive(kind),
        ContentKind::Tech => Decision::publish(ContentKind::Update),
        ContentKind::Business | ContentKind::Other => {
            if is_important(title, summary) {
                Decision::publish(ContentKind::Update)
            } else {
                Decision::archive(kind)
            }
        }
        ContentKind::Recall | ContentKind::NewModel | ContentKind::Update => {
            Decision::publish(kind)
        }
    }
}

fn is_important(title: &str, summary: &str) -> bool {
    IMPORTANCE.is_match(title) || IMPORTANCE.is_match(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_value_kinds_always_archived() {
        for kind in [ContentKind::Award, ContentKind::Motorsport, ContentKind::Event] {
            let decision = decide(kind, "Pricing and orders open", "");
            assert_eq!(decision.status, RecordStatus::Archived, "{kind:?}");
        }
    }

    #[test]
    fn test_core_kinds_always_published_unchanged() {
        for kind in [ContentKind::Recall, ContentKind::NewModel, ContentKind::Update] {
            assert_eq!(decide(kind, "", ""), Decision::publish(kind));
        }
    }

    #[test]
    fn test_tech_folds_to_update() {
        assert_eq!(
            decide(ContentKind::Tech, "Battery research", ""),
            Decision::publish(ContentKind::Update)
        );
    }

    #[test]
    fn test_business_needs_importance_signal() {
        assert_eq!(
            decide(ContentKind::Business, "Quarterly earnings released", ""),
            Decision::archive(ContentKind::Business)
        );
        assert_eq!(
            decide(
                ContentKind::Business,
                "Plant expansion",
                "Production of the hybrid model starts in May."
            ),
            Decision::publish(ContentKind::Update)
        );
    }

    #[test]
    fn test_in_order_to_is_not_an_ordering_signal() {
        assert_eq!(
            decide(
                ContentKind::Business,
                "Company reorganizes in order to streamline operations",
                ""
            ),
            Decision::archive(ContentKind::Business)
        );
        for title in [
            "Order books open for the new SUV",
            "Pre-orders begin this week",
            "Dealers start taking orders",
            "Now available to order",
        ] {
            assert_eq!(
                decide(ContentKind::Other, title, ""),
                Decision::publish(ContentKind::Update),
                "{title}"
            );
        }
    }

    #[test]
    fn test_other_needs_importance_signal() {
        assert_eq!(
            decide(ContentKind::Other, "Community outreach", ""),
            Decision::archive(ContentKind::Other)
        );
        assert_eq!(
            decide(ContentKind::Other, "Extended warranty for owners", ""),
            Decision::publish(ContentKind::Update)
        );
        assert_eq!(
            decide(ContentKind::Other, "保証期間の延長について", ""),
            Decision::publish(ContentKind::Update)
        );
    }
}
