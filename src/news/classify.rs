//! Heuristic content-kind classification.
//!
//! Rules are evaluated in priority order and the first match wins. A recall
//! signal is checked before everything else so that a generic "new model"
//! keyword in the same text can never shadow it.

use std::sync::LazyLock;

use regex::Regex;

use super::ContentKind;

static RULES: LazyLock<Vec<(ContentKind, Regex)>> = LazyLock::new(|| {
    [
        (
            ContentKind::Recall,
            r"(?i)\brecall(?:s|ed|ing)?\b|\bsafety (?:campaign|notice|recall)|\bdefect|\bnhtsa\b|リコール|改善対策|不具合",
        ),
        (
            ContentKind::Motorsport,
            r"(?i)\bmotorsports?\b|\bracing\b|\brace\b|\bformula (?:1|one|e)\b|\bf1\b|\bnascar\b|\bindycar\b|\bwec\b|le mans|\brally\b|\bdakar\b|grand prix|\bsuper gt\b|\bgt3\b|\bpodium\b|モータースポーツ|レース|ラリー|スーパーGT|ル・マン|グランプリ",
        ),
        (
            ContentKind::Award,
            r"(?i)\bawards?\b|\bawarded\b|of the year\b|top safety pick|\baccolade|\bhonou?red\b|\brecogni[sz]ed\b|受賞|アワード|カー・オブ・ザ・イヤー|表彰",
        ),
        (
            ContentKind::Event,
            r"(?i)auto show|motor show|mobility show|\bexpo\b|\bexhibit|\bfestival\b|\bconcours\b|\bces\b|\bgoodwood\b|\bsema\b|モーターショー|モビリティショー|展示|出展|イベント",
        ),
        (
            ContentKind::Business,
            r"(?i)\bsales\b|\bearnings\b|\brevenue\b|\bprofit|\bquarter(?:ly)?\b|\bfiscal\b|financial results|\binvest(?:s|ment|ing)?\b|\bpartnership\b|joint venture|\bacquisition\b|\bappoint(?:s|ed|ment)?\b|\bexecutive\b|\bceo\b|\bplant\b|\bfactory\b|\bjobs\b|\bdealers?(?:hip)?s?\b|販売台数|決算|業績|投資|提携|人事|工場",
        ),
        (
            ContentKind::NewModel,
            r"(?i)\ball-new\b|\bnew model\b|\bdebuts?\b|\bpremieres?\b|\bunveil(?:s|ed)?\b|\breveal(?:s|ed)?\b|\blaunch(?:es|ed)?\b|\bintroduc(?:es|ed|ing)\b|\bfirst look\b|新型|デビュー|世界初公開|初公開|発売",
        ),
        (
            ContentKind::Update,
            r"(?i)\bupdate[sd]?\b|\brefresh(?:ed)?\b|\bfacelift\b|\bmodel year\b|now available|available (?:for|to) order|\border books?\b|\bpricing\b|\bprices?\b|\bspecs?\b|\bspecifications?\b|\btrims?\b|\bpackage\b|\bspecial edition\b|一部改良|改良|仕様変更|設定|受注|価格",
        ),
        (
            ContentKind::Tech,
            r"(?i)\btechnolog(?:y|ies)\b|\bsoftware\b|\bbatter(?:y|ies)\b|\belectric\b|\bev\b|\bhybrid\b|\bhydrogen\b|fuel cell|\bautonomous\b|self-driving|driver assist|\badas\b|\bcharging\b|\bplatform\b|\bresearch\b|\binnovation\b|技術|ソフトウェア|電池|バッテリー|電動|水素|自動運転|充電|研究開発",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// Classifies an item from its title and summary. Never fails; text that
/// matches no rule is [`ContentKind::Other`].
pub fn classify(title: &str, summary: &str) -> ContentKind {
    let text = format!("{title}\n{summary}");
    RULES
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map_or(ContentKind::Other, |(kind, _)| *kind)
}
