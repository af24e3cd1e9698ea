//! Japanese display text synthesized from feed titles and summaries.
//!
//! Nothing here translates. The display title comes from the first strategy
//! that applies:
//!
//! 1. the title is already Japanese and is kept as written
//! 2. a known announcement phrasing ("X is now available for order on Y in Z")
//!    is taken apart and reassembled
//! 3. a model-year and model name are lifted from the title
//! 4. a generic title built from the maker name and content kind
//! 5. the original title wrapped in a kind and market prefix
//!
//! The overview and description are fixed templates filled with whatever was
//! extracted. They point readers at the official announcement instead of
//! restating details the source text does not contain. Output depends only
//! on the input.

use std::sync::LazyLock;

use regex::Regex;

use super::ContentKind;
use crate::util::truncate_chars;

/// Character budget for the display title.
pub const TITLE_MAX: usize = 80;
/// Character budget for the short metadata description.
pub const DESCRIPTION_MAX: usize = 90;
/// Character budget for the summary excerpt quoted in the overview.
const EXCERPT_MAX: usize = 200;
/// Upper bound on tokens taken as a model name after a model year.
const MAX_MODEL_TOKENS: usize = 4;

static MARKETS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("カナダ", r"(?i)\bcanad(?:a|ian)\b|カナダ"),
        ("北米", r"(?i)\bnorth america(?:n)?\b|北米"),
        (
            "米国",
            r"\bU\.S\b\.?|\bUSA\b|(?i:\bunited states\b)|米国|アメリカ",
        ),
        ("メキシコ", r"(?i)\bmexic(?:o|an)\b|メキシコ"),
        ("日本", r"(?i)\bjapan(?:ese)?\b|日本市場|日本国内"),
        ("英国", r"\bU\.K\b\.?|\bUK\b|(?i:\bunited kingdom\b|\bbritain\b|\bbritish\b)|英国"),
        ("ドイツ", r"(?i)\bgerman(?:y)?\b|ドイツ"),
        ("欧州", r"(?i)\beurope(?:an)?\b|欧州"),
        ("中国", r"(?i)\bchin(?:a|ese)\b|中国"),
        ("韓国", r"(?i)\bkorea(?:n)?\b|韓国"),
        ("インド", r"(?i)\bindia(?:n)?\b|インド"),
        ("豪州", r"(?i)\baustralia(?:n)?\b|オーストラリア|豪州"),
    ]
    .into_iter()
    .map(|(label, pattern)| (label, Regex::new(pattern).unwrap()))
    .collect()
});

/// "<subject> [is] now available for order on <model> [in <market>]"
static ORDER_ON_MODEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<subject>.+?)\s+(?:(?:is|are)\s+)?(?:now\s+)?available\s+(?:for|to)\s+order\s+(?:on|for|with)\s+(?:the\s+)?(?P<model>.+?)(?:\s+in\s+(?P<market>.+?))?\s*[.!]?$",
    )
    .unwrap()
});

/// "<model> [is] now open for order(s) [in <market>]"
static MODEL_ORDERS_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:the\s+)?(?P<model>.+?)\s+(?:is\s+)?now\s+(?:open\s+for\s+orders?|available\s+(?:for|to)\s+order)(?:\s+in\s+(?P<market>.+?))?\s*[.!]?$",
    )
    .unwrap()
});

/// "Pricing announced for <model> [in <market>]"
static PRICING_FOR_MODEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:pricing|prices?)\s+(?:announced|revealed|set|released)\s+for\s+(?:the\s+)?(?P<model>.+?)(?:\s+in\s+(?P<market>.+?))?\s*[.!]?$",
    )
    .unwrap()
});

static DISPLACEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)[\s-]*(?:litres?|liters?|l)\b").unwrap()
});

static MODEL_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

/// Capitalized words that end a model name in title-case headlines.
const MODEL_STOPWORDS: &[&str] = &[
    "a", "adds", "an", "and", "announces", "are", "arrives", "at", "available", "begins",
    "brings", "comes", "continues", "debut", "debuts", "delivers", "earns", "edition",
    "expands", "features", "financial", "first", "for", "from", "fiscal", "gains", "gets",
    "goes", "half", "hits", "in", "introduces", "is", "joins", "launches", "lineup", "makes",
    "marks", "model", "models", "named", "now", "of", "offers", "on", "order", "orders",
    "premiere", "pricing", "production", "quarter", "receives", "results", "returns",
    "revealed", "sales", "sets", "starts", "takes", "the", "to", "unveiled", "update",
    "updates", "upgrades", "wins", "with",
];

/// Which title strategy produced the display title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleStrategy {
    NativeTitle,
    Phrase,
    ModelYear,
    MakerGeneric,
    Wrapped,
}

/// Text and context a record is localized from.
#[derive(Debug, Clone, Copy)]
pub struct LocalizeInput<'a> {
    pub title: &'a str,
    pub summary: &'a str,
    pub maker: Option<&'a str>,
    pub source_name: &'a str,
    pub kind: ContentKind,
    /// Language declared by the source, used when the text is inconclusive
    pub language_hint: &'a str,
}

/// Synthesized display text for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Localized {
    pub title: String,
    pub overview: String,
    pub description: String,
    pub editorial_comment: String,
    pub market: Option<&'static str>,
    pub language: String,
    pub strategy: TitleStrategy,
}

/// What a known announcement phrasing yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Phrase {
    model: String,
    subject: Option<String>,
    market: Option<&'static str>,
    shape: PhraseShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhraseShape {
    SubjectOnModel,
    OrdersOpen,
    Pricing,
}

pub fn localize(input: &LocalizeInput<'_>) -> Localized {
    let phrase = extract_phrase(input.title);
    let market = phrase
        .as_ref()
        .and_then(|p| p.market)
        .or_else(|| detect_market(input.title))
        .or_else(|| detect_market(input.summary));
    let model = phrase
        .as_ref()
        .map(|p| p.model.clone())
        .or_else(|| extract_model_year(input.title));
    let language = detect_language(
        &format!("{} {}", input.title, input.summary),
        input.language_hint,
    );

    let (title, strategy) = display_title(input, phrase.as_ref(), model.as_deref(), market);
    let title = truncate_chars(&title, TITLE_MAX).into_owned();

    let overview = overview(input, phrase.as_ref(), model.as_deref(), market);
    let description =
        truncate_chars(&format!("{title}。{}", short_guidance(input.kind)), DESCRIPTION_MAX)
            .into_owned();

    Localized {
        title,
        overview,
        description,
        editorial_comment: editorial_comment(input.kind).to_owned(),
        market,
        language,
        strategy,
    }
}

fn display_title(
    input: &LocalizeInput<'_>,
    phrase: Option<&Phrase>,
    model: Option<&str>,
    market: Option<&'static str>,
) -> (String, TitleStrategy) {
    let prefix = market.map(|m| format!("【{m}】")).unwrap_or_default();

    if has_kana(input.title) {
        return (input.title.to_owned(), TitleStrategy::NativeTitle);
    }

    if let Some(phrase) = phrase {
        let body = match (phrase.shape, phrase.subject.as_deref()) {
            (PhraseShape::SubjectOnModel, Some(subject)) => {
                format!("{}に{subject}を設定、受注開始", phrase.model)
            }
            (PhraseShape::Pricing, _) => format!("{}の価格を発表", phrase.model),
            _ => format!("{}の受注開始", phrase.model),
        };
        return (format!("{prefix}{body}"), TitleStrategy::Phrase);
    }

    if let Some(model) = model {
        return (
            format!("{prefix}{model}の{}", kind_noun(input.kind)),
            TitleStrategy::ModelYear,
        );
    }

    if let Some(maker) = input.maker.filter(|m| !m.trim().is_empty()) {
        return (
            format!("{prefix}{}の{}", maker.trim(), kind_noun(input.kind)),
            TitleStrategy::MakerGeneric,
        );
    }

    let tag = match market {
        Some(m) => format!("【{}・{m}】", input.kind.label()),
        None => format!("【{}】", input.kind.label()),
    };
    (format!("{tag}{}", input.title), TitleStrategy::Wrapped)
}

fn overview(
    input: &LocalizeInput<'_>,
    phrase: Option<&Phrase>,
    model: Option<&str>,
    market: Option<&'static str>,
) -> String {
    let mut paragraphs = Vec::with_capacity(6);

    let about = model.unwrap_or("同社の製品・事業");
    paragraphs.push(format!(
        "{}が公開した、{about}に関する{}の発表です。",
        input.source_name,
        input.kind.label()
    ));
    paragraphs.push(format!("原題：「{}」", input.title));

    if let Some(phrase) = phrase {
        let detail = match (phrase.shape, phrase.subject.as_deref()) {
            (PhraseShape::SubjectOnModel, Some(subject)) => format!(
                "原題では、{}に{subject}が設定され、注文の受け付けが始まったと案内されています。価格やグレード構成、納車時期は公式発表で確認してください。",
                phrase.model
            ),
            (PhraseShape::Pricing, _) => format!(
                "原題では、{}の価格が案内されています。税や諸費用の扱い、グレードごとの違いは公式発表で確認してください。",
                phrase.model
            ),
            _ => format!(
                "原題では、{}の注文受け付けについて案内されています。受注条件や納車時期は公式発表で確認してください。",
                phrase.model
            ),
        };
        paragraphs.push(detail);
    }

    if let Some(market) = market {
        if market == "日本" {
            paragraphs.push("日本市場向けの内容です。販売店での取り扱い状況もあわせて確認してください。".to_owned());
        } else {
            paragraphs.push(format!(
                "対象市場は{market}です。日本国内での導入や仕様は異なる場合があるため、国内向けの公式情報もあわせて確認してください。"
            ));
        }
    }

    paragraphs.push(kind_guidance(input.kind).to_owned());

    if !input.summary.trim().is_empty() {
        paragraphs.push(format!(
            "発表の要旨（原文）：{}",
            truncate_chars(input.summary.trim(), EXCERPT_MAX)
        ));
    }

    paragraphs.join("\n\n")
}

fn extract_phrase(title: &str) -> Option<Phrase> {
    let title = title.trim();

    let (caps, shape) = [
        (&*ORDER_ON_MODEL, PhraseShape::SubjectOnModel),
        (&*MODEL_ORDERS_OPEN, PhraseShape::OrdersOpen),
        (&*PRICING_FOR_MODEL, PhraseShape::Pricing),
    ]
    .into_iter()
    .find_map(|(re, shape)| re.captures(title).map(|caps| (caps, shape)))?;

    let mut model = caps.name("model")?.as_str().trim().to_owned();
    let market = match caps.name("market") {
        Some(text) => match detect_market(text.as_str()) {
            Some(label) => Some(label),
            // "in Black" is part of the model, not a market
            None => {
                model = format!("{model} in {}", text.as_str().trim());
                None
            }
        },
        None => None,
    };
    if model.is_empty() {
        return None;
    }

    let subject = caps
        .name("subject")
        .map(|s| normalize_displacement(s.as_str().trim()))
        .filter(|s| !is_filler_subject(s));

    Some(Phrase {
        model: normalize_displacement(&model),
        subject,
        market,
        shape,
    })
}

/// A subject made only of connective words names no equipment,
/// e.g. "Now" in "Now Available for Order on the 2026 Ram 1500".
fn is_filler_subject(subject: &str) -> bool {
    const FILLER: &[&str] = &["now", "is", "are", "the", "also", "officially"];
    subject
        .split_whitespace()
        .all(|word| FILLER.iter().any(|f| word.eq_ignore_ascii_case(f)))
}

/// Model year followed by the capitalized words that name the model,
/// e.g. "2026 Jeep Grand Cherokee".
fn extract_model_year(title: &str) -> Option<String> {
    for year in MODEL_YEAR.find_iter(title) {
        let mut tokens = Vec::new();
        for raw in title[year.end()..].split_whitespace() {
            let token = raw.trim_end_matches([':', ',', ';', '.', '!', '?']);
            if !is_model_token(token) {
                break;
            }
            tokens.push(token);
            if token.len() != raw.len() || tokens.len() == MAX_MODEL_TOKENS {
                break;
            }
        }
        if !tokens.is_empty() {
            return Some(format!("{} {}", year.as_str(), tokens.join(" ")));
        }
    }
    None
}

fn is_model_token(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    (first.is_uppercase() || first.is_ascii_digit())
        && !MODEL_STOPWORDS.contains(&token.to_lowercase().as_str())
}

/// Rewrites engine displacements to the compact form: "5.7 Litre" → "5.7L".
pub fn normalize_displacement(text: &str) -> String {
    DISPLACEMENT.replace_all(text, "${1}L").into_owned()
}

/// Japanese label of the market named earliest in `text`.
pub fn detect_market(text: &str) -> Option<&'static str> {
    MARKETS
        .iter()
        .filter_map(|(label, re)| re.find(text).map(|m| (m.start(), *label)))
        .min_by_key(|(start, _)| *start)
        .map(|(_, label)| label)
}

/// Script-based language detection.
///
/// Kana means Japanese and Hangul means Korean. Han without either is
/// Japanese when the source declares Japanese (kanji-only headlines such as
/// "2025年3月期 決算説明会") and Chinese otherwise. Latin-only text falls back
/// to the source's declared language.
pub fn detect_language(text: &str, hint: &str) -> String {
    let hint = hint.trim().to_ascii_lowercase();
    if has_kana(text) {
        return "ja".to_owned();
    }
    if text.chars().any(is_hangul) {
        return "ko".to_owned();
    }
    if text.chars().any(is_han) {
        let language = if hint == "ja" || hint.starts_with("ja-") { "ja" } else { "zh" };
        return language.to_owned();
    }
    if hint.is_empty() {
        "en".to_owned()
    } else {
        hint
    }
}

fn has_kana(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{FF66}'..='\u{FF9F}'))
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

fn is_han(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

fn kind_noun(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Recall => "リコール情報",
        ContentKind::NewModel => "新型モデル発表",
        ContentKind::Update => "改良・仕様変更情報",
        ContentKind::Business => "事業関連情報",
        ContentKind::Motorsport => "モータースポーツ情報",
        ContentKind::Event => "イベント出展情報",
        ContentKind::Award => "受賞情報",
        ContentKind::Tech => "技術情報",
        ContentKind::Other => "最新情報",
    }
}

fn kind_guidance(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Recall => "対象となる車両や製造期間、改善措置の内容は、メーカーや販売店の公式情報で必ず確認してください。車台番号での対象確認もできます。",
        ContentKind::NewModel => "装備や価格、日本への導入時期は市場ごとに異なる可能性があります。詳細は公式発表を確認してください。",
        ContentKind::Update => "変更点の範囲や適用される生産時期は、公式発表で確認してください。",
        ContentKind::Tech => "技術の実用化時期や搭載される車種は、今後の公式発表で確認してください。",
        ContentKind::Business | ContentKind::Other => "価格や供給、保証などへの影響は、公式発表と販売店の案内で確認してください。",
        ContentKind::Motorsport => "競技の結果や今後の予定は、主催者とチームの公式情報で確認してください。",
        ContentKind::Event => "展示車両や日程は変更される場合があります。来場前に公式情報を確認してください。",
        ContentKind::Award => "評価の基準や対象となったモデルの仕様は、発表元の公式情報で確認してください。",
    }
}

fn short_guidance(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Recall => "対象車両と改善措置は公式情報で確認してください。",
        ContentKind::NewModel => "仕様や価格、国内導入の有無は公式発表で確認してください。",
        ContentKind::Update => "変更点や適用時期は公式発表で確認してください。",
        ContentKind::Tech => "実用化の時期や搭載車種は公式発表で確認してください。",
        _ => "詳細は公式発表で確認してください。",
    }
}

fn editorial_comment(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Recall => "リコールは安全に直結する情報です。お乗りの車両が対象かどうか、早めに確認しましょう。",
        ContentKind::NewModel => "新型車は市場ごとに仕様が異なることがあります。日本導入の有無は国内の公式発表を待って判断しましょう。",
        ContentKind::Update => "年次改良や仕様変更は購入時期を考える材料になります。現行モデルとの違いを公式資料で比べてみてください。",
        ContentKind::Tech => "新技術は、量産車への搭載時期と対象モデルが明らかになってから評価するのが確実です。",
        ContentKind::Business | ContentKind::Other => "価格や供給体制に関わる発表は、納期や見積もりに影響することがあります。",
        ContentKind::Motorsport => "モータースポーツでの取り組みは市販車の開発にもつながりますが、製品情報そのものではありません。",
        ContentKind::Event => "イベントでの展示内容は市販仕様と異なる場合があります。",
        ContentKind::Award => "受賞歴は評価の目安の一つです。実際の使い勝手は試乗で確かめましょう。",
    }
}
