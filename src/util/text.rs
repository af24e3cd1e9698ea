use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Ellipsis appended by [`truncate_chars`]
const ELLIPSIS: char = '…';

static RE_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<(script|style)\b.*?</(script|style)\s*>|</?[a-z!/?][^>]*>")
        .expect("tag pattern is valid")
});
static RE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Turns a feed field into plain text.
///
/// Feed titles and summaries arrive entity-escaped, sometimes twice, and
/// often carry embedded HTML. The cleaning steps are:
///
/// 1. Decode HTML entities (named and numeric)
/// 2. Strip tags, comments and `<script>`/`<style>` blocks
/// 3. Decode once more for double-escaped input (`&amp;amp;`)
/// 4. Drop control characters, normalize typographic quotes, collapse whitespace
///
/// ```
/// use presswire::util::clean_text;
///
/// assert_eq!(clean_text("  &lt;p&gt;New&nbsp;<b>Model</b>&lt;/p&gt; "), "New Model");
/// ```
pub fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let stripped = RE_TAGS.replace_all(&decoded, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    let visible = strip_control_chars(&decoded);

    let quoted = visible
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    RE_WS.replace_all(&quoted, " ").trim().to_owned()
}

/// Removes control characters other than tab, newline and carriage return.
///
/// Returns `Cow::Borrowed` when the input is already clean (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_unwanted = |c: char| c.is_control() && !matches!(c, '\t' | '\n' | '\r');

    if !s.chars().any(is_unwanted) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_unwanted(c)).collect())
}

/// Truncates a string to at most `max_chars` characters.
///
/// When truncation is needed the result ends with `…`, and the ellipsis counts
/// toward the budget. Trailing whitespace and ASCII punctuation before the
/// ellipsis are trimmed so the cut never reads "word ,…".
///
/// ```
/// use presswire::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 8), "Hello W…");
/// assert_eq!(truncate_chars("日本語テキスト", 4), "日本語…");
/// assert_eq!(truncate_chars("Test", 0), "");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }
    if s.chars().count() <= max_chars {
        return Cow::Borrowed(s);
    }

    let kept: String = s.chars().take(max_chars - 1).collect();
    let trimmed = kept.trim_end_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
    let body = if trimmed.is_empty() { kept.as_str() } else { trimmed };
    Cow::Owned(format!("{body}{ELLIPSIS}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clean_text_decodes_entities() {
        assert_eq!(clean_text("Ram &amp; Jeep"), "Ram & Jeep");
        assert_eq!(clean_text("Ram &amp;amp; Jeep"), "Ram & Jeep");
        assert_eq!(clean_text("caf&#233; &#x2014; bar"), "café — bar");
    }

    #[test]
    fn test_clean_text_strips_markup() {
        let raw = r#"<p>The <a href="/x">new</a> model</p><script>alert(1)</script><!-- c -->"#;
        assert_eq!(clean_text(raw), "The new model");
    }

    #[test]
    fn test_clean_text_keeps_comparison_signs() {
        assert_eq!(clean_text("0 < 1 and 2 > 1"), "0 < 1 and 2 > 1");
    }

    #[test]
    fn test_clean_text_collapses_whitespace_and_quotes() {
        assert_eq!(
            clean_text("\n  \u{201C}Hello\u{201D}\t\u{2018}world\u{2019}  \n"),
            "\"Hello\" 'world'"
        );
    }

    #[test]
    fn test_clean_text_drops_control_chars() {
        assert_eq!(clean_text("Evil\x1b Feed\x07"), "Evil Feed");
    }

    #[test]
    fn test_strip_clean_text_returns_borrowed() {
        let input = "line1\nline2\ttabbed";
        assert!(matches!(strip_control_chars(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_trims_punctuation_before_ellipsis() {
        assert_eq!(truncate_chars("Hello, world again", 7), "Hello…");
    }

    #[test]
    fn test_truncate_exact_fit() {
        assert_eq!(truncate_chars("12345", 5), "12345");
        assert_eq!(truncate_chars("123456", 5), "1234…");
    }

    proptest! {
        #[test]
        fn test_truncate_never_exceeds_budget(s in "\\PC{0,200}", max in 0usize..80) {
            let out = truncate_chars(&s, max);
            prop_assert!(out.chars().count() <= max);
        }

        #[test]
        fn test_clean_text_is_trimmed(s in "\\PC{0,120}") {
            let out = clean_text(&s);
            prop_assert_eq!(out.trim(), out.as_str());
        }
    }
}
