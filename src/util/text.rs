use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Word-character runs, the same token shape feeds and page text produce.
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Maximum summary length in characters (not bytes).
const SUMMARY_MAX_CHARS: usize = 200;
/// A full-stop cut is only taken if it lands past this many characters,
/// so a leading short sentence never becomes the whole summary.
const SUMMARY_MIN_CUT: usize = 100;

/// Collapses runs of whitespace into single spaces and trims the ends.
///
/// Feed titles frequently arrive with embedded newlines and indentation
/// from template rendering; this normalizes them to display form.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Counts words in mixed-script text.
///
/// Every CJK ideograph counts as one word on its own; every other word
/// token counts as one. The two counts are summed, so "hello 世界" is
/// three words. Reading-time estimates depend on this behaving the same
/// for Chinese-language and English-language articles.
pub fn count_words(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let cjk_chars = text.chars().filter(|c| is_cjk(*c)).count();
    let other_words = WORD_RE
        .find_iter(text)
        .filter(|m| !m.as_str().chars().next().is_some_and(is_cjk))
        .count();

    cjk_chars + other_words
}

/// Extracts a short summary from article text.
///
/// Takes the first ~200 characters, preferring to cut at an ideographic
/// full stop ('。') if one occurs past the 100-character mark. If the text
/// was truncated without a sentence boundary, an ellipsis is appended.
/// Empty input yields an empty summary.
pub fn summarize(text: &str) -> String {
    let total_chars = text.chars().count();
    if total_chars == 0 {
        return String::new();
    }

    let head: String = text.chars().take(SUMMARY_MAX_CHARS).collect();

    // Prefer a sentence boundary, but only one deep enough into the text
    if let Some(idx) = head.rfind('。') {
        if head[..idx].chars().count() >= SUMMARY_MIN_CUT {
            return head[..idx + '。'.len_utf8()].to_string();
        }
    }

    let mut summary = head;
    if total_chars > SUMMARY_MAX_CHARS {
        summary.push_str("...");
    }
    summary
}

/// Datetime formats without offsets that feeds have been observed to emit.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Date-only formats; midnight UTC is assumed.
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%B %d, %Y"];

/// Parses a feed-provided date string permissively.
///
/// Tries RFC 3339 (JSON Feed), RFC 2822 (RSS), then a set of offset-less
/// datetime and date-only formats. Offset-less values are interpreted as
/// UTC. Unparsable or empty strings yield `None` rather than an error:
/// a malformed date never fails an entry.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    tracing::debug!(raw = %raw, "Unparsable date string");
    None
}
