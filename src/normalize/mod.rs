//! Span normalization.
//!
//! Producers split a visual line into many spans: one per font change,
//! one per kerning adjustment, sometimes one per glyph. The normalizer
//! merges them back into runs of real text, one per font and size, and
//! cleans each run.

mod clean;

pub use clean::TextCleaner;

use regex::Regex;

use crate::model::{Line, Span};

/// Em-dash, joined without spaces like a ligature.
const EM_DASH: char = '\u{2014}';

/// Merges the spans of a line into cleaned runs.
pub struct SpanNormalizer {
    cleaner: TextCleaner,
    abbreviation: Regex,
    uppercase_word: Regex,
}

impl SpanNormalizer {
    pub fn new() -> Self {
        Self {
            cleaner: TextCleaner::new(),
            abbreviation: Regex::new(r"^(?:[A-Z]+\s)*[A-Z]$").unwrap(),
            uppercase_word: Regex::new(r"^[A-Z]+$").unwrap(),
        }
    }

    /// The cleaner used for span and section text.
    pub fn cleaner(&self) -> &TextCleaner {
        &self.cleaner
    }

    /// Merge a line's spans into runs that each carry one font and size.
    ///
    /// Whitespace-only spans are dropped. Text order is never changed.
    pub fn merge_line(&self, line: &Line) -> Vec<Span> {
        let mut merged = Vec::new();
        let mut acc: Option<Span> = None;

        for span in line.spans.iter().filter(|s| !s.is_blank()) {
            let Some(current) = acc.as_mut() else {
                acc = Some(span.clone());
                continue;
            };

            if self.ends_in_abbreviation(&current.text) {
                // A lone capital (drop cap, split acronym) continues into the next span.
                current.text.push_str(&span.text);
                current.font = span.font.clone();
                current.size = span.size;
                current.flags = span.flags;
                current.bbox = current.bbox.union(&span.bbox);
            } else if !same_style(current, span) {
                if self.uppercase_word.is_match(&span.text) {
                    current.text.push(' ');
                    current.text.push_str(&span.text);
                    current.bbox = current.bbox.union(&span.bbox);
                } else {
                    merged.extend(acc.replace(span.clone()));
                }
            } else {
                current.text = join_fragments(&current.text, &span.text);
                current.bbox = current.bbox.union(&span.bbox);
            }
        }
        merged.extend(acc);

        for span in &mut merged {
            span.text = self.cleaner.clean_span(&span.text);
        }
        merged.retain(|s| !s.text.is_empty());
        merged
    }

    fn ends_in_abbreviation(&self, text: &str) -> bool {
        let trimmed = text.trim_matches(|c| " ,.:?!".contains(c));
        self.abbreviation.is_match(trimmed)
    }
}

impl Default for SpanNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop a PDF font subset tag, e.g. "ABCDEF+Times-Roman" -> "Times-Roman".
pub fn strip_subset_prefix(font: &str) -> &str {
    let bytes = font.as_bytes();
    if bytes.len() > 7 && bytes[6] == b'+' && bytes[..6].iter().all(u8::is_ascii_uppercase) {
        &font[7..]
    } else {
        font
    }
}

fn same_style(a: &Span, b: &Span) -> bool {
    a.font == b.font && (a.size - b.size).abs() < 0.05
}

/// Join two text fragments the way a reader would.
///
/// * `exam-` + `ple` gives `example` (line-end hyphenation)
/// * ligature glyphs and em-dashes at the boundary join without a space
/// * an existing boundary space, or a trailing single capital, joins directly
/// * anything else gets one space
pub fn join_fragments(left: &str, right: &str) -> String {
    let (Some(last), Some(first)) = (left.chars().last(), right.chars().next()) else {
        return format!("{}{}", left, right);
    };

    if last == '-' && first.is_lowercase() {
        let stem = &left[..left.len() - 1];
        if stem.chars().last().is_some_and(char::is_alphabetic) {
            return format!("{}{}", stem, right);
        }
    }

    let glued = last == '-'
        || last == EM_DASH
        || first == EM_DASH
        || clean::is_ligature(last)
        || clean::is_ligature(first)
        || last.is_whitespace()
        || first.is_whitespace()
        || ends_in_single_capital(left);

    if glued {
        format!("{}{}", left, right)
    } else {
        format!("{} {}", left, right)
    }
}

fn ends_in_single_capital(text: &str) -> bool {
    let mut tail = text.chars().rev();
    matches!(
        (tail.next(), tail.next()),
        (Some(c), Some(s)) if c.is_ascii_uppercase() && s.is_whitespace()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;

    fn span(text: &str, font: &str, size: f32) -> Span {
        Span::new(text, font, size, BBox::new(0.0, 0.0, 10.0, size))
    }

    fn texts(spans: &[Span]) -> Vec<&str> {
        spans.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_same_style_spans_merge_with_space() {
        let normalizer = SpanNormalizer::new();
        let line = Line::new(vec![
            span("The quick", "Times", 12.0),
            span("brown fox", "Times", 12.0),
        ]);
        let merged = normalizer.merge_line(&line);
        assert_eq!(texts(&merged), vec!["The quick brown fox"]);
    }

    #[test]
    fn test_font_change_flushes() {
        let normalizer = SpanNormalizer::new();
        let line = Line::new(vec![
            span("Introduction", "Times-Bold", 14.0),
            span("This paper studies", "Times", 12.0),
        ]);
        let merged = normalizer.merge_line(&line);
        assert_eq!(texts(&merged), vec!["Introduction", "This paper studies"]);
        assert_eq!(merged[1].font, "Times");
    }

    #[test]
    fn test_inline_acronym_stays() {
        let normalizer = SpanNormalizer::new();
        let line = Line::new(vec![
            span("measured by", "Times", 12.0),
            span("MRI", "Times-SmallCaps", 11.0),
        ]);
        let merged = normalizer.merge_line(&line);
        assert_eq!(texts(&merged), vec!["measured by MRI"]);
    }

    #[test]
    fn test_drop_cap_continues() {
        let normalizer = SpanNormalizer::new();
        let line = Line::new(vec![
            span("O", "Times", 28.0),
            span("nce upon a time", "Times", 12.0),
        ]);
        let merged = normalizer.merge_line(&line);
        assert_eq!(texts(&merged), vec!["Once upon a time"]);
        assert_eq!(merged[0].size, 12.0);
    }

    #[test]
    fn test_ligature_and_dash_join() {
        let normalizer = SpanNormalizer::new();
        let line = Line::new(vec![
            span("e", "Times", 12.0),
            span("\u{FB03}cient", "Times", 12.0),
            span("\u{2014}", "Times", 12.0),
            span("really", "Times", 12.0),
        ]);
        let merged = normalizer.merge_line(&line);
        assert_eq!(texts(&merged), vec!["efficient\u{2014}really"]);
    }

    #[test]
    fn test_hyphenated_fragments_join() {
        assert_eq!(join_fragments("exam-", "ple"), "example");
        assert_eq!(join_fragments("pre-", "Raphaelite"), "pre-Raphaelite");
        assert_eq!(join_fragments("1-", "a"), "1-a");
        assert_eq!(join_fragments("word ", "next"), "word next");
        assert_eq!(join_fragments("U S", "Army"), "U SArmy");
        assert_eq!(join_fragments("", "x"), "x");
    }

    #[test]
    fn test_whitespace_spans_dropped() {
        let normalizer = SpanNormalizer::new();
        let line = Line::new(vec![
            span("  ", "Symbol", 30.0),
            span("Body", "Times", 12.0),
            span("\t", "Times", 12.0),
        ]);
        let merged = normalizer.merge_line(&line);
        assert_eq!(texts(&merged), vec!["Body"]);
    }

    #[test]
    fn test_renormalizing_is_stable() {
        let normalizer = SpanNormalizer::new();
        let line = Line::new(vec![
            span("A", "Times", 12.0),
            span("BSTRACT", "Times", 12.0),
            span("Results ( n = 4 ) [3]", "Times-Bold", 12.0),
        ]);
        let once = normalizer.merge_line(&line);
        let twice = normalizer.merge_line(&Line::new(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_strip_subset_prefix() {
        assert_eq!(strip_subset_prefix("ABCDEF+Times-Roman"), "Times-Roman");
        assert_eq!(strip_subset_prefix("Times-Roman"), "Times-Roman");
        assert_eq!(strip_subset_prefix("abcdef+Times"), "abcdef+Times");
        assert_eq!(strip_subset_prefix("ABCDEF+"), "ABCDEF+");
    }
}
