//! Heading detection for documents without an embedded outline.
//!
//! Every merged span is scored on a handful of independent signals (size,
//! weight, numbering, keywords, capitalization). Spans that score high
//! enough become outline entries, with a level derived from font size and
//! refined by the numbering scheme.

use regex::Regex;

use crate::model::{Document, OutlineEntry, Span};
use crate::normalize::SpanNormalizer;

/// Pages sampled for font statistics.
const SAMPLE_PAGES: usize = 20;

const MIN_TITLE_CHARS: usize = 3;
const MAX_TITLE_CHARS: usize = 200;
const MAX_CAPS_CHARS: usize = 50;

/// Minimum score for a span to count as a heading.
pub const ACCEPT_SCORE: u32 = 3;

const KEYWORDS: &[&str] = &[
    "chapter",
    "section",
    "part",
    "introduction",
    "conclusion",
    "appendix",
    "bibliography",
    "references",
    "index",
    "abstract",
    "summary",
    "overview",
    "background",
    "methodology",
    "results",
    "discussion",
    "acknowledgments",
    "preface",
    "foreword",
];

/// Font size statistics over the leading pages of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct FontStats {
    /// Median span size
    pub median_size: f32,
    /// Distinct sizes, largest first
    pub sizes: Vec<f32>,
}

impl FontStats {
    /// Collect statistics from the first pages of a document.
    pub fn collect(doc: &Document, normalizer: &SpanNormalizer) -> Self {
        let sizes: Vec<f32> = doc
            .pages
            .iter()
            .take(SAMPLE_PAGES)
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.lines)
            .flat_map(|l| normalizer.merge_line(l))
            .map(|s| s.size)
            .collect();
        Self::from_sizes(sizes)
    }

    pub fn from_sizes(mut sizes: Vec<f32>) -> Self {
        if sizes.is_empty() {
            return Self {
                median_size: crate::typography::DEFAULT_MAIN_SIZE,
                sizes: Vec::new(),
            };
        }

        sizes.sort_by(|a, b| a.total_cmp(b));
        let mid = sizes.len() / 2;
        let median_size = if sizes.len() % 2 == 0 {
            (sizes[mid - 1] + sizes[mid]) / 2.0
        } else {
            sizes[mid]
        };

        sizes.dedup();
        sizes.reverse();
        Self { median_size, sizes }
    }

    /// The (up to) three largest distinct sizes.
    pub fn large_sizes(&self) -> &[f32] {
        &self.sizes[..self.sizes.len().min(3)]
    }
}

/// Scores spans as heading candidates.
pub struct HeadingScorer {
    patterns: Vec<Regex>,
    numeric_start: Regex,
    roman_start: Regex,
    chapter_or_part: Regex,
    three_level_number: Regex,
    two_level_number: Regex,
    one_level_number: Regex,
}

impl HeadingScorer {
    pub fn new() -> Self {
        let patterns = [
            r"(?i)^chapter\s+(\d+|[IVXLCDM]+)[\s.\-:]*(.*)$",
            r"^(\d+)[.)]\s+(.+)$",
            r"^(\d+\.\d+)[.)]\s+(.+)$",
            r"^([IVXLCDM]+)[.)\s]+(.+)$",
            r"(?i)^part\s+(\d+|[IVXLCDM]+)[\s.\-:]*(.*)$",
            r"(?i)^section\s+(\d+)[\s.\-:]*(.*)$",
        ];
        Self {
            patterns: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
            numeric_start: Regex::new(r"^\d+(\.\d+)*[.)\s]").unwrap(),
            roman_start: Regex::new(r"^[IVXLCDM]+[.)\s]").unwrap(),
            chapter_or_part: Regex::new(r"^(Chapter|CHAPTER|Part|PART)").unwrap(),
            three_level_number: Regex::new(r"^\d+\.\d+\.\d+").unwrap(),
            two_level_number: Regex::new(r"^\d+\.\d+").unwrap(),
            one_level_number: Regex::new(r"^\d+[.)]").unwrap(),
        }
    }

    /// Whether the text matches one of the heading numbering patterns.
    pub fn matches_pattern(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// Score a span, or `None` when it cannot be a heading at all.
    pub fn score(&self, span: &Span, stats: &FontStats) -> Option<u32> {
        let text = span.text.trim();
        let chars = text.chars().count();
        if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&chars) {
            return None;
        }

        let pattern_match = self.matches_pattern(text);
        let larger = span.size > stats.median_size;
        if !larger && !pattern_match {
            return None;
        }

        let lower = text.to_lowercase();
        let signals = [
            (larger, 2),
            (span.flags.is_bold(), 2),
            (span.flags.is_italic(), 1),
            (pattern_match, 3),
            (KEYWORDS.iter().any(|k| lower.contains(k)), 2),
            (self.numeric_start.is_match(text), 2),
            (self.roman_start.is_match(text), 2),
            (is_all_caps(text) && chars < MAX_CAPS_CHARS, 1),
        ];
        Some(signals.iter().filter(|(hit, _)| *hit).map(|(_, pts)| pts).sum())
    }

    /// Whether a span scores as a heading.
    pub fn is_heading(&self, span: &Span, stats: &FontStats) -> bool {
        self.score(span, stats).is_some_and(|s| s >= ACCEPT_SCORE)
    }

    /// Hierarchical level of an accepted heading.
    pub fn level(&self, span: &Span, stats: &FontStats) -> u8 {
        let text = span.text.trim();
        let large = stats.large_sizes();

        let mut level: u8 = if large.is_empty() {
            2
        } else {
            large
                .iter()
                .position(|&s| span.size >= s)
                .map(|i| i as u8 + 1)
                .unwrap_or(4)
        };

        if self.chapter_or_part.is_match(text) {
            level = level.min(1);
        } else if self.three_level_number.is_match(text) {
            level = level.max(3);
        } else if self.two_level_number.is_match(text) {
            level = level.max(2);
        } else if self.one_level_number.is_match(text) {
            level = level.max(1);
        }
        level.clamp(1, 6)
    }

    /// Scan every page and return the detected headings in document order.
    pub fn detect(&self, doc: &Document, normalizer: &SpanNormalizer) -> Vec<OutlineEntry> {
        let stats = FontStats::collect(doc, normalizer);
        log::debug!(
            "Heading scan: median size {}, large sizes {:?}",
            stats.median_size,
            stats.large_sizes()
        );

        let mut entries = Vec::new();
        for page in &doc.pages {
            for line in page.blocks.iter().flat_map(|b| &b.lines) {
                for span in normalizer.merge_line(line) {
                    if self.is_heading(&span, &stats) {
                        let level = self.level(&span, &stats);
                        entries.push(
                            OutlineEntry::new(level, span.text.trim(), page.number)
                                .with_position(span.bbox.y0),
                        );
                    }
                }
            }
        }

        let mut entries = dedup_entries(entries);
        entries.sort_by(|a, b| {
            a.start_page
                .cmp(&b.start_page)
                .then(a.position.total_cmp(&b.position))
        });
        entries
    }
}

impl Default for HeadingScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the first entry per (lowercased title, level).
fn dedup_entries(entries: Vec<OutlineEntry>) -> Vec<OutlineEntry> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert((e.title.to_lowercase(), e.level)))
        .collect()
}

fn is_all_caps(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, StyleFlags};

    fn stats() -> FontStats {
        FontStats::from_sizes(vec![10.0, 10.0, 10.0, 10.0, 10.0, 14.0, 18.0, 24.0])
    }

    fn span(text: &str, size: f32, flags: StyleFlags) -> Span {
        Span::new(text, "Times", size, BBox::default()).with_flags(flags)
    }

    #[test]
    fn test_font_stats() {
        let stats = stats();
        assert_eq!(stats.median_size, 10.0);
        assert_eq!(stats.large_sizes(), &[24.0, 18.0, 14.0]);

        let even = FontStats::from_sizes(vec![10.0, 12.0]);
        assert_eq!(even.median_size, 11.0);

        let empty = FontStats::from_sizes(Vec::new());
        assert_eq!(empty.median_size, 12.0);
        assert!(empty.large_sizes().is_empty());
    }

    #[test]
    fn test_numbered_bold_heading() {
        let scorer = HeadingScorer::new();
        let stats = stats();
        let heading = span("3.2 Related Work", 14.0, StyleFlags::BOLD);
        let score = scorer.score(&heading, &stats).unwrap();
        assert!(score >= ACCEPT_SCORE);
        assert!(scorer.level(&heading, &stats) >= 2);
    }

    #[test]
    fn test_small_text_needs_pattern() {
        let scorer = HeadingScorer::new();
        let stats = stats();
        assert_eq!(scorer.score(&span("INTRODUCTION", 10.0, StyleFlags::BOLD), &stats), None);
        assert!(scorer.is_heading(&span("Chapter 4: Results", 10.0, StyleFlags::NONE), &stats));
        assert!(scorer.is_heading(&span("chapter iv", 10.0, StyleFlags::NONE), &stats));
    }

    #[test]
    fn test_length_limits() {
        let scorer = HeadingScorer::new();
        let stats = stats();
        assert_eq!(scorer.score(&span("IV", 24.0, StyleFlags::BOLD), &stats), None);
        let long = "A".repeat(201);
        assert_eq!(scorer.score(&span(&long, 24.0, StyleFlags::BOLD), &stats), None);
    }

    #[test]
    fn test_large_plain_text_is_not_enough() {
        let scorer = HeadingScorer::new();
        let stats = stats();
        let plain = span("some large pull quote", 14.0, StyleFlags::NONE);
        assert_eq!(scorer.score(&plain, &stats), Some(2));
        assert!(!scorer.is_heading(&plain, &stats));
    }

    #[test]
    fn test_level_from_size_and_numbering() {
        let scorer = HeadingScorer::new();
        let stats = stats();
        let level = |text: &str, size: f32| scorer.level(&span(text, size, StyleFlags::BOLD), &stats);

        assert_eq!(level("Overview", 24.0), 1);
        assert_eq!(level("Overview", 18.0), 2);
        assert_eq!(level("Overview", 14.0), 3);
        assert_eq!(level("Overview", 11.0), 4);
        assert_eq!(level("Chapter 2", 18.0), 1);
        assert_eq!(level("1.2.3 Details", 24.0), 3);
        assert_eq!(level("1.2 Scope", 24.0), 2);
        assert_eq!(level("2) Setup", 14.0), 3);

        let flat = FontStats::from_sizes(Vec::new());
        assert_eq!(scorer.level(&span("Anything", 12.0, StyleFlags::NONE), &flat), 2);
    }

    #[test]
    fn test_lowercase_words_are_not_roman_numerals() {
        let scorer = HeadingScorer::new();
        assert!(!scorer.matches_pattern("did you know"));
        assert!(scorer.matches_pattern("IV. Evaluation"));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let entries = vec![
            OutlineEntry::new(1, "Results", 2),
            OutlineEntry::new(1, "RESULTS", 7),
            OutlineEntry::new(2, "Results", 9),
        ];
        let deduped = dedup_entries(entries);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].start_page, 2);
        assert_eq!(deduped[1].level, 2);
    }
}
